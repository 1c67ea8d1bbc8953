//! Matchmaking: pair two waiting players or fall back to a bot session.

use crate::session::{PlayerId, Session};
use derive_more::{Display, Error};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Why a matchmaking request ended without a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum MatchmakingError {
    /// The request was withdrawn or displaced by a newer one for the same
    /// player before it could complete.
    #[display("matchmaking cancelled")]
    Cancelled,
}

/// A player's outstanding request for an opponent.
#[derive(Debug)]
struct WaitingEntry {
    player_id: PlayerId,
    name: String,
    enqueued_at: Instant,
    ticket: u64,
    slot: oneshot::Sender<Session>,
}

#[derive(Debug)]
struct Inner {
    waiting: Mutex<VecDeque<WaitingEntry>>,
    timeout: Duration,
    next_ticket: AtomicU64,
}

/// FIFO wait-set with per-entry rendezvous slots.
///
/// The lock is never held across an await. An entry leaves the wait-set
/// exactly once: claimed by a partner, removed by its own timeout, withdrawn
/// with [`remove_player`](Self::remove_player), or swept.
#[derive(Debug, Clone)]
pub struct MatchmakingQueue {
    inner: Arc<Inner>,
}

impl MatchmakingQueue {
    /// Creates a queue whose waiters fall back to a bot after `timeout`.
    #[instrument]
    pub fn new(timeout: Duration) -> Self {
        info!(timeout_ms = timeout.as_millis() as u64, "Creating matchmaking queue");
        Self {
            inner: Arc::new(Inner {
                waiting: Mutex::new(VecDeque::new()),
                timeout,
                next_ticket: AtomicU64::new(0),
            }),
        }
    }

    /// Configured wait before falling back to a bot.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<WaitingEntry>> {
        self.inner
            .waiting
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pairs the caller with the oldest waiting player, or waits.
    ///
    /// A paired waiter becomes participant 1 and moves first. A caller left
    /// alone for the full timeout gets a bot session instead.
    ///
    /// # Errors
    ///
    /// Returns [`MatchmakingError::Cancelled`] if the request is withdrawn
    /// before its timeout elapses.
    #[instrument(skip(self))]
    pub async fn add_player(
        &self,
        player_id: PlayerId,
        name: String,
    ) -> Result<Session, MatchmakingError> {
        let (mut rx, ticket, enqueued_at) = {
            let mut waiting = self.lock();

            if let Some(pos) = waiting.iter().position(|e| e.player_id == player_id) {
                warn!("Player already waiting, replacing older request");
                waiting.remove(pos);
            }

            while let Some(partner) = waiting.pop_front() {
                let session = Session::new(
                    partner.player_id.clone(),
                    partner.name.clone(),
                    player_id.clone(),
                    name.clone(),
                    false,
                );
                // Delivered under the lock so the waiter's timeout path sees
                // either its entry or the session, never neither.
                match partner.slot.send(session.clone()) {
                    Ok(()) => {
                        info!(
                            partner = %partner.player_id,
                            session_id = %session.id(),
                            "Paired players"
                        );
                        return Ok(session);
                    }
                    Err(_) => {
                        debug!(partner = %partner.player_id, "Waiter gone, skipping");
                    }
                }
            }

            let (tx, rx) = oneshot::channel();
            let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
            let enqueued_at = Instant::now();
            waiting.push_back(WaitingEntry {
                player_id: player_id.clone(),
                name: name.clone(),
                enqueued_at,
                ticket,
                slot: tx,
            });
            debug!(waiting = waiting.len(), "Queued, waiting for partner");
            (rx, ticket, enqueued_at)
        };

        match tokio::time::timeout(self.inner.timeout, &mut rx).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(_)) if enqueued_at.elapsed() >= self.inner.timeout => {
                debug!("Entry swept after timeout");
                Ok(self.bot_session(player_id, name))
            }
            Ok(Err(_)) => {
                info!("Matchmaking cancelled");
                Err(MatchmakingError::Cancelled)
            }
            Err(_) => {
                let removed = {
                    let mut waiting = self.lock();
                    match waiting.iter().position(|e| e.ticket == ticket) {
                        Some(pos) => waiting.remove(pos).is_some(),
                        None => false,
                    }
                };
                if removed {
                    return Ok(self.bot_session(player_id, name));
                }
                match rx.try_recv() {
                    Ok(session) => {
                        debug!("Paired just as the timeout fired");
                        Ok(session)
                    }
                    Err(_) => Ok(self.bot_session(player_id, name)),
                }
            }
        }
    }

    fn bot_session(&self, player_id: PlayerId, name: String) -> Session {
        info!(player_id = %player_id, "No partner found, starting bot game");
        Session::against_bot(player_id, name)
    }

    /// Withdraws a still-waiting request. Returns whether one was removed.
    #[instrument(skip(self))]
    pub fn remove_player(&self, player_id: &str) -> bool {
        let mut waiting = self.lock();
        match waiting.iter().position(|e| e.player_id == player_id) {
            Some(pos) => {
                waiting.remove(pos);
                info!("Removed waiting player");
                true
            }
            None => false,
        }
    }

    /// Number of players currently waiting.
    pub fn waiting_count(&self) -> usize {
        self.lock().len()
    }

    /// Drops entries that have waited longer than the timeout.
    ///
    /// Returns how many were removed.
    #[instrument(skip(self))]
    pub fn sweep_expired(&self) -> usize {
        let timeout = self.inner.timeout;
        let mut waiting = self.lock();
        let before = waiting.len();
        waiting.retain(|e| e.enqueued_at.elapsed() <= timeout);
        let removed = before - waiting.len();
        if removed > 0 {
            info!(removed, "Swept expired waiting entries");
        }
        removed
    }

    /// Runs [`sweep_expired`](Self::sweep_expired) every `every` until
    /// `shutdown` fires.
    pub fn spawn_sweeper(&self, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Matchmaking sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        queue.sweep_expired();
                    }
                }
            }
        })
    }
}
