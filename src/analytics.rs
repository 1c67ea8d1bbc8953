//! Fire-and-forget analytics events.
//!
//! Gameplay never waits on, or fails because of, a sink.

use async_trait::async_trait;
use chrono::Utc;
use derive_more::{Display, Error};
use derive_new::new;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Kind of analytics event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    /// A piece was dropped.
    Move,
    /// A session finished with a win or draw.
    GameEnd,
    /// A participant left mid-game.
    GameAbandoned,
}

/// One analytics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, new)]
pub struct GameEvent {
    /// What happened.
    pub event_type: EventType,
    /// Session the event belongs to.
    pub game_id: String,
    /// Acting participant, empty when not applicable.
    #[serde(default)]
    pub player_id: String,
    /// Unix seconds.
    pub timestamp: i64,
    /// Event-specific details.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// Sink delivery failure.
#[derive(Debug, Clone, Display, Error)]
#[display("Analytics error: {}", message)]
pub struct AnalyticsError {
    /// Error message.
    pub message: String,
}

/// Destination for analytics events.
#[async_trait]
pub trait AnalyticsSink: Send + Sync + std::fmt::Debug {
    /// Delivers one event.
    async fn publish(&self, event: GameEvent) -> Result<(), AnalyticsError>;
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl AnalyticsSink for NoopSink {
    async fn publish(&self, _event: GameEvent) -> Result<(), AnalyticsError> {
        Ok(())
    }
}

/// Writes each event as a JSON line on the `analytics` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl AnalyticsSink for TracingSink {
    async fn publish(&self, event: GameEvent) -> Result<(), AnalyticsError> {
        let line = serde_json::to_string(&event).map_err(|e| AnalyticsError {
            message: format!("Failed to encode event: {}", e),
        })?;
        info!(target: "analytics", event = %line);
        Ok(())
    }
}

/// Forwards events into a channel, for in-process consumers.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<GameEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GameEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AnalyticsSink for ChannelSink {
    async fn publish(&self, event: GameEvent) -> Result<(), AnalyticsError> {
        self.tx.send(event).map_err(|_| AnalyticsError {
            message: "receiver dropped".to_string(),
        })
    }
}

/// Builds analytics events and hands them to a sink on detached tasks.
#[derive(Debug, Clone)]
pub struct Analytics {
    sink: Arc<dyn AnalyticsSink>,
}

impl Default for Analytics {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Analytics {
    /// Wraps `sink`.
    pub fn new(sink: Arc<dyn AnalyticsSink>) -> Self {
        Self { sink }
    }

    /// Analytics that discard everything.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopSink))
    }

    /// Records a move.
    #[instrument(skip(self))]
    pub fn log_move(&self, game_id: &str, player_id: &str, column: i32) {
        self.emit(GameEvent::new(
            EventType::Move,
            game_id.to_string(),
            player_id.to_string(),
            Utc::now().timestamp(),
            json!({ "column": column }),
        ));
    }

    /// Records a finished session.
    #[instrument(skip(self))]
    pub fn log_game_end(&self, game_id: &str, winner: Option<&str>, status: &str) {
        self.emit(GameEvent::new(
            EventType::GameEnd,
            game_id.to_string(),
            String::new(),
            Utc::now().timestamp(),
            json!({ "winner": winner.unwrap_or_default(), "status": status }),
        ));
    }

    /// Records a participant abandoning a session.
    #[instrument(skip(self))]
    pub fn log_game_abandoned(&self, game_id: &str, player_id: &str) {
        self.emit(GameEvent::new(
            EventType::GameAbandoned,
            game_id.to_string(),
            player_id.to_string(),
            Utc::now().timestamp(),
            Value::Null,
        ));
    }

    fn emit(&self, event: GameEvent) {
        let sink = Arc::clone(&self.sink);
        debug!(event_type = %event.event_type, game_id = %event.game_id, "Emitting analytics event");
        tokio::spawn(async move {
            if let Err(e) = sink.publish(event).await {
                warn!(error = %e, "Analytics event dropped");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = GameEvent::new(
            EventType::GameEnd,
            "g1".to_string(),
            String::new(),
            42,
            json!({"winner": "a", "status": "won"}),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "game_end");
        assert_eq!(value["game_id"], "g1");
        assert_eq!(value["timestamp"], 42);
        assert_eq!(value["data"]["status"], "won");
    }

    #[test]
    fn test_abandon_event_omits_data() {
        let event = GameEvent::new(
            EventType::GameAbandoned,
            "g1".to_string(),
            "p".to_string(),
            1,
            Value::Null,
        );
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("data").is_none());
    }

    #[tokio::test]
    async fn test_channel_sink_receives_move() {
        let (sink, mut rx) = ChannelSink::channel();
        let analytics = Analytics::new(Arc::new(sink));
        analytics.log_move("g1", "alice_1", 3);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::Move);
        assert_eq!(event.player_id, "alice_1");
        assert_eq!(event.data["column"], 3);
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_panic() {
        let (sink, rx) = ChannelSink::channel();
        drop(rx);
        let analytics = Analytics::new(Arc::new(sink));
        analytics.log_game_abandoned("g1", "bob_1");
        tokio::task::yield_now().await;
    }
}
