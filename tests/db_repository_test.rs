//! Tests for persisting finished games.

use std::time::Duration;

use four_in_a_row::{
    Analytics, GameRepository, Orchestrator, OrchestratorSettings, Outbound, ServerMessage,
    Session, SessionStatus,
};
use serde_json::json;
use tempfile::NamedTempFile;

/// Creates a temporary database file with schema applied, returns the file
/// handle (must stay in scope to keep the file alive) and a ready repository.
fn setup_test_db() -> (NamedTempFile, GameRepository) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let repo = GameRepository::new(db_path).expect("Failed to create repository");
    repo.ensure_schema().expect("Schema setup failed");
    (db_file, repo)
}

/// Alice stacks column 0 while Bob stacks column 1; Alice wins on move 7.
fn won_by_alice() -> Session {
    let mut session = Session::new(
        "alice_1".to_string(),
        "alice".to_string(),
        "bob_1".to_string(),
        "bob".to_string(),
        false,
    );
    for _ in 0..3 {
        session.apply_move("alice_1", 0).unwrap();
        session.apply_move("bob_1", 1).unwrap();
    }
    session.apply_move("alice_1", 0).unwrap();
    assert_eq!(session.status(), &SessionStatus::Won);
    session
}

/// Alice and Bob fill the board without a winner.
fn drawn() -> Session {
    const COLUMNS: [i32; 42] = [5, 3, 2, 3, 1, 5, 3, 1, 0, 1, 4, 1, 2, 5, 0, 5, 6, 6, 2, 0, 6, 0, 4, 2, 3, 0, 3, 4, 2, 3, 2, 6, 1, 1, 5, 4, 6, 6, 0, 4, 4, 5];
    let mut session = Session::new(
        "alice_1".to_string(),
        "alice".to_string(),
        "bob_1".to_string(),
        "bob".to_string(),
        false,
    );
    let players = ["alice_1", "bob_1"];
    for (i, column) in COLUMNS.into_iter().enumerate() {
        session.apply_move(players[i % 2], column).unwrap();
    }
    assert_eq!(session.status(), &SessionStatus::Draw);
    session
}

#[test]
fn test_empty_path_is_rejected() {
    assert!(GameRepository::new("  ".to_string()).is_err());
}

#[test]
fn test_ensure_schema_is_idempotent() {
    let (_db, repo) = setup_test_db();
    repo.ensure_schema().expect("Second run failed");
}

#[test]
fn test_record_win_updates_both_players() {
    let (_db, repo) = setup_test_db();
    let session = won_by_alice();

    let record = repo.record_finished_game(&session).expect("Record failed");
    assert_eq!(record.id(), session.id());
    assert_eq!(record.winner_id().as_deref(), Some("alice_1"));
    assert_eq!(record.status(), "won");

    let alice = repo.get_player("alice_1").unwrap().expect("alice stored");
    assert_eq!(alice.username(), "alice");
    assert_eq!(*alice.wins(), 1);
    assert_eq!(*alice.losses(), 0);
    assert_eq!(*alice.rating(), 1000);

    let bob = repo.get_player("bob_1").unwrap().expect("bob stored");
    assert_eq!(*bob.wins(), 0);
    assert_eq!(*bob.losses(), 1);
}

#[test]
fn test_record_draw_counts_for_both_players() {
    let (_db, repo) = setup_test_db();
    let record = repo.record_finished_game(&drawn()).expect("Record failed");
    assert_eq!(record.status(), "draw");
    assert!(record.winner_id().is_none());

    for id in ["alice_1", "bob_1"] {
        let player = repo.get_player(id).unwrap().expect("player stored");
        assert_eq!(*player.draws(), 1);
        assert_eq!(*player.wins(), 0);
        assert_eq!(*player.losses(), 0);
    }
}

#[test]
fn test_active_session_is_not_recorded() {
    let (_db, repo) = setup_test_db();
    let session = Session::new(
        "alice_1".to_string(),
        "alice".to_string(),
        "bob_1".to_string(),
        "bob".to_string(),
        false,
    );
    assert!(repo.record_finished_game(&session).is_err());
    assert!(repo.get_player("alice_1").unwrap().is_none());
}

#[test]
fn test_same_game_cannot_be_recorded_twice() {
    let (_db, repo) = setup_test_db();
    let session = won_by_alice();
    repo.record_finished_game(&session).expect("First record failed");
    assert!(repo.record_finished_game(&session).is_err());

    // The failed transaction left the counters alone.
    let alice = repo.get_player("alice_1").unwrap().unwrap();
    assert_eq!(*alice.wins(), 1);
}

#[test]
fn test_leaderboard_orders_by_wins() {
    let (_db, repo) = setup_test_db();
    repo.record_finished_game(&won_by_alice()).unwrap();
    repo.record_finished_game(&won_by_alice()).unwrap();

    let board = repo.leaderboard(10).unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].id(), "alice_1");
    assert_eq!(*board[0].wins(), 2);
    assert_eq!(*board[1].losses(), 2);

    assert_eq!(repo.leaderboard(1).unwrap().len(), 1);
}

#[test]
fn test_missing_rows() {
    let (_db, repo) = setup_test_db();
    assert!(repo.get_player("nobody").unwrap().is_none());
    assert!(repo.get_game("nothing").unwrap().is_none());
}

#[tokio::test]
async fn test_finished_game_is_persisted_by_orchestrator() {
    let (_db, repo) = setup_test_db();
    let settings = OrchestratorSettings {
        opponent_notify_delay: Duration::ZERO,
        ..OrchestratorSettings::default()
    };
    let orchestrator = Orchestrator::new(settings, Analytics::disabled(), Some(repo.clone()));

    let (alice_frames, alice_rx) = futures::channel::mpsc::unbounded::<String>();
    let (alice_tx, mut alice_inbox) = tokio::sync::mpsc::unbounded_channel();
    let (bob_frames, bob_rx) = futures::channel::mpsc::unbounded::<String>();
    let (bob_tx, mut bob_inbox) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.run_connection(alice_rx, alice_tx).await }
    });
    tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.run_connection(bob_rx, bob_tx).await }
    });

    let join = |name: &str| json!({"type": "join", "payload": {"username": name}}).to_string();
    let play = |column: i32| json!({"type": "move", "payload": {"column": column}}).to_string();

    alice_frames.unbounded_send(join("alice")).unwrap();
    while orchestrator.matchmaking().waiting_count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    bob_frames.unbounded_send(join("bob")).unwrap();

    // Waits until the mover sees a board holding `total` pieces.
    async fn seen(inbox: &mut tokio::sync::mpsc::UnboundedReceiver<Outbound>, total: usize) -> Session {
        loop {
            if let Some(Outbound::Message(ServerMessage::GameState { payload, .. })) =
                inbox.recv().await
            {
                let board = payload.game.board();
                if board.count(four_in_a_row::Piece::One) + board.count(four_in_a_row::Piece::Two)
                    == total
                {
                    return payload.game;
                }
            }
        }
    }
    let start = seen(&mut bob_inbox, 0).await;
    seen(&mut alice_inbox, 0).await;

    let mut total = 0;
    for _ in 0..3 {
        alice_frames.unbounded_send(play(0)).unwrap();
        total += 1;
        seen(&mut alice_inbox, total).await;
        bob_frames.unbounded_send(play(1)).unwrap();
        total += 1;
        seen(&mut bob_inbox, total).await;
    }
    alice_frames.unbounded_send(play(0)).unwrap();
    let last = seen(&mut alice_inbox, total + 1).await;
    assert_eq!(last.status(), &SessionStatus::Won);

    let mut stored = None;
    for _ in 0..200 {
        stored = repo.get_game(start.id()).unwrap();
        if stored.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let stored = stored.expect("game was persisted");
    assert_eq!(stored.winner_id(), last.winner());

    let winner = repo
        .get_player(last.winner().as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(winner.username(), "alice");
    assert_eq!(*winner.wins(), 1);
}
