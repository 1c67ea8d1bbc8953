//! Tests for the heuristic bot against live sessions.

use four_in_a_row::{BOT_ID, Session, SessionStore, make_bot_move};

fn bot_session(store: &SessionStore) -> Session {
    store.create(
        "alice_1".to_string(),
        "alice".to_string(),
        BOT_ID.to_string(),
        "Bot".to_string(),
        true,
    )
}

#[test]
fn test_bot_completes_bottom_row() {
    let store = SessionStore::new();
    let id = bot_session(&store).id().clone();

    for (human, bot) in [(6, 0), (6, 1), (5, 2)] {
        store.apply_move(&id, "alice_1", human).unwrap();
        store.apply_move(&id, BOT_ID, bot).unwrap();
    }
    let session = store.apply_move(&id, "alice_1", 5).unwrap();

    assert!(session.is_bot_turn());
    assert_eq!(make_bot_move(&session), Some(3));
}

#[test]
fn test_bot_blocks_vertical_threat() {
    let store = SessionStore::new();
    let id = bot_session(&store).id().clone();

    store.apply_move(&id, "alice_1", 0).unwrap();
    store.apply_move(&id, BOT_ID, 6).unwrap();
    store.apply_move(&id, "alice_1", 0).unwrap();
    store.apply_move(&id, BOT_ID, 6).unwrap();
    let session = store.apply_move(&id, "alice_1", 0).unwrap();

    assert_eq!(make_bot_move(&session), Some(0));
}

#[test]
fn test_bot_opens_in_centre() {
    let store = SessionStore::new();
    let id = bot_session(&store).id().clone();
    let session = store.apply_move(&id, "alice_1", 0).unwrap();
    assert_eq!(make_bot_move(&session), Some(3));
}

#[test]
fn test_bot_leaves_session_untouched() {
    let store = SessionStore::new();
    let id = bot_session(&store).id().clone();
    let session = store.apply_move(&id, "alice_1", 2).unwrap();
    let before = session.clone();
    make_bot_move(&session);
    assert_eq!(session, before);
    assert_eq!(store.get(&id).unwrap(), before);
}
