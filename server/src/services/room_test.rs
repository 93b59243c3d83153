use super::*;
use crate::config::RelayConfig;
use serde_json::json;

fn test_state() -> AppState {
    AppState::new(RelayConfig::default())
}

fn frame(n: u64) -> Frame {
    Frame::request(frames::SYSCALL_DRAWING, json!({ "seq": n }))
}

#[test]
fn room_names_are_validated() {
    assert_eq!(validate_name("  lobby "), Ok("lobby"));
    assert!(validate_name("").is_err());
    assert!(validate_name("   ").is_err());
    assert!(validate_name("a\nb").is_err());
    assert!(validate_name(&"x".repeat(MAX_ROOM_NAME)).is_ok());
    assert!(validate_name(&"x".repeat(MAX_ROOM_NAME + 1)).is_err());
}

#[test]
fn error_codes_are_stable() {
    assert_eq!(RoomError::NotJoined.error_code(), "E_NOT_JOINED");
    assert_eq!(RoomError::MissingName.error_code(), "E_ROOM_REQUIRED");
    assert_eq!(RoomError::Evicted.error_code(), "E_EVICTED");
}

#[tokio::test]
async fn join_and_part_evicts_empty_room() {
    let state = test_state();
    let (a_tx, _a_rx) = mpsc::channel(4);
    let (b_tx, _b_rx) = mpsc::channel(4);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    assert_eq!(join_room(&state, "r", a, a_tx).await, 1);
    assert_eq!(join_room(&state, "r", b, b_tx).await, 2);

    assert!(part_room(&state, "r", a).await.is_some());
    assert_eq!(member_count(&state, "r").await, 1);
    assert!(part_room(&state, "r", b).await.is_some());
    assert!(!state.rooms.read().await.contains_key("r"));

    // Parting twice or from an unknown room is harmless.
    assert!(part_room(&state, "r", b).await.is_none());
    assert!(part_room(&state, "nowhere", a).await.is_none());
}

#[tokio::test]
async fn broadcast_excludes_sender_and_keeps_order() {
    let state = test_state();
    let (a_tx, mut a_rx) = mpsc::channel(8);
    let (b_tx, mut b_rx) = mpsc::channel(8);
    let a = Uuid::new_v4();
    join_room(&state, "r", a, a_tx).await;
    join_room(&state, "r", Uuid::new_v4(), b_tx).await;

    for n in 0..5 {
        let fanout = broadcast(&state, "r", &frame(n), Some(a)).await;
        assert_eq!(fanout, Fanout { delivered: 1, evicted: 0 });
    }

    for n in 0..5 {
        let got = b_rx.recv().await.unwrap();
        assert_eq!(got.data["seq"], json!(n));
    }
    assert!(a_rx.try_recv().is_err());
}

#[tokio::test]
async fn rooms_are_isolated() {
    let state = test_state();
    let (a_tx, _a_rx) = mpsc::channel(8);
    let (b_tx, mut b_rx) = mpsc::channel(8);
    let a = Uuid::new_v4();
    join_room(&state, "one", a, a_tx).await;
    join_room(&state, "two", Uuid::new_v4(), b_tx).await;

    let fanout = broadcast(&state, "one", &frame(1), Some(a)).await;
    assert_eq!(fanout.delivered, 0);
    assert!(b_rx.try_recv().is_err());
}

#[tokio::test]
async fn lagging_client_is_evicted_not_skipped() {
    let state = test_state();
    let sender = Uuid::new_v4();
    let slow = Uuid::new_v4();
    let (sender_tx, _sender_rx) = mpsc::channel(4);
    let (slow_tx, mut slow_rx) = mpsc::channel(1);
    let (fast_tx, mut fast_rx) = mpsc::channel(8);
    join_room(&state, "r", sender, sender_tx).await;
    join_room(&state, "r", slow, slow_tx).await;
    join_room(&state, "r", Uuid::new_v4(), fast_tx).await;

    let first = broadcast(&state, "r", &frame(1), Some(sender)).await;
    let second = broadcast(&state, "r", &frame(2), Some(sender)).await;
    let third = broadcast(&state, "r", &frame(3), Some(sender)).await;
    assert_eq!(first, Fanout { delivered: 2, evicted: 0 });
    assert_eq!(second, Fanout { delivered: 1, evicted: 1 });
    assert_eq!(third, Fanout { delivered: 1, evicted: 0 });
    assert_eq!(member_count(&state, "r").await, 2);
    assert!(!state.rooms.read().await["r"].clients.contains_key(&slow));

    // The slow client drains what it was sent, then sees its queue close
    // instead of a gap in the sequence.
    assert_eq!(slow_rx.recv().await.unwrap().data["seq"], json!(1));
    assert!(slow_rx.recv().await.is_none());

    for n in 1..=3 {
        assert_eq!(fast_rx.recv().await.unwrap().data["seq"], json!(n));
    }
}

#[tokio::test]
async fn closed_queue_is_evicted() {
    let state = test_state();
    let (gone_tx, gone_rx) = mpsc::channel(4);
    join_room(&state, "r", Uuid::new_v4(), gone_tx).await;
    drop(gone_rx);

    let fanout = broadcast(&state, "r", &frame(1), None).await;
    assert_eq!(fanout, Fanout { delivered: 0, evicted: 1 });
    assert!(!state.rooms.read().await.contains_key("r"));
}

#[tokio::test]
async fn broadcast_to_missing_room_is_noop() {
    let state = test_state();
    assert_eq!(broadcast(&state, "ghost", &frame(1), None).await, Fanout::default());
}
