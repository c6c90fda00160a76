//! Integration tests for room lifecycle: lazy creation, idempotent joins,
//! leaves, and empty-room deletion.
//!
//! Verification command: `cargo test --test room_lifecycle`

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use roomcast_proto::codec;
use roomcast_proto::event::{ClientEvent, ServerEvent};
use roomcast_proto::user::SessionId;
use roomcast_relay::relay::start_server;
use tokio_tungstenite::tungstenite;

// =============================================================================
// Type aliases and helpers
// =============================================================================

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Starts a relay server on a random port for testing.
async fn start_relay() -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
    start_server("127.0.0.1:0")
        .await
        .expect("failed to start test relay")
}

/// Connects a WebSocket client and consumes the `connected` greeting.
async fn connect(addr: std::net::SocketAddr) -> (WsStream, SessionId) {
    let url = format!("ws://{addr}/ws");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let greeting = recv(&mut ws).await;
    let ServerEvent::Connected { session_id } = greeting else {
        panic!("expected Connected greeting, got {greeting:?}");
    };
    (ws, session_id)
}

/// Sends a client event as a JSON text frame.
async fn send(ws: &mut WsStream, event: &ClientEvent) {
    let text = codec::encode_client(event).unwrap();
    ws.send(tungstenite::Message::Text(text.into()))
        .await
        .unwrap();
}

/// Receives and decodes one server event, with a timeout.
async fn recv(ws: &mut WsStream) -> ServerEvent {
    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("recv timed out")
        .unwrap()
        .unwrap();
    codec::decode_server(frame.into_text().unwrap().as_str()).unwrap()
}

/// Sets the session profile and consumes the resulting `users_update` and
/// `rooms_update` events on this stream.
async fn join_user(ws: &mut WsStream, username: &str) {
    send(
        ws,
        &ClientEvent::JoinUser {
            username: username.into(),
            avatar: None,
        },
    )
    .await;
    assert!(matches!(recv(ws).await, ServerEvent::UsersUpdate(_)));
    assert!(matches!(recv(ws).await, ServerEvent::RoomsUpdate(_)));
}

fn join_room(room_id: &str, room_name: Option<&str>) -> ClientEvent {
    ClientEvent::JoinRoom {
        room_id: room_id.into(),
        room_name: room_name.map(Into::into),
        username: None,
    }
}

fn chat(room_id: &str, text: &str) -> ClientEvent {
    ClientEvent::SendMessage {
        id: None,
        room_id: room_id.into(),
        message: text.into(),
        timestamp: None,
    }
}

// =============================================================================
// Room creation and messaging
// =============================================================================

/// First `join_room` with an unknown id creates the room; the directory
/// lists it with the joiner as its only member, and a message sent to it
/// comes back through `receive_message`.
#[tokio::test]
async fn create_room_then_send_message() {
    let (addr, _handle) = start_relay().await;
    let (mut ws, session_id) = connect(addr).await;
    join_user(&mut ws, "xavier").await;

    send(&mut ws, &join_room("r1", Some("Test Room"))).await;

    let joined = recv(&mut ws).await;
    let ServerEvent::UserJoinedRoom { room, user, message } = joined else {
        panic!("expected UserJoinedRoom, got {joined:?}");
    };
    assert_eq!(room.id, "r1");
    assert_eq!(room.name, "Test Room");
    assert_eq!(user.id, session_id);
    assert!(message.system);

    let directory = recv(&mut ws).await;
    let ServerEvent::RoomsUpdate(rooms) = directory else {
        panic!("expected RoomsUpdate, got {directory:?}");
    };
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].id, "r1");
    assert_eq!(rooms[0].name, "Test Room");
    assert_eq!(rooms[0].users.len(), 1);
    assert_eq!(rooms[0].users[0].id, session_id);

    send(&mut ws, &chat("r1", "hello")).await;
    let received = recv(&mut ws).await;
    let ServerEvent::ReceiveMessage(msg) = received else {
        panic!("expected ReceiveMessage, got {received:?}");
    };
    assert_eq!(msg.text, "hello");
    assert_eq!(msg.room_id, "r1");
}

/// A room created without a name gets a label generated from its id.
#[tokio::test]
async fn room_name_falls_back_to_generated_label() {
    let (addr, _handle) = start_relay().await;
    let (mut ws, _) = connect(addr).await;
    join_user(&mut ws, "xavier").await;

    send(&mut ws, &join_room("r2", None)).await;
    let joined = recv(&mut ws).await;
    let ServerEvent::UserJoinedRoom { room, .. } = joined else {
        panic!("expected UserJoinedRoom, got {joined:?}");
    };
    assert_eq!(room.name, "Room r2");
}

// =============================================================================
// Idempotent membership
// =============================================================================

/// Two sessions joining the same room each appear exactly once, and a
/// re-join neither duplicates the member nor re-broadcasts anything.
#[tokio::test]
async fn members_listed_once_even_after_rejoin() {
    let (addr, _handle) = start_relay().await;
    let (mut ws_x, x) = connect(addr).await;
    let (mut ws_y, y) = connect(addr).await;
    join_user(&mut ws_x, "xavier").await;
    join_user(&mut ws_y, "yara").await;
    // Xavier observes Yara's arrival.
    assert!(matches!(recv(&mut ws_x).await, ServerEvent::UsersUpdate(_)));

    send(&mut ws_x, &join_room("r1", Some("General"))).await;
    assert!(matches!(recv(&mut ws_x).await, ServerEvent::UserJoinedRoom { .. }));
    assert!(matches!(recv(&mut ws_x).await, ServerEvent::RoomsUpdate(_)));
    assert!(matches!(recv(&mut ws_y).await, ServerEvent::RoomsUpdate(_)));

    send(&mut ws_y, &join_room("r1", None)).await;
    assert!(matches!(recv(&mut ws_y).await, ServerEvent::UserJoinedRoom { .. }));
    let directory = recv(&mut ws_y).await;
    let ServerEvent::RoomsUpdate(rooms) = directory else {
        panic!("expected RoomsUpdate, got {directory:?}");
    };
    let members: Vec<SessionId> = rooms[0].users.iter().map(|u| u.id).collect();
    assert_eq!(members, vec![x, y]);
    assert!(matches!(recv(&mut ws_x).await, ServerEvent::UserJoinedRoom { .. }));
    assert!(matches!(recv(&mut ws_x).await, ServerEvent::RoomsUpdate(_)));

    // Re-join: a no-op with no broadcasts. The next thing either client
    // sees must be the sentinel message, with membership unchanged.
    send(&mut ws_x, &join_room("r1", None)).await;
    send(&mut ws_x, &chat("r1", "sentinel")).await;

    for ws in [&mut ws_x, &mut ws_y] {
        let event = recv(ws).await;
        let ServerEvent::ReceiveMessage(msg) = event else {
            panic!("expected ReceiveMessage sentinel, got {event:?}");
        };
        assert_eq!(msg.text, "sentinel");
    }
}

// =============================================================================
// Leaving and deletion
// =============================================================================

/// Leaving as the last member deletes the room from the directory.
#[tokio::test]
async fn last_leave_deletes_room() {
    let (addr, _handle) = start_relay().await;
    let (mut ws, _) = connect(addr).await;
    join_user(&mut ws, "xavier").await;

    send(&mut ws, &join_room("r1", Some("General"))).await;
    assert!(matches!(recv(&mut ws).await, ServerEvent::UserJoinedRoom { .. }));
    assert!(matches!(recv(&mut ws).await, ServerEvent::RoomsUpdate(_)));

    send(&mut ws, &ClientEvent::LeaveRoom("r1".into())).await;
    let directory = recv(&mut ws).await;
    let ServerEvent::RoomsUpdate(rooms) = directory else {
        panic!("expected RoomsUpdate, got {directory:?}");
    };
    assert!(rooms.is_empty());
}

/// Leaving while other members remain keeps the room alive and notifies
/// the remaining members.
#[tokio::test]
async fn room_survives_when_members_remain() {
    let (addr, _handle) = start_relay().await;
    let (mut ws_x, x) = connect(addr).await;
    let (mut ws_y, y) = connect(addr).await;
    join_user(&mut ws_x, "xavier").await;
    join_user(&mut ws_y, "yara").await;
    assert!(matches!(recv(&mut ws_x).await, ServerEvent::UsersUpdate(_)));

    send(&mut ws_x, &join_room("r1", Some("General"))).await;
    assert!(matches!(recv(&mut ws_x).await, ServerEvent::UserJoinedRoom { .. }));
    assert!(matches!(recv(&mut ws_x).await, ServerEvent::RoomsUpdate(_)));
    assert!(matches!(recv(&mut ws_y).await, ServerEvent::RoomsUpdate(_)));
    send(&mut ws_y, &join_room("r1", None)).await;
    assert!(matches!(recv(&mut ws_y).await, ServerEvent::UserJoinedRoom { .. }));
    assert!(matches!(recv(&mut ws_y).await, ServerEvent::RoomsUpdate(_)));
    assert!(matches!(recv(&mut ws_x).await, ServerEvent::UserJoinedRoom { .. }));
    assert!(matches!(recv(&mut ws_x).await, ServerEvent::RoomsUpdate(_)));

    send(&mut ws_x, &ClientEvent::LeaveRoom("r1".into())).await;

    let left = recv(&mut ws_y).await;
    let ServerEvent::UserLeftRoom { room, user, message } = left else {
        panic!("expected UserLeftRoom, got {left:?}");
    };
    assert_eq!(user.id, x);
    assert_eq!(room.users.len(), 1);
    assert_eq!(room.users[0].id, y);
    assert!(message.system);

    let directory = recv(&mut ws_y).await;
    let ServerEvent::RoomsUpdate(rooms) = directory else {
        panic!("expected RoomsUpdate, got {directory:?}");
    };
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].users.len(), 1);
}

/// A room re-created after deletion starts from scratch: no history, and
/// the old name is gone.
#[tokio::test]
async fn recreated_room_starts_empty() {
    let (addr, _handle) = start_relay().await;
    let (mut ws, _) = connect(addr).await;
    join_user(&mut ws, "xavier").await;

    send(&mut ws, &join_room("r1", Some("Old Name"))).await;
    assert!(matches!(recv(&mut ws).await, ServerEvent::UserJoinedRoom { .. }));
    assert!(matches!(recv(&mut ws).await, ServerEvent::RoomsUpdate(_)));
    send(&mut ws, &chat("r1", "old history")).await;
    assert!(matches!(recv(&mut ws).await, ServerEvent::ReceiveMessage(_)));
    send(&mut ws, &ClientEvent::LeaveRoom("r1".into())).await;
    assert!(matches!(recv(&mut ws).await, ServerEvent::RoomsUpdate(_)));

    // Same id, no name: a fresh room with a generated label and no
    // history unicast (the first event must be the join notice).
    send(&mut ws, &join_room("r1", None)).await;
    let joined = recv(&mut ws).await;
    let ServerEvent::UserJoinedRoom { room, .. } = joined else {
        panic!("expected UserJoinedRoom first (no history), got {joined:?}");
    };
    assert_eq!(room.name, "Room r1");
}
