//! Relay server core: shared state, WebSocket handler, event dispatch, and
//! fan-out.
//!
//! Each client holds one WebSocket. The relay assigns a session id on
//! connect, greets the client with it, then dispatches every decoded
//! inbound event against the shared [`RelayStore`] under a single write
//! lock. Outbound events are enqueued into per-session unbounded channels
//! while the lock is held, so every recipient observes room events in the
//! relay's acceptance order; a dedicated writer task per connection drains
//! the channel to the socket.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use roomcast_proto::codec;
use roomcast_proto::event::{ClientEvent, ServerEvent};
use roomcast_proto::message::{MAX_MESSAGE_SIZE, Message, validate_text};
use roomcast_proto::typing::TypingUpdate;
use roomcast_proto::user::SessionId;
use tokio::sync::{RwLock, mpsc};

use crate::store::{Audience, RelayStore};

/// Shared relay state: the session/room store behind one lock, plus the
/// resolved message size limit.
pub struct RelayState {
    store: RwLock<RelayStore>,
    max_message_size: usize,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    /// Creates relay state with an empty store and the default message
    /// size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MAX_MESSAGE_SIZE)
    }

    /// Creates relay state with a custom message size limit.
    #[must_use]
    pub fn with_config(max_message_size: usize) -> Self {
        Self {
            store: RwLock::new(RelayStore::new()),
            max_message_size,
        }
    }

    /// Dispatches one inbound event from a session.
    ///
    /// The whole read-modify-broadcast sequence runs under the store's
    /// write lock; enqueueing outbound events never blocks, so a slow
    /// recipient cannot stall other sessions.
    pub async fn handle_event(&self, session_id: SessionId, event: ClientEvent) {
        let mut store = self.store.write().await;
        match event {
            ClientEvent::JoinUser { username, avatar } => {
                let Some(profile) = store.set_profile(session_id, username, avatar) else {
                    return;
                };
                tracing::info!(session_id = %session_id, username = %profile.username, "profile set");
                store.broadcast(Audience::AllUsers, &ServerEvent::UsersUpdate(store.users()));
                store.send_to(
                    session_id,
                    ServerEvent::RoomsUpdate(store.room_directory()),
                );
            }

            ClientEvent::JoinRoom {
                room_id, room_name, ..
            } => {
                let Some(outcome) = store.join_room(session_id, &room_id, room_name) else {
                    tracing::debug!(session_id = %session_id, room_id = %room_id, "join_room without profile ignored");
                    return;
                };
                if !outcome.newly_joined {
                    return;
                }
                tracing::info!(session_id = %session_id, room_id = %room_id, members = outcome.room.users.len(), "joined room");

                if !outcome.history.is_empty() {
                    store.send_to(
                        session_id,
                        ServerEvent::MessageHistory {
                            room_id: room_id.clone(),
                            messages: outcome.history,
                        },
                    );
                }

                let notice = Message::system(
                    room_id.clone(),
                    outcome.user.clone(),
                    format!("{} joined {}", outcome.user.username, outcome.room.name),
                );
                store.broadcast(
                    Audience::Room(&room_id),
                    &ServerEvent::UserJoinedRoom {
                        room: outcome.room,
                        user: outcome.user,
                        message: notice,
                    },
                );
                store.broadcast(
                    Audience::AllUsers,
                    &ServerEvent::RoomsUpdate(store.room_directory()),
                );
            }

            ClientEvent::SendMessage {
                id,
                room_id,
                message,
                timestamp,
            } => {
                let Some(author) = store.profile(session_id) else {
                    tracing::debug!(session_id = %session_id, "send_message without profile ignored");
                    return;
                };
                if let Err(e) = validate_text(&message, self.max_message_size) {
                    store.send_to(
                        session_id,
                        ServerEvent::MessageError {
                            error: e.to_string(),
                            room_id,
                        },
                    );
                    return;
                }

                let msg = Message::user(id, room_id.clone(), author, message, timestamp);
                if store.append_message(&room_id, msg.clone()) {
                    store.broadcast(Audience::Room(&room_id), &ServerEvent::ReceiveMessage(msg));
                } else {
                    tracing::debug!(session_id = %session_id, room_id = %room_id, "message to unknown room");
                    store.send_to(
                        session_id,
                        ServerEvent::MessageError {
                            error: "room not found".to_string(),
                            room_id,
                        },
                    );
                }
            }

            ClientEvent::Typing { room_id, is_typing } => {
                let Some(user) = store.set_typing(session_id, &room_id, is_typing) else {
                    return;
                };
                store.broadcast(
                    Audience::RoomExcept(&room_id, session_id),
                    &ServerEvent::UserTyping(TypingUpdate {
                        user,
                        room_id: room_id.clone(),
                        is_typing,
                    }),
                );
            }

            ClientEvent::LeaveRoom(room_id) => {
                let Some(outcome) = store.leave_room(session_id, &room_id) else {
                    return;
                };
                tracing::info!(session_id = %session_id, room_id = %room_id, deleted = outcome.deleted, "left room");

                let notice = Message::system(
                    room_id.clone(),
                    outcome.user.clone(),
                    format!("{} left {}", outcome.user.username, outcome.room.name),
                );
                store.send_to_many(
                    &outcome.remaining,
                    &ServerEvent::UserLeftRoom {
                        room: outcome.room,
                        user: outcome.user,
                        message: notice,
                    },
                );
                store.broadcast(
                    Audience::AllUsers,
                    &ServerEvent::RoomsUpdate(store.room_directory()),
                );
            }
        }
    }

    /// Runs the disconnect cascade for a departed session: leaves every
    /// room (with the usual notices and directory update), drops the
    /// session, and broadcasts the shrunk session list.
    pub async fn handle_disconnect(&self, session_id: SessionId) {
        let mut store = self.store.write().await;
        let outcome = store.disconnect(session_id);

        let rooms_changed = !outcome.left_rooms.is_empty();
        for left in outcome.left_rooms {
            let notice = Message::system(
                left.room.id.clone(),
                left.user.clone(),
                format!("{} left {}", left.user.username, left.room.name),
            );
            store.send_to_many(
                &left.remaining,
                &ServerEvent::UserLeftRoom {
                    room: left.room,
                    user: left.user,
                    message: notice,
                },
            );
        }
        if rooms_changed {
            store.broadcast(
                Audience::AllUsers,
                &ServerEvent::RoomsUpdate(store.room_directory()),
            );
        }
        if outcome.user.is_some() {
            store.broadcast(Audience::AllUsers, &ServerEvent::UsersUpdate(store.users()));
        }
    }
}

/// Handles an upgraded WebSocket connection for a single session.
///
/// The connection lifecycle:
/// 1. Register the session and send the `connected` greeting.
/// 2. Spawn a writer task draining the session's outbound channel.
/// 3. Read frames, decoding and dispatching each event.
/// 4. On close or transport loss, run the disconnect cascade.
pub async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let session_id = {
        let mut store = state.store.write().await;
        let id = store.connect(tx);
        store.send_to(id, ServerEvent::Connected { session_id: id });
        id
    };
    tracing::info!(session_id = %session_id, "session connected");

    // Writer task: encode and forward events from the channel to the socket.
    let mut write_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match codec::encode_server(&event) {
                Ok(text) => {
                    if ws_sender.send(WsMessage::Text(text.into())).await.is_err() {
                        tracing::warn!(session_id = %session_id, "WebSocket write failed");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(session_id = %session_id, error = %e, "failed to encode outbound event");
                }
            }
        }
    });

    // Reader loop: decode and dispatch incoming events from this session.
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = ws_receiver.next().await {
            match frame {
                WsMessage::Text(text) => match codec::decode_client(text.as_str()) {
                    Ok(event) => reader_state.handle_event(session_id, event).await,
                    Err(e) => {
                        tracing::warn!(session_id = %session_id, error = %e, "dropping undecodable frame");
                    }
                },
                WsMessage::Close(_) => {
                    tracing::info!(session_id = %session_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore binary, ping, pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.handle_disconnect(session_id).await;
    tracing::info!(session_id = %session_id, "session disconnected");
}

/// Starts the relay server on the given address and returns the bound
/// address and a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(RelayState::new())).await
}

/// Starts the relay server with a pre-configured [`RelayState`].
///
/// Use [`RelayState::with_config`] to create a state from a resolved
/// [`crate::config::RelayConfig`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<RelayState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "relay server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<RelayState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
