//! Roomcast relay server library.
//!
//! Exposes the relay server for use in tests and embedding. The relay
//! accepts WebSocket connections, tracks sessions and dynamically created
//! rooms, and fans events out to the correct subset of connected clients.

pub mod config;
pub mod relay;
pub mod rooms;
pub mod store;
