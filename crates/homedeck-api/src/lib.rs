// homedeck-api: Async Rust client for the homedeck backend (REST + SSE)

pub mod actions;
pub mod auth;
pub mod client;
pub mod dns;
pub mod error;
pub mod events;
pub mod models;
pub mod otk;
pub mod plugins;
pub mod servers;
pub mod transport;
pub mod users;

pub use client::BackendClient;
pub use error::Error;
pub use events::{EventEnvelope, EventStreamHandle, EventType, ObjectType, ReconnectConfig};
pub use transport::{TlsMode, TransportConfig};
