//! Socket transport for the voice backend
//!
//! A thin wrapper over one WebSocket connection:
//! - connect / disconnect / send
//! - three-state connection status pushed as events
//! - inbound text parsed as JSON when possible, raw otherwise

mod client;
mod types;

pub use client::{WsConnector, WsTransport};
pub use types::{
    ConnectionId, ConnectionState, Connector, Inbound, Outbound, Transport, TransportEvent,
    TransportEventKind,
};
