use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::protocol::WireFrame;

/// Normalized socket connection state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Identifies one connection attempt. Notifications from a replaced or
/// closed attempt keep their old id and can be recognized as stale.
pub type ConnectionId = u64;

/// Payload accepted by `Transport::send`
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Binary(Vec<u8>),
    /// Sent as a JSON text frame
    Json(Value),
}

impl Outbound {
    /// Wrap any serializable structure as a JSON payload
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Outbound::Json(serde_json::to_value(value)?))
    }
}

impl From<WireFrame> for Outbound {
    fn from(frame: WireFrame) -> Self {
        match frame {
            WireFrame::Text(text) => Outbound::Text(text),
            WireFrame::Binary(bytes) => Outbound::Binary(bytes),
        }
    }
}

impl From<String> for Outbound {
    fn from(text: String) -> Self {
        Outbound::Text(text)
    }
}

impl From<Vec<u8>> for Outbound {
    fn from(bytes: Vec<u8>) -> Self {
        Outbound::Binary(bytes)
    }
}

impl From<Value> for Outbound {
    fn from(value: Value) -> Self {
        Outbound::Json(value)
    }
}

/// Message received from the socket
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Text frame that parsed as JSON
    Json(Value),
    /// Text frame that did not parse; forwarded unchanged
    Raw(String),
    Binary(Vec<u8>),
}

impl Inbound {
    pub fn from_text(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => Inbound::Json(value),
            Err(_) => Inbound::Raw(text),
        }
    }
}

/// Notification pushed by a transport
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub connection: ConnectionId,
    pub kind: TransportEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    StateChanged(ConnectionState),
    Message(Inbound),
    /// Reported separately; the following close is what changes state
    Error(String),
}

/// Socket wrapper driven by the session
pub trait Transport {
    /// Id of the current connection attempt
    fn id(&self) -> ConnectionId;

    /// Open the socket. No-op if already connected; any non-open socket is torn down first.
    fn connect(&mut self);

    /// Close the socket and report `Disconnected` immediately
    fn disconnect(&mut self);

    /// Returns false if the socket is not open
    fn send(&mut self, payload: Outbound) -> bool;

    fn state(&self) -> ConnectionState;
}

/// Opens fresh transports for the session
pub trait Connector {
    fn open(&mut self) -> Box<dyn Transport>;
}
