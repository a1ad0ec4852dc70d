pub mod audio;
pub mod config;
pub mod history;
pub mod protocol;
pub mod session;
pub mod transport;

pub use audio::{AudioFile, AudioSegment, AudioSink, NullSink, PlaybackQueue, WavSink};
pub use config::Config;
pub use history::{Conversation, ConversationId, ConversationSource};
pub use protocol::{ClientEvent, ParsedEvent, ServerEvent};
pub use session::{CaptureEvent, Session, SessionConfig, SessionRunner, SessionStatus};
pub use transport::{ConnectionState, Connector, Transport, TransportEvent, WsConnector, WsTransport};
