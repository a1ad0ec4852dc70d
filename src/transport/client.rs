use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::types::{
    ConnectionId, ConnectionState, Connector, Inbound, Outbound, Transport, TransportEvent,
    TransportEventKind,
};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst)
}

/// Pushes events for one connection attempt
#[derive(Clone)]
struct EventEmitter {
    connection: ConnectionId,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl EventEmitter {
    fn emit(&self, kind: TransportEventKind) {
        // A closed receiver means nobody is listening anymore
        let _ = self.events.send(TransportEvent {
            connection: self.connection,
            kind,
        });
    }
}

/// WebSocket transport backed by tokio-tungstenite.
///
/// The socket runs on a spawned task; `send` hands frames to it through a
/// channel and state changes come back through the event channel.
pub struct WsTransport {
    url: String,
    id: ConnectionId,
    events: mpsc::UnboundedSender<TransportEvent>,
    state_rx: watch::Receiver<ConnectionState>,
    outgoing: Option<mpsc::UnboundedSender<Message>>,
    task: Option<JoinHandle<()>>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            url: url.into(),
            id: next_connection_id(),
            events,
            state_rx: watch::channel(ConnectionState::Disconnected).1,
            outgoing: None,
            task: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn emitter(&self) -> EventEmitter {
        EventEmitter {
            connection: self.id,
            events: self.events.clone(),
        }
    }

    fn teardown(&mut self) {
        self.outgoing = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state_rx = watch::channel(ConnectionState::Disconnected).1;
    }
}

impl Transport for WsTransport {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn connect(&mut self) {
        if self.state() == ConnectionState::Connected {
            debug!("Already connected to {}", self.url);
            return;
        }

        self.teardown();
        self.id = next_connection_id();
        let emitter = self.emitter();

        emitter.emit(TransportEventKind::StateChanged(ConnectionState::Connecting));

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Cannot open socket without a tokio runtime: {}", e);
                emitter.emit(TransportEventKind::StateChanged(ConnectionState::Disconnected));
                return;
            }
        };

        info!("Connecting to {} (connection {})", self.url, self.id);

        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        self.state_rx = state_rx;
        self.outgoing = Some(outgoing_tx);
        self.task = Some(runtime.spawn(run_socket(
            self.url.clone(),
            emitter,
            state_tx,
            outgoing_rx,
        )));
    }

    fn disconnect(&mut self) {
        if self.task.is_some() {
            info!("Disconnecting from {} (connection {})", self.url, self.id);
        }
        self.teardown();
        self.emitter()
            .emit(TransportEventKind::StateChanged(ConnectionState::Disconnected));
    }

    fn send(&mut self, payload: Outbound) -> bool {
        if self.state() != ConnectionState::Connected {
            return false;
        }

        let message = match payload {
            Outbound::Text(text) => Message::text(text),
            Outbound::Binary(bytes) => Message::binary(bytes),
            Outbound::Json(value) => Message::text(value.to_string()),
        };

        match &self.outgoing {
            Some(outgoing) => outgoing.send(message).is_ok(),
            None => false,
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Socket task: connect, then pump outgoing frames and incoming messages until close
async fn run_socket(
    url: String,
    emitter: EventEmitter,
    state_tx: watch::Sender<ConnectionState>,
    mut outgoing_rx: mpsc::UnboundedReceiver<Message>,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!("Failed to connect to {}: {}", url, e);
            emitter.emit(TransportEventKind::Error(e.to_string()));
            state_tx.send_replace(ConnectionState::Disconnected);
            emitter.emit(TransportEventKind::StateChanged(ConnectionState::Disconnected));
            return;
        }
    };

    state_tx.send_replace(ConnectionState::Connected);
    emitter.emit(TransportEventKind::StateChanged(ConnectionState::Connected));
    info!("Connected to {}", url);

    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outgoing = outgoing_rx.recv() => match outgoing {
                Some(message) => {
                    if let Err(e) = sink.send(message).await {
                        warn!("Socket send failed: {}", e);
                        emitter.emit(TransportEventKind::Error(e.to_string()));
                        break;
                    }
                }
                None => {
                    // Transport dropped its sender
                    let _ = sink.close().await;
                    break;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    emitter.emit(TransportEventKind::Message(Inbound::from_text(text.to_string())));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    emitter.emit(TransportEventKind::Message(Inbound::Binary(bytes.to_vec())));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Server closed socket: {:?}", frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Socket error: {}", e);
                    emitter.emit(TransportEventKind::Error(e.to_string()));
                    break;
                }
                None => break,
            },
        }
    }

    state_tx.send_replace(ConnectionState::Disconnected);
    emitter.emit(TransportEventKind::StateChanged(ConnectionState::Disconnected));
    info!("Socket to {} closed", url);
}

/// Opens a `WsTransport` per session connect
pub struct WsConnector {
    url: String,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            url: url.into(),
            events,
        }
    }
}

impl Connector for WsConnector {
    fn open(&mut self) -> Box<dyn Transport> {
        Box::new(WsTransport::new(self.url.clone(), self.events.clone()))
    }
}
