// Integration tests for the WebSocket transport
//
// These tests run a local tokio-tungstenite server and verify connection
// state reporting, inbound payload classification and a full session turn
// over a real socket.

use anyhow::{anyhow, Result};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use voicechat::audio::{completion_channel, NullSink};
use voicechat::protocol::{decode_audio_frame, pcm::encode_pcm16_base64};
use voicechat::session::{CaptureEvent, PlaybackState, Session, SessionConfig, SessionRunner};
use voicechat::transport::{
    ConnectionState, Inbound, Outbound, Transport, TransportEvent, TransportEventKind, WsConnector,
    WsTransport,
};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn echo_server() -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if (message.is_text() || message.is_binary()) && ws.send(message).await.is_err()
                    {
                        break;
                    }
                }
            });
        }
    });

    Ok(addr)
}

/// Answers one utterance the way the voice backend does
async fn voice_server() -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };

        let mut samples = 0;
        while let Some(Ok(message)) = ws.next().await {
            let replies = match message {
                Message::Binary(bytes) => match decode_audio_frame(&bytes) {
                    Ok(frame) => {
                        samples = frame.samples.len();
                        vec![]
                    }
                    Err(e) => vec![json!({"type": "error", "code": "BAD_FRAME", "message": e.to_string()})],
                },
                Message::Text(text) => {
                    let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
                    if value["type"] == "vad.end" {
                        let speech = encode_pcm16_base64(&vec![0.1f32; 480]);
                        vec![
                            json!({"type": "stt.final", "text": format!("{} samples", samples), "latency_ms": 42.5}),
                            json!({"type": "llm.start"}),
                            json!({"type": "llm.delta", "text": "heard "}),
                            json!({"type": "llm.delta", "text": "you"}),
                            json!({"type": "llm.end", "latency_ms": 100, "ttft_ms": 12}),
                            json!({"type": "tts.chunk", "audio": speech, "sampleRate": 24000, "format": "pcm16"}),
                            json!({"type": "tts.chunk", "audio": speech, "sampleRate": 24000, "format": "pcm16"}),
                            json!({"type": "tts.end", "latency_ms": 250}),
                        ]
                    } else {
                        vec![]
                    }
                }
                _ => vec![],
            };

            for reply in replies {
                if ws.send(Message::text(reply.to_string())).await.is_err() {
                    return;
                }
            }
        }
    });

    Ok(addr)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> Result<TransportEvent> {
    tokio::time::timeout(TIMEOUT, rx.recv())
        .await?
        .ok_or_else(|| anyhow!("event channel closed"))
}

async fn wait_for_state(
    rx: &mut mpsc::UnboundedReceiver<TransportEvent>,
    state: ConnectionState,
) -> Result<()> {
    loop {
        if let TransportEventKind::StateChanged(s) = next_event(rx).await?.kind {
            if s == state {
                return Ok(());
            }
        }
    }
}

async fn next_message(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> Result<Inbound> {
    loop {
        if let TransportEventKind::Message(inbound) = next_event(rx).await?.kind {
            return Ok(inbound);
        }
    }
}

#[tokio::test]
async fn test_connect_reports_states() -> Result<()> {
    let addr = echo_server().await?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new(format!("ws://{}", addr), tx);

    assert_eq!(transport.state(), ConnectionState::Disconnected);
    assert!(!transport.send(Outbound::Text("early".to_string())));

    transport.connect();
    let id = transport.id();

    let first = next_event(&mut rx).await?;
    assert_eq!(first.connection, id);
    assert_eq!(
        first.kind,
        TransportEventKind::StateChanged(ConnectionState::Connecting)
    );

    let second = next_event(&mut rx).await?;
    assert_eq!(
        second.kind,
        TransportEventKind::StateChanged(ConnectionState::Connected)
    );
    assert_eq!(transport.state(), ConnectionState::Connected);

    // Already connected: no new attempt
    transport.connect();
    assert_eq!(transport.id(), id);

    transport.disconnect();
    assert_eq!(transport.state(), ConnectionState::Disconnected);
    assert_eq!(
        next_event(&mut rx).await?.kind,
        TransportEventKind::StateChanged(ConnectionState::Disconnected)
    );
    assert!(!transport.send(Outbound::Text("late".to_string())));

    Ok(())
}

#[tokio::test]
async fn test_inbound_payload_classification() -> Result<()> {
    let addr = echo_server().await?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new(format!("ws://{}", addr), tx);

    transport.connect();
    wait_for_state(&mut rx, ConnectionState::Connected).await?;

    assert!(transport.send(Outbound::Json(json!({"type": "stt.partial", "text": "hi"}))));
    assert_eq!(
        next_message(&mut rx).await?,
        Inbound::Json(json!({"type": "stt.partial", "text": "hi"}))
    );

    assert!(transport.send(Outbound::Text("not json".to_string())));
    assert_eq!(
        next_message(&mut rx).await?,
        Inbound::Raw("not json".to_string())
    );

    assert!(transport.send(Outbound::Binary(vec![1, 2, 3])));
    assert_eq!(next_message(&mut rx).await?, Inbound::Binary(vec![1, 2, 3]));

    let payload = Outbound::json(&json!({"type": "cancel"}))?;
    assert!(transport.send(payload));
    assert_eq!(
        next_message(&mut rx).await?,
        Inbound::Json(json!({"type": "cancel"}))
    );

    transport.disconnect();
    Ok(())
}

#[tokio::test]
async fn test_refused_connection_reports_disconnected() -> Result<()> {
    // Reserve a port, then close it so nothing is listening
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        listener.local_addr()?
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new(format!("ws://{}", addr), tx);
    transport.connect();

    let mut saw_error = false;
    loop {
        match next_event(&mut rx).await?.kind {
            TransportEventKind::Error(_) => saw_error = true,
            TransportEventKind::StateChanged(ConnectionState::Disconnected) => break,
            _ => {}
        }
    }

    assert!(saw_error, "error is reported before the close");
    assert_eq!(transport.state(), ConnectionState::Disconnected);
    assert!(!transport.send(Outbound::Text("x".to_string())));

    Ok(())
}

#[test]
fn test_connect_without_runtime() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = WsTransport::new("ws://127.0.0.1:9", tx);

    transport.connect();

    let states: Vec<TransportEventKind> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        states,
        vec![
            TransportEventKind::StateChanged(ConnectionState::Connecting),
            TransportEventKind::StateChanged(ConnectionState::Disconnected),
        ]
    );
    assert_eq!(transport.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_session_turn_over_websocket() -> Result<()> {
    let addr = voice_server().await?;
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let (completion_tx, completion_rx) = completion_channel();
    let (capture_tx, capture_rx) = mpsc::unbounded_channel();

    let session = Session::new(
        SessionConfig::default(),
        Box::new(WsConnector::new(format!("ws://{}", addr), transport_tx)),
        Box::new(NullSink::new(completion_tx)),
    );
    let mut runner = SessionRunner::new(session, transport_rx, completion_rx, capture_rx);

    runner.session_mut().connect();
    let connected = tokio::time::timeout(
        TIMEOUT,
        runner.run_until(|s| s.connection_state() == ConnectionState::Connected),
    )
    .await?;
    assert!(connected);
    assert!(runner.session_mut().start_listening());

    capture_tx.send(CaptureEvent::SpeechStarted)?;
    capture_tx.send(CaptureEvent::SpeechEnded(vec![0.0; 320]))?;

    let finished = tokio::time::timeout(
        TIMEOUT,
        runner.run_until(|s| s.turns_completed() >= 1),
    )
    .await?;
    assert!(finished);

    let session = runner.session();
    assert_eq!(session.recognition_results()[0].text, "320 samples");
    assert_eq!(session.recognition_results()[0].latency_ms, 42.5);
    assert_eq!(session.generation_results()[0].text, "heard you");
    assert_eq!(session.tts_latency_ms(), Some(250.0));
    assert_eq!(session.playback_state(), PlaybackState::Idle);
    assert!(session.recording_state().is_idle());

    runner.session_mut().disconnect();
    assert_eq!(
        runner.session().connection_state(),
        ConnectionState::Disconnected
    );

    Ok(())
}
