// Wire codec for the voice chat socket
//
// Outbound control events are JSON text frames. vad.audio is the only binary
// frame, laid out as:
//
//   [u32 LE header length][UTF-8 JSON header][PCM16 LE samples]
//
// The backend reads the length prefix first, so the header length is the
// load-bearing field, not the JSON key order.

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use super::events::{AudioFrameHeader, ClientEvent, ParsedEvent, ServerEvent};
use super::pcm::{bytes_to_pcm16, pcm16_to_bytes};

const LENGTH_PREFIX_BYTES: usize = 4;

/// A serialized client event, ready for the transport
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// Errors from the backend-side binary frame parser
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short for length prefix ({0} bytes)")]
    MissingPrefix(usize),

    #[error("header length {header} exceeds frame body of {available} bytes")]
    HeaderOverrun { header: usize, available: usize },

    #[error("invalid frame header: {0}")]
    InvalidHeader(String),

    #[error("unexpected frame type {0:?}")]
    UnexpectedType(String),

    #[error("PCM payload has odd length {0}")]
    OddPayload(usize),
}

/// Audio decoded from a binary vad.audio frame
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudioFrame {
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

/// Serialize a client event for the socket
pub fn encode(event: &ClientEvent) -> WireFrame {
    match event {
        ClientEvent::VadAudio { audio, sample_rate } => {
            WireFrame::Binary(encode_audio_frame(audio, *sample_rate))
        }
        ClientEvent::VadStart { timestamp } => WireFrame::Text(
            json!({ "type": event.kind(), "timestamp": timestamp }).to_string(),
        ),
        ClientEvent::VadEnd { timestamp } => WireFrame::Text(
            json!({ "type": event.kind(), "timestamp": timestamp }).to_string(),
        ),
        ClientEvent::Cancel => WireFrame::Text(json!({ "type": event.kind() }).to_string()),
    }
}

/// Build the length-prefixed binary audio frame
pub fn encode_audio_frame(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let header = AudioFrameHeader {
        kind: "vad.audio".to_string(),
        sample_rate,
    };
    // Serializing a plain struct of a string and an integer cannot fail
    let header_bytes = serde_json::to_vec(&header).unwrap_or_default();
    let pcm = pcm16_to_bytes(samples);

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_BYTES + header_bytes.len() + pcm.len());
    frame.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    frame.extend_from_slice(&header_bytes);
    frame.extend_from_slice(&pcm);
    frame
}

/// Parse a binary audio frame the way the backend does
pub fn decode_audio_frame(frame: &[u8]) -> Result<DecodedAudioFrame, FrameError> {
    if frame.len() < LENGTH_PREFIX_BYTES {
        return Err(FrameError::MissingPrefix(frame.len()));
    }

    let mut prefix = [0u8; LENGTH_PREFIX_BYTES];
    prefix.copy_from_slice(&frame[..LENGTH_PREFIX_BYTES]);
    let header_len = u32::from_le_bytes(prefix) as usize;

    let body = &frame[LENGTH_PREFIX_BYTES..];
    if header_len > body.len() {
        return Err(FrameError::HeaderOverrun {
            header: header_len,
            available: body.len(),
        });
    }

    let (header_bytes, pcm) = body.split_at(header_len);
    let header: AudioFrameHeader = serde_json::from_slice(header_bytes)
        .map_err(|e| FrameError::InvalidHeader(e.to_string()))?;

    if header.kind != "vad.audio" {
        return Err(FrameError::UnexpectedType(header.kind));
    }

    let samples = bytes_to_pcm16(pcm).ok_or(FrameError::OddPayload(pcm.len()))?;

    Ok(DecodedAudioFrame {
        sample_rate: header.sample_rate,
        samples,
    })
}

/// Validate an inbound JSON value into a typed server event
pub fn parse_server_event(value: &Value) -> ParsedEvent {
    match ServerEvent::deserialize(value) {
        Ok(event) if event.is_well_formed() => ParsedEvent::Event(event),
        Ok(event) => {
            debug!("Dropping {} event with out-of-range values", event.kind());
            ParsedEvent::Unrecognized
        }
        Err(e) => {
            debug!("Dropping unrecognized server payload: {}", e);
            ParsedEvent::Unrecognized
        }
    }
}

/// Parse a raw text frame; non-JSON text is unrecognized
pub fn parse_server_text(text: &str) -> ParsedEvent {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => parse_server_event(&value),
        Err(_) => ParsedEvent::Unrecognized,
    }
}
