pub mod codec;
pub mod events;
pub mod pcm;

pub use codec::{
    decode_audio_frame, encode, encode_audio_frame, parse_server_event, parse_server_text,
    DecodedAudioFrame, FrameError, WireFrame,
};
pub use events::{
    AudioFormat, AudioFrameHeader, ClientEvent, ParsedEvent, ServerEvent, CAPTURE_SAMPLE_RATE,
};
