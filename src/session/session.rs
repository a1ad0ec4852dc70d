use super::config::SessionConfig;
use super::state::{GenerationState, PlaybackState, RecordingState};
use super::stats::{GenerationResult, RecognitionResult, ServerError, SessionStatus, TimelineEntry};
use crate::audio::{AudioSink, PlaybackProgress, PlaybackQueue, SegmentId};
use crate::history::{Conversation, ConversationId, ConversationSource, Role};
use crate::protocol::{self, pcm, ClientEvent, ParsedEvent, ServerEvent};
use crate::transport::{
    ConnectionState, Connector, Inbound, Outbound, Transport, TransportEvent, TransportEventKind,
};
use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

/// The conversational turn state machine.
///
/// Owns the transport and the playback queue and applies, one at a time,
/// transport notifications, capture callbacks, segment completions and UI
/// commands. All transitions are synchronous.
pub struct Session {
    config: SessionConfig,
    connector: Box<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
    playback: PlaybackQueue,

    connection_state: ConnectionState,
    recording_state: RecordingState,
    generation_state: GenerationState,
    playback_state: PlaybackState,
    listening: bool,

    /// Between the first tts.chunk and tts.end (or an error, or a close)
    tts_streaming: bool,

    detector_loading: bool,
    detector_error: bool,

    partial_text: String,
    streaming_text: String,
    recognition_results: Vec<RecognitionResult>,
    generation_results: Vec<GenerationResult>,
    last_error: Option<ServerError>,
    tts_latency_ms: Option<f64>,
    turns_completed: usize,

    selected_conversation: Option<ConversationId>,
    historical: Option<Conversation>,
    loading_conversation: bool,
    conversation_error: Option<String>,
}

impl Session {
    pub fn new(config: SessionConfig, connector: Box<dyn Connector>, sink: Box<dyn AudioSink>) -> Self {
        let playback = PlaybackQueue::new(sink, config.queue_capacity);

        Self {
            config,
            connector,
            transport: None,
            playback,
            connection_state: ConnectionState::Disconnected,
            recording_state: RecordingState::Idle,
            generation_state: GenerationState::Idle,
            playback_state: PlaybackState::Idle,
            listening: false,
            tts_streaming: false,
            detector_loading: false,
            detector_error: false,
            partial_text: String::new(),
            streaming_text: String::new(),
            recognition_results: Vec::new(),
            generation_results: Vec::new(),
            last_error: None,
            tts_latency_ms: None,
            turns_completed: 0,
            selected_conversation: None,
            historical: None,
            loading_conversation: false,
            conversation_error: None,
        }
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    /// Open a fresh transport unless one is already connected
    pub fn connect(&mut self) {
        if let Some(transport) = &self.transport {
            if transport.state() == ConnectionState::Connected {
                debug!("Already connected");
                return;
            }
        }

        if let Some(mut stale) = self.transport.take() {
            stale.disconnect();
        }

        let mut transport = self.connector.open();
        transport.connect();
        self.connection_state = transport.state();
        info!(
            "Session connecting (connection {}, state {})",
            transport.id(),
            self.connection_state
        );
        self.transport = Some(transport);
    }

    /// Close the socket. Connection state, the transport and listening are reset
    /// and no further speech is expected; histories and buffered audio are kept.
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.disconnect();
        }
        self.connection_state = ConnectionState::Disconnected;
        self.listening = false;
        self.end_speech_stream();
        info!("Session disconnected");
    }

    /// Apply a notification from the transport; stale connections are ignored
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let current = self.transport.as_ref().map(|t| t.id());
        if current != Some(event.connection) {
            debug!("Ignoring event from stale connection {}", event.connection);
            return;
        }

        match event.kind {
            TransportEventKind::StateChanged(state) => {
                info!("Connection state: {} -> {}", self.connection_state, state);
                self.connection_state = state;
                if state == ConnectionState::Disconnected {
                    self.transport = None;
                    self.listening = false;
                    self.end_speech_stream();
                }
            }
            TransportEventKind::Message(inbound) => self.handle_inbound(inbound),
            TransportEventKind::Error(message) => {
                // The close that follows is authoritative for state
                warn!("Transport error: {}", message);
            }
        }
    }

    fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Json(value) => match protocol::parse_server_event(&value) {
                ParsedEvent::Event(event) => self.apply(event),
                ParsedEvent::Unrecognized => debug!("Dropped unrecognized frame"),
            },
            Inbound::Raw(text) => debug!("Dropped non-JSON frame ({} bytes)", text.len()),
            Inbound::Binary(bytes) => debug!("Dropped binary frame ({} bytes)", bytes.len()),
        }
    }

    fn send_event(&mut self, event: &ClientEvent) -> bool {
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };

        let sent = transport.send(Outbound::from(protocol::encode(event)));
        if !sent {
            warn!("Failed to send {}: socket not open", event.kind());
        }
        sent
    }

    // ------------------------------------------------------------------
    // Server events
    // ------------------------------------------------------------------

    /// Apply one server event. Ignored while disconnected, except `error`.
    pub fn apply(&mut self, event: ServerEvent) {
        if self.connection_state == ConnectionState::Disconnected
            && !matches!(event, ServerEvent::Error { .. })
        {
            debug!("Ignoring {} while disconnected", event.kind());
            return;
        }

        debug!("Applying {}", event.kind());

        match event {
            ServerEvent::SttPartial { text } => {
                self.partial_text = text;
            }
            ServerEvent::SttFinal { text, latency_ms } => {
                self.partial_text.clear();
                info!("Recognized: {} ({:.0}ms)", text, latency_ms);
                self.recognition_results.push(RecognitionResult {
                    text,
                    latency_ms,
                    timestamp: Utc::now(),
                });
                self.recording_state = RecordingState::Idle;
                self.last_error = None;
            }
            ServerEvent::LlmStart {} => {
                self.generation_state = GenerationState::Processing;
                self.streaming_text.clear();
            }
            ServerEvent::LlmDelta { text } => {
                if self.generation_abandoned() {
                    debug!("Dropping token of abandoned response");
                    return;
                }
                self.generation_state = GenerationState::Streaming;
                self.streaming_text.push_str(&text);
            }
            ServerEvent::LlmEnd { latency_ms, ttft_ms } => {
                if self.generation_abandoned() {
                    debug!("Dropping end of abandoned response");
                    return;
                }
                let text = std::mem::take(&mut self.streaming_text);
                info!(
                    "Response: {} ({:.0}ms, ttft {:.0}ms)",
                    text, latency_ms, ttft_ms
                );
                self.generation_results.push(GenerationResult {
                    text,
                    latency_ms,
                    ttft_ms,
                    timestamp: Utc::now(),
                });
                self.generation_state = GenerationState::Idle;
            }
            ServerEvent::TtsChunk {
                audio, sample_rate, ..
            } => self.play_chunk(&audio, sample_rate),
            ServerEvent::TtsEnd { latency_ms } => {
                self.tts_latency_ms = Some(latency_ms);
                // Buffered audio keeps playing; the drain finishes the turn
                self.end_speech_stream();
            }
            ServerEvent::Error { code, message } => {
                warn!("Server error {}: {}", code, message);
                self.last_error = Some(ServerError { code, message });
                self.recording_state = RecordingState::Idle;
                self.generation_state = GenerationState::Idle;
                self.tts_streaming = false;
                if !self.playback.is_active() {
                    self.playback_state = PlaybackState::Idle;
                }
            }
        }
    }

    fn play_chunk(&mut self, audio: &str, sample_rate: u32) {
        if let Err(e) = self.playback.resume() {
            warn!("Failed to activate output device: {}", e);
        }

        self.tts_streaming = true;
        // Playing until the stream ends, even if this chunk is unplayable
        self.playback_state = PlaybackState::Playing;

        match self.playback.enqueue(audio, sample_rate) {
            Ok(PlaybackProgress::Playing) => {}
            Ok(PlaybackProgress::Drained) => self.on_drained(),
            Ok(PlaybackProgress::Stale) => {}
            Err(e) => warn!("Dropping undecodable TTS chunk: {}", e),
        }
    }

    /// Feed back natural completion of a segment from the sink
    pub fn segment_finished(&mut self, id: SegmentId) {
        if self.playback.segment_finished(id) == PlaybackProgress::Drained {
            self.on_drained();
        }
    }

    fn on_drained(&mut self) {
        if self.tts_streaming {
            // More chunks expected; stay playing until tts.end
            debug!("Playback queue drained mid-stream");
            return;
        }
        self.finish_speaking();
    }

    /// No further chunks can arrive; finish now unless audio is still in flight
    fn end_speech_stream(&mut self) {
        self.tts_streaming = false;
        if !self.playback.is_active() {
            self.finish_speaking();
        }
    }

    fn finish_speaking(&mut self) {
        if self.playback_state != PlaybackState::Playing {
            debug!("No speech in progress");
            return;
        }
        self.playback_state = PlaybackState::Idle;
        self.turns_completed += 1;
        debug!("Turn {} finished speaking", self.turns_completed);
    }

    // ------------------------------------------------------------------
    // Capture
    // ------------------------------------------------------------------

    /// Arm speech detection. Only allowed while connected.
    pub fn start_listening(&mut self) -> bool {
        if self.connection_state != ConnectionState::Connected || self.listening {
            return false;
        }
        self.listening = true;
        self.recording_state = RecordingState::Idle;
        info!("Listening for speech");
        true
    }

    pub fn stop_listening(&mut self) {
        self.listening = false;
        self.recording_state = RecordingState::Idle;
    }

    /// Speech detection reported the start of an utterance
    pub fn speech_started(&mut self) {
        if self.connection_state == ConnectionState::Disconnected {
            debug!("Ignoring speech start while disconnected");
            return;
        }
        self.recording_state = RecordingState::Recording;
        self.send_event(&ClientEvent::vad_start_now());
    }

    /// Loading/error flags reported by the speech detector, surfaced read-only
    pub fn set_detector_status(&mut self, loading: bool, errored: bool) {
        if errored && !self.detector_error {
            warn!("Speech detector failed");
        } else if self.detector_loading && !loading && !errored {
            info!("Speech detector ready");
        }
        self.detector_loading = loading;
        self.detector_error = errored;
    }

    /// Speech detection fired on noise; return to idle
    pub fn speech_misfire(&mut self) {
        self.recording_state = RecordingState::Idle;
    }

    /// Speech detection reported the end of an utterance with the captured samples.
    ///
    /// Returns true once both the audio frame and vad.end were handed to the
    /// socket. The state only moves to `Processing` after the audio frame is accepted.
    pub fn speech_ended(&mut self, samples: &[f32]) -> bool {
        if self.transport.is_none() || self.connection_state == ConnectionState::Disconnected {
            self.recording_state = RecordingState::Idle;
            return false;
        }

        let audio = ClientEvent::VadAudio {
            audio: pcm::f32_to_pcm16(samples),
            sample_rate: self.config.capture_sample_rate,
        };
        if !self.send_event(&audio) {
            self.recording_state = RecordingState::Idle;
            return false;
        }

        self.send_event(&ClientEvent::vad_end_now());
        self.recording_state = RecordingState::Processing;
        info!("Sent utterance ({} samples)", samples.len());
        true
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Ask the backend to cancel and abort the local turn
    pub fn cancel(&mut self) -> bool {
        let sent = self.send_event(&ClientEvent::Cancel);

        self.stop_playback();
        self.tts_streaming = false;
        self.streaming_text.clear();
        self.generation_state = GenerationState::Idle;
        if self.recording_state == RecordingState::Processing {
            self.recording_state = RecordingState::Idle;
        }

        info!("Turn cancelled (sent={})", sent);
        sent
    }

    /// Halt speech output and discard buffered audio
    pub fn stop_playback(&mut self) {
        self.playback.stop();
        self.playback_state = PlaybackState::Idle;
    }

    /// Clear all live session state; the connection is left alone
    pub fn reset(&mut self) {
        self.playback.reset();
        self.playback_state = PlaybackState::Idle;
        self.recording_state = RecordingState::Idle;
        self.generation_state = GenerationState::Idle;
        self.tts_streaming = false;
        self.clear_live_transcript();
        self.last_error = None;
        self.tts_latency_ms = None;
        info!("Session reset");
    }

    fn clear_live_transcript(&mut self) {
        self.partial_text.clear();
        self.streaming_text.clear();
        self.recognition_results.clear();
        self.generation_results.clear();
    }

    // ------------------------------------------------------------------
    // Historical view
    // ------------------------------------------------------------------

    /// Switch to a past conversation: clears live transient state and marks loading
    pub fn begin_conversation_load(&mut self, id: ConversationId) {
        info!("Loading conversation {}", id);
        self.clear_live_transcript();
        self.generation_state = GenerationState::Idle;
        self.selected_conversation = Some(id);
        self.historical = None;
        self.loading_conversation = true;
        self.conversation_error = None;
    }

    /// Install the fetched snapshot, unless the selection changed meanwhile
    pub fn finish_conversation_load(&mut self, id: ConversationId, result: Result<Conversation>) {
        if self.selected_conversation != Some(id) {
            debug!("Discarding load of deselected conversation {}", id);
            return;
        }

        self.loading_conversation = false;
        match result {
            Ok(conversation) => {
                info!(
                    "Loaded conversation {} ({} messages)",
                    id,
                    conversation.messages.len()
                );
                self.historical = Some(conversation);
            }
            Err(e) => {
                warn!("Failed to load conversation {}: {:#}", id, e);
                self.conversation_error = Some(format!("{:#}", e));
            }
        }
    }

    /// Tokens without an llm.start since the live view was left
    fn generation_abandoned(&self) -> bool {
        self.selected_conversation.is_some() && self.generation_state.is_idle()
    }

    pub async fn select_conversation(&mut self, source: &dyn ConversationSource, id: ConversationId) {
        self.begin_conversation_load(id);
        let result = source.fetch(id).await;
        self.finish_conversation_load(id, result);
    }

    /// Return to the live view
    pub fn clear_selection(&mut self) {
        self.selected_conversation = None;
        self.historical = None;
        self.loading_conversation = false;
        self.conversation_error = None;
    }

    /// Delete a conversation; the selection is cleared if it pointed at it
    pub async fn delete_conversation(
        &mut self,
        source: &dyn ConversationSource,
        id: ConversationId,
    ) -> bool {
        match source.delete(id).await {
            Ok(()) => {
                info!("Deleted conversation {}", id);
                if self.selected_conversation == Some(id) {
                    self.clear_selection();
                }
                true
            }
            Err(e) => {
                warn!("Failed to delete conversation {}: {:#}", id, e);
                self.conversation_error = Some(format!("{:#}", e));
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Chat entries to display: the selected conversation, or the live
    /// results merged by time
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        if let Some(conversation) = &self.historical {
            return conversation
                .messages
                .iter()
                .map(|msg| {
                    let latency = match msg.role {
                        Role::User => msg.stt_latency_ms,
                        Role::Assistant => msg.llm_latency_ms,
                    };
                    TimelineEntry {
                        role: msg.role,
                        text: msg.content.clone(),
                        latency_ms: latency.unwrap_or(0) as f64,
                        ttft_ms: None,
                        timestamp: msg.created_at,
                    }
                })
                .collect();
        }

        let mut entries: Vec<TimelineEntry> = self
            .recognition_results
            .iter()
            .map(|r| TimelineEntry {
                role: Role::User,
                text: r.text.clone(),
                latency_ms: r.latency_ms,
                ttft_ms: None,
                timestamp: r.timestamp,
            })
            .chain(self.generation_results.iter().map(|r| TimelineEntry {
                role: Role::Assistant,
                text: r.text.clone(),
                latency_ms: r.latency_ms,
                ttft_ms: Some(r.ttft_ms),
                timestamp: r.timestamp,
            }))
            .collect();

        entries.sort_by_key(|entry| entry.timestamp);
        entries
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            connection: self.connection_state,
            recording: self.recording_state,
            generation: self.generation_state,
            playback: self.playback_state,
            listening: self.listening,
            detector_loading: self.detector_loading,
            detector_error: self.detector_error,
            partial_text: self.partial_text.clone(),
            streaming_text: self.streaming_text.clone(),
            recognition_count: self.recognition_results.len(),
            generation_count: self.generation_results.len(),
            last_error: self.last_error.clone(),
            tts_latency_ms: self.tts_latency_ms,
            queued_segments: self.playback.len(),
            turns_completed: self.turns_completed,
            selected_conversation: self.selected_conversation,
            loading_conversation: self.loading_conversation,
            conversation_error: self.conversation_error.clone(),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recording_state
    }

    pub fn generation_state(&self) -> GenerationState {
        self.generation_state
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback_state
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn is_detector_loading(&self) -> bool {
        self.detector_loading
    }

    pub fn has_detector_error(&self) -> bool {
        self.detector_error
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn partial_text(&self) -> &str {
        &self.partial_text
    }

    pub fn streaming_text(&self) -> &str {
        &self.streaming_text
    }

    pub fn recognition_results(&self) -> &[RecognitionResult] {
        &self.recognition_results
    }

    pub fn generation_results(&self) -> &[GenerationResult] {
        &self.generation_results
    }

    pub fn last_error(&self) -> Option<&ServerError> {
        self.last_error.as_ref()
    }

    pub fn tts_latency_ms(&self) -> Option<f64> {
        self.tts_latency_ms
    }

    pub fn turns_completed(&self) -> usize {
        self.turns_completed
    }

    pub fn playback(&self) -> &PlaybackQueue {
        &self.playback
    }

    pub fn selected_conversation(&self) -> Option<ConversationId> {
        self.selected_conversation
    }

    pub fn historical_conversation(&self) -> Option<&Conversation> {
        self.historical.as_ref()
    }

    pub fn is_loading_conversation(&self) -> bool {
        self.loading_conversation
    }

    pub fn conversation_error(&self) -> Option<&str> {
        self.conversation_error.as_deref()
    }
}
