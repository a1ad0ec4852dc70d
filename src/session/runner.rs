use tokio::sync::mpsc;
use tracing::debug;

use super::session::Session;
use crate::audio::CompletionReceiver;
use crate::transport::TransportEvent;

/// Speech detector callbacks delivered to the session
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    SpeechStarted,
    /// End of utterance with the captured mono samples at the capture rate
    SpeechEnded(Vec<f32>),
    /// Speech detection fired on noise
    Misfire,
    /// Detector loading/error flags changed
    DetectorStatus { loading: bool, errored: bool },
}

/// Drives a `Session` from its three input queues.
///
/// Transport notifications, segment completions and capture callbacks are
/// each delivered in order and applied one at a time.
pub struct SessionRunner {
    session: Session,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    completion_rx: CompletionReceiver,
    capture_rx: mpsc::UnboundedReceiver<CaptureEvent>,
}

impl SessionRunner {
    pub fn new(
        session: Session,
        transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
        completion_rx: CompletionReceiver,
        capture_rx: mpsc::UnboundedReceiver<CaptureEvent>,
    ) -> Self {
        Self {
            session,
            transport_rx,
            completion_rx,
            capture_rx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Wait for and apply one input. Returns false once every queue is closed.
    pub async fn next(&mut self) -> bool {
        tokio::select! {
            Some(event) = self.transport_rx.recv() => {
                self.session.handle_transport_event(event);
            }
            Some(id) = self.completion_rx.recv() => {
                self.session.segment_finished(id);
            }
            Some(event) = self.capture_rx.recv() => {
                self.apply_capture(event);
            }
            else => {
                debug!("All session inputs closed");
                return false;
            }
        }
        true
    }

    /// Apply inputs until `done` holds for the session or the inputs close.
    /// Returns whether `done` was satisfied.
    pub async fn run_until<F>(&mut self, mut done: F) -> bool
    where
        F: FnMut(&Session) -> bool,
    {
        loop {
            if done(&self.session) {
                return true;
            }
            if !self.next().await {
                return done(&self.session);
            }
        }
    }

    fn apply_capture(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::SpeechStarted => self.session.speech_started(),
            CaptureEvent::SpeechEnded(samples) => {
                self.session.speech_ended(&samples);
            }
            CaptureEvent::Misfire => self.session.speech_misfire(),
            CaptureEvent::DetectorStatus { loading, errored } => {
                self.session.set_detector_status(loading, errored)
            }
        }
    }
}
