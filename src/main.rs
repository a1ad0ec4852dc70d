use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use voicechat::audio::{completion_channel, AudioSink, CompletionSender};
use voicechat::{
    AudioFile, CaptureEvent, Config, ConnectionState, Session, SessionConfig, SessionRunner,
    WavSink, WsConnector,
};

/// Headless voice chat client
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/voicechat")]
    config: String,

    /// Socket URL, overrides the configured server
    #[arg(long)]
    url: Option<String>,

    /// WAV file to send as one utterance
    #[arg(long)]
    utterance: Option<PathBuf>,

    /// Write synthesized speech to this WAV file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Report playback completion in real time instead of immediately
    #[arg(long)]
    pace: bool,

    /// Exit after this many spoken responses
    #[arg(long, default_value_t = 1)]
    turns: usize,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn build_sink(args: &Args, completions: CompletionSender) -> Result<Box<dyn AudioSink>> {
    if let Some(path) = &args.output {
        info!("Writing speech to {}", path.display());
        return Ok(Box::new(WavSink::new(path, completions, args.pace)));
    }

    #[cfg(feature = "speaker")]
    {
        let sink = voicechat::audio::SpeakerSink::new(completions)?;
        Ok(Box::new(sink))
    }

    #[cfg(not(feature = "speaker"))]
    {
        info!("No --output given, discarding speech");
        Ok(Box::new(voicechat::audio::NullSink::new(completions)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        cfg.log_level()
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let url = args.url.clone().unwrap_or_else(|| cfg.ws_url());
    info!("Voice chat client v{}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}", url);

    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let (completion_tx, completion_rx) = completion_channel();
    let (capture_tx, capture_rx) = mpsc::unbounded_channel();

    let sink = build_sink(&args, completion_tx)?;
    let connector = WsConnector::new(url.clone(), transport_tx);
    let session = Session::new(SessionConfig::from(&cfg), Box::new(connector), sink);
    let mut runner = SessionRunner::new(session, transport_rx, completion_rx, capture_rx);

    runner.session_mut().connect();
    runner
        .run_until(|s| s.connection_state() != ConnectionState::Connecting)
        .await;

    if runner.session().connection_state() != ConnectionState::Connected {
        bail!("Failed to connect to {}", url);
    }
    info!("Connected");

    if let Some(path) = &args.utterance {
        let audio = AudioFile::open(path)?;
        info!(
            "Utterance {}: {:.1}s, {}Hz, {} channel(s)",
            path.display(),
            audio.duration_seconds,
            audio.sample_rate,
            audio.channels
        );
        let samples = audio.to_mono(cfg.audio.capture_sample_rate)?;

        runner.session_mut().start_listening();
        capture_tx.send(CaptureEvent::SpeechStarted)?;
        capture_tx.send(CaptureEvent::SpeechEnded(samples))?;
    } else {
        info!("No utterance given, waiting for server events");
    }

    let turns = args.turns;
    tokio::select! {
        finished = runner.run_until(|s| {
            s.turns_completed() >= turns
                || s.last_error().is_some()
                || s.connection_state() == ConnectionState::Disconnected
        }) => {
            if !finished {
                warn!("Session inputs closed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
    }

    let session = runner.session_mut();
    for entry in session.timeline() {
        match entry.ttft_ms {
            Some(ttft) => info!(
                "[{:?}] {} ({:.0}ms, ttft {:.0}ms)",
                entry.role, entry.text, entry.latency_ms, ttft
            ),
            None => info!("[{:?}] {} ({:.0}ms)", entry.role, entry.text, entry.latency_ms),
        }
    }
    if let Some(latency) = session.tts_latency_ms() {
        info!("Speech latency: {:.0}ms", latency);
    }
    if let Some(err) = session.last_error() {
        error!("Server error: {}", err);
    }

    session.disconnect();
    Ok(())
}
