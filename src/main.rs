use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use voxbridge::audio::{CaptureBackendFactory, CaptureSource, DevicePlaybackSink, WavFileSink};
use voxbridge::{AppState, Config, LiveSessionController, NatsChannel, PlaybackSink};

/// Live speech-translation bridge
#[derive(Debug, Parser)]
#[command(name = "voxbridge", about = "Live speech-translation bridge")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/voxbridge")]
    config: String,

    /// Capture from a WAV file instead of the microphone
    #[arg(long)]
    input_file: Option<String>,

    /// Write playback to a WAV file instead of the output device
    #[arg(long)]
    output_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);

    let defaults = cfg.session_defaults();

    let source = match &args.input_file {
        Some(path) => CaptureSource::File(path.clone()),
        None => CaptureSource::Microphone,
    };
    let capture = CaptureBackendFactory::create(source, defaults.capture_config())?;

    let sink: Arc<dyn PlaybackSink> = match &args.output_file {
        Some(path) => Arc::new(WavFileSink::new(
            path.into(),
            defaults.playback_sample_rate,
        )),
        None => Arc::new(DevicePlaybackSink::new(defaults.playback_sample_rate)),
    };

    let channel = NatsChannel::new(
        cfg.channel.nats_url.clone(),
        cfg.channel.subject_prefix.clone(),
    );

    let controller = Arc::new(LiveSessionController::new(
        defaults,
        capture,
        Box::new(channel),
        sink,
    ));

    let state = AppState::new(controller);
    let app = voxbridge::create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP control API listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
