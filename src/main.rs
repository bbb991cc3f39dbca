use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

use voicelink::{
    CapabilityReport, CaptureBackendFactory, CaptureConfig, CaptureSource, Config, ConsoleUi,
    NatsTransport, StreamController,
};

#[derive(Debug, Parser)]
#[command(name = "voicelink", about = "Live microphone capture & streaming client")]
struct Cli {
    /// Config file path (defaults apply when omitted)
    #[arg(long)]
    config: Option<String>,

    /// Override the NATS server URL
    #[arg(long)]
    url: Option<String>,

    /// Override the session identifier
    #[arg(long)]
    session_id: Option<String>,

    /// Use a synthesized tone instead of the microphone
    #[arg(long)]
    tone: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(url) = cli.url {
        cfg.transport.url = url;
    }
    if let Some(session_id) = cli.session_id {
        cfg.transport.session_id = Some(session_id);
    }

    let session_id = cfg
        .transport
        .session_id
        .clone()
        .unwrap_or_else(|| format!("session-{}", uuid::Uuid::new_v4()));

    info!("voicelink v{}", env!("CARGO_PKG_VERSION"));
    info!("Session: {}", session_id);
    info!("Transport: {}", cfg.transport.url);

    let capture_config = CaptureConfig {
        sample_rate: cfg.audio.sample_rate,
        channels: cfg.audio.channels,
        block_size: cfg.audio.block_size,
    };

    let (source, capability) = if cli.tone {
        (
            CaptureSource::Tone,
            CapabilityReport::assume_available(false),
        )
    } else {
        (
            CaptureSource::Microphone,
            CapabilityReport::probe(&cfg.transport.url),
        )
    };

    let backend = CaptureBackendFactory::create(source, capture_config);

    let (transport, server_rx) = NatsTransport::connect(&cfg.transport.url, &session_id).await?;

    let (controller, handle) = StreamController::new(
        session_id,
        capability,
        backend,
        Arc::new(transport),
        server_rx,
        ConsoleUi,
    );

    let controller_task = tokio::spawn(controller.run());

    println!("Commands: start | stop | quit");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };

        match line.as_deref().map(str::trim) {
            Some("start") => handle.start().await?,
            Some("stop") => handle.stop().await?,
            Some("quit") | Some("exit") | None => {
                handle.shutdown().await.ok();
                break;
            }
            Some("") => {}
            Some(other) => warn!("Unknown command: {}", other),
        }
    }

    let stats = controller_task.await??;
    info!(
        "Session ended: {:.1}s, {} blocks streamed, {} results received",
        stats.duration_secs, stats.blocks_streamed, stats.results_received
    );

    Ok(())
}
