use anyhow::Result;
use clap::Parser;
use duoscribe::{CaptureSession, Config};
use std::time::Duration;
use tracing::info;

/// Live dual-channel transcription with channel-based speaker attribution
#[derive(Parser, Debug)]
#[command(name = "duoscribe", version)]
struct Args {
    /// Seconds to record before stopping
    #[arg(long, default_value_t = 30)]
    duration: u64,

    /// Use synthetic capture sources instead of real devices
    #[arg(long)]
    simulated: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::from_env()?;

    let mut session_config = cfg.session_config();
    if args.simulated {
        session_config.simulated_capture = true;
    }

    info!("duoscribe v0.1.0");
    info!("transcription service: {}", session_config.service_url);

    let mut session = CaptureSession::new(session_config);
    session.on_transcript(|message| {
        println!("[{}] {}", message.speaker.as_str(), message.text);
    });
    session.on_error(|notice| {
        eprintln!("! {}", notice);
    });

    let mode = session.initialize().await?;
    info!("pipeline mode: {:?}", mode);

    session.start().await?;
    tokio::time::sleep(Duration::from_secs(args.duration)).await;

    let stats = session.stop().await?;
    info!(
        "encoded {} chunks, dispatched {}, emitted {} transcripts",
        stats.chunks_encoded, stats.dispatches, stats.transcripts_emitted
    );

    session.cleanup().await;

    Ok(())
}
