//! mosaic-tx: entry point.
//!
//! ```text
//! mosaic-tx a.jpg b.png              Send each file once
//! mosaic-tx cam.jpg --every 2        Resend every 2 seconds until Ctrl-C
//! mosaic-tx cam.jpg --every 5 --active-secs 600 --sleep-secs 1800
//!                                    Send for 10 minutes, pause 30, repeat
//! mosaic-tx --config <path> ...      Load a custom config TOML
//! mosaic-tx --gen-config             Write default config to stdout
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mosaic_core::{FileSource, ImageSource, MosaicError, Transmitter};
use mosaic_tx::config::TxConfig;
use mosaic_tx::prepare::{Quality, prepare};
use mosaic_tx::schedule::Phase;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "mosaic-tx", about = "Grid-framed image transmitter")]
struct Cli {
    /// Encoded image files to send.
    files: Vec<PathBuf>,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "mosaic-tx.toml")]
    config: PathBuf,

    /// Receiver host.
    #[arg(long)]
    host: Option<String>,

    /// Receiver port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Identity sent in the handshake.
    #[arg(short, long)]
    identity: Option<String>,

    /// Bytes per frame, header included.
    #[arg(long)]
    frame_size: Option<usize>,

    /// Grid width used to label frames.
    #[arg(long)]
    columns: Option<u16>,

    /// Re-encode as JPEG at this quality before sending.
    #[arg(short, long)]
    quality: Option<u8>,

    /// Pick a random JPEG quality per image (implies re-encoding).
    #[arg(long)]
    random_quality: bool,

    /// Keep resending the files, pausing this many seconds between rounds.
    #[arg(long)]
    every: Option<u64>,

    /// With --every: send for this many seconds, then sleep.
    #[arg(long)]
    active_secs: Option<u64>,

    /// With --every: seconds to stay silent between sending windows.
    #[arg(long)]
    sleep_secs: Option<u64>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&TxConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = TxConfig::load(&cli.config);
    if let Some(host) = cli.host {
        config.network.host = host;
    }
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(identity) = cli.identity {
        config.transfer.identity = identity;
    }
    if let Some(frame_size) = cli.frame_size {
        config.transfer.frame_size = frame_size;
    }
    if let Some(columns) = cli.columns {
        config.transfer.columns = columns;
    }
    if let Some(quality) = cli.quality {
        config.transfer.reencode_jpeg = true;
        config.transfer.jpeg_quality = quality;
    }
    if cli.random_quality {
        config.transfer.reencode_jpeg = true;
        config.transfer.random_quality = true;
    }
    if let Some(every) = cli.every {
        config.schedule.every_secs = every;
    }
    if let Some(active) = cli.active_secs {
        config.schedule.active_secs = active;
    }
    if let Some(sleep) = cli.sleep_secs {
        config.schedule.sleep_secs = sleep;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if cli.files.is_empty() {
        return Err("no image files given".into());
    }

    let transmitter = Transmitter::new(config.to_transmit_config())?;
    let quality = config.quality();
    info!(
        "mosaic-tx v{} -> {} as {}",
        env!("CARGO_PKG_VERSION"),
        config.network.host,
        config.transfer.identity
    );

    let Some(cycle) = config.duty_cycle() else {
        let failed = send_round(&transmitter, &cli.files, quality).await;
        if failed > 0 {
            return Err(format!("{failed} of {} images failed", cli.files.len()).into());
        }
        return Ok(());
    };

    let started = Instant::now();
    let mut sleeping = false;
    loop {
        let phase = cycle.phase_at(started.elapsed());
        match phase {
            Phase::Active { .. } => {
                if sleeping {
                    info!("sleep phase over; sending again");
                    sleeping = false;
                }
                send_round(&transmitter, &cli.files, quality).await;
            }
            Phase::Sleeping { remaining } => {
                if !sleeping {
                    info!(remaining_secs = remaining.as_secs(), "active phase over; sleeping");
                    sleeping = true;
                }
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(cycle.pause_after(phase)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, stopping");
                return Ok(());
            }
        }
    }
}

/// Send every file once; returns how many failed.
async fn send_round(transmitter: &Transmitter, files: &[PathBuf], quality: Quality) -> usize {
    let mut failed = 0;
    for path in files {
        if let Err(e) = send_file(transmitter, path, quality.pick()).await {
            error!(path = %path.display(), "send failed: {e}");
            failed += 1;
        }
    }
    failed
}

async fn send_file(
    transmitter: &Transmitter,
    path: &Path,
    quality: Option<u8>,
) -> Result<(), MosaicError> {
    let captured = FileSource::new(path).capture().await?;
    let image = prepare(captured, quality).await?;
    if let Some(q) = quality {
        info!(filename = %image.filename, quality = q, "captured");
    }
    transmitter.send(&image.filename, image.bytes).await?;
    Ok(())
}
