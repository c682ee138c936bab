//! adrelay CLI - Headless Ad Playback Simulator
//!
//! Features:
//! - Simulate a full ad playback session over a scripted backend
//! - QC which tracking pixels a VAST-style pixel table would fire
//! - Source selection dry-runs against a target rendering width

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

use adrelay_core::{
    HttpPixelTransport, LifecycleEvent, LifecycleEventKind, MediaSource, MediaSourceSelector,
    MimePlayability, PixelRecord, PixelReporter, PixelTransport, Player, PlayerConfig,
};

mod sim;

/// adrelay CLI - ad playback and pixel QC toolkit
#[derive(Parser)]
#[command(name = "adrelay")]
#[command(author = "Beachmont Digital")]
#[command(version)]
#[command(about = "Simulate ad playback and QC tracking pixels", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated playback session and report fired pixels
    Simulate {
        /// Path to an ad descriptor (JSON with sources and pixels)
        descriptor: PathBuf,

        /// Target rendering width in pixels
        #[arg(long, default_value = "640")]
        target_width: u32,

        /// Actually dispatch pixels over HTTP instead of dry-running
        #[arg(long)]
        fire: bool,
    },

    /// Run only source selection and print the chosen source
    Pick {
        /// Path to an ad descriptor (JSON with sources)
        descriptor: PathBuf,

        /// Target rendering width in pixels
        #[arg(long)]
        target_width: u32,
    },
}

/// On-disk ad descriptor
#[derive(Deserialize)]
struct AdDescriptor {
    sources: Vec<MediaSource>,
    #[serde(default)]
    pixels: Vec<Option<PixelRecord>>,
    #[serde(default)]
    parameters: Option<String>,
    #[serde(default = "default_duration")]
    duration: f64,
}

fn default_duration() -> f64 {
    15.0
}

/// Dry-run transport: prints what would have been dispatched
struct PrintTransport {
    count: Mutex<usize>,
}

impl PixelTransport for PrintTransport {
    fn send(&self, url: &str) {
        *self.count.lock().unwrap() += 1;
        println!("PIXEL {}", url);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Simulate {
            descriptor,
            target_width,
            fire,
        } => simulate(&descriptor, target_width, fire).await,
        Commands::Pick {
            descriptor,
            target_width,
        } => pick(&descriptor, target_width),
    }
}

fn read_descriptor(path: &PathBuf) -> anyhow::Result<AdDescriptor> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading descriptor {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing descriptor {}", path.display()))
}

async fn simulate(path: &PathBuf, target_width: u32, fire: bool) -> anyhow::Result<()> {
    let descriptor = read_descriptor(path)?;
    let height = target_width * 9 / 16;

    let container = sim::SimContainer::new(target_width, height, descriptor.duration);
    let player = Arc::new(Player::new(container, PlayerConfig::default()));

    // Narrate the lifecycle as it unfolds
    player.events().on_any(|event: &LifecycleEvent| {
        println!("EVENT {}", event.kind());
    });

    let transport: Arc<dyn PixelTransport> = if fire {
        Arc::new(HttpPixelTransport::default())
    } else {
        Arc::new(PrintTransport {
            count: Mutex::new(0),
        })
    };
    let reporter = PixelReporter::new(descriptor.pixels).with_transport(transport);
    reporter.track(&player);

    let stopped = player.events().wait_for(LifecycleEventKind::AdStopped);

    player
        .load(&descriptor.sources, descriptor.parameters.clone(), None)
        .await
        .context("ad load failed")?;
    println!(
        "LOADED session={} duration={}s",
        player.session_id(),
        player.ad_duration().unwrap_or(descriptor.duration)
    );

    player.start_ad().await.context("ad start failed")?;
    stopped.await.ok();

    println!("DONE");
    Ok(())
}

fn pick(path: &PathBuf, target_width: u32) -> anyhow::Result<()> {
    let descriptor = read_descriptor(path)?;
    let selector = MediaSourceSelector::new(Arc::new(MimePlayability));

    match selector.select(&descriptor.sources, target_width) {
        Some(source) => {
            println!("{}", serde_json::to_string_pretty(source)?);
            Ok(())
        }
        None => bail!("no playable source for width {}", target_width),
    }
}
