use crate::config::Config;
use crate::core::{
    extract_video_id, HttpMetadataFetcher, MemorySurface, MetadataFetcher, PlayerAdapter,
    PlayerEvent, Services,
};
use crate::platform::{ScriptLoader, SimulatedPlatform};
use crate::utils::{describe_event, format_timestamp};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "yt-player-ng")]
#[command(about = "Event-driven YouTube embed player adapter")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a TOML config file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the video id of a URL
    Id {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Fetch and print video metadata
    Meta {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Play a video against the headless platform and print its events
    Simulate {
        #[arg(value_name = "URL")]
        url: String,

        /// Simulated video length in seconds
        #[arg(short, long, default_value = "5")]
        duration: f64,

        /// Pause after this many seconds, then resume
        #[arg(short, long)]
        pause_after: Option<f64>,

        /// Also fetch metadata over HTTP
        #[arg(short, long)]
        meta: bool,
    },
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        Ok(config)
    }

    pub async fn run(&self) -> Result<()> {
        let config = self.load_config()?;

        match &self.command {
            Command::Id { url } => {
                let id = PlayerAdapter::identifier_for(url)?;
                println!("{}", id);
            }
            Command::Meta { url } => {
                let id = extract_video_id(url)?;
                let fetcher = HttpMetadataFetcher::new(&config)?;
                let document = fetcher.fetch(&id).await?;
                println!("{}", serde_json::to_string_pretty(&document)?);
            }
            Command::Simulate {
                url,
                duration,
                pause_after,
                meta,
            } => {
                simulate(&config, url, *duration, *pause_after, *meta).await?;
            }
        }

        Ok(())
    }
}

async fn simulate(
    config: &Config,
    url: &str,
    duration: f64,
    pause_after: Option<f64>,
    meta: bool,
) -> Result<()> {
    let platform = Arc::new(
        SimulatedPlatform::new()
            .with_load_delay(Duration::from_millis(100))
            .with_duration(duration)
            .auto(),
    );
    let loader = ScriptLoader::shared(platform);
    let fetcher = Arc::new(HttpMetadataFetcher::new(config)?);
    let surface = Arc::new(MemorySurface::new());
    let services = Services::from_config(config, loader, fetcher);

    let adapter = PlayerAdapter::spawn(url, surface, config.player.clone(), services)?;
    let mut events = adapter.subscribe();
    info!("Simulating {} in mount {}", adapter.id(), adapter.mount_id());

    if meta {
        adapter.meta(None);
    }
    adapter.play();

    let mut paused_once = false;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Skipped {} events", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        println!("{}", describe_event(&event));

        match event {
            PlayerEvent::TimeUpdate(position) => {
                if let Some(limit) = pause_after {
                    if !paused_once && position >= limit {
                        paused_once = true;
                        adapter.pause();
                    }
                }
            }
            PlayerEvent::Pause => {
                tokio::time::sleep(Duration::from_secs(1)).await;
                adapter.play();
            }
            PlayerEvent::Ended | PlayerEvent::Error { .. } => break,
            _ => {}
        }
    }

    let snapshot = adapter.snapshot();
    println!(
        "Finished at {} of {}",
        format_timestamp(snapshot.current_time),
        format_timestamp(snapshot.duration)
    );
    adapter.remove();
    Ok(())
}
