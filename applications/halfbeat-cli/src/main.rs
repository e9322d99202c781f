/// Halfbeat - diagnostic command line for the playback engine
mod settings;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use halfbeat_client::HalfbeatClient;
use halfbeat_core::Track;
use halfbeat_playback::{validate_skip_bounds, Interval, SourceResolver};
use settings::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "halfbeat")]
#[command(about = "Halfbeat playback engine diagnostics", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "HALFBEAT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the URL a track would be played from
    Resolve {
        /// External source reference
        #[arg(short, long = "ref")]
        external_ref: Option<String>,
        /// Page within the source
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        /// Track id (defaults to the reference)
        #[arg(short, long)]
        track_id: Option<String>,
        /// Cached stream URL to try before refreshing
        #[arg(long)]
        stream_url: Option<String>,
        /// Expiry of the cached stream URL (RFC 3339)
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
        /// Bypass the local cache
        #[arg(long)]
        skip_local: bool,
    },
    /// Compute the playback window for skip bounds
    Interval {
        /// Skip start in seconds
        #[arg(short, long, default_value_t = 0.0)]
        start: f64,
        /// Skip end in seconds (0 = end of media)
        #[arg(short, long, default_value_t = 0.0)]
        end: f64,
        /// Media duration in seconds
        #[arg(short, long)]
        duration: f64,
        /// Position to clamp into the window
        #[arg(short, long)]
        position: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "halfbeat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            external_ref,
            page,
            track_id,
            stream_url,
            expires_at,
            skip_local,
        } => {
            let config = AppConfig::load(cli.config.as_deref())?;
            config.validate()?;

            let id = track_id
                .or_else(|| external_ref.clone())
                .ok_or_else(|| anyhow::anyhow!("either --ref or --track-id is required"))?;
            let mut track = Track::new(id.as_str(), id.as_str());
            track.page = page;
            track.skip_local = skip_local;
            track.external_ref = external_ref;
            if let Some(url) = stream_url {
                track = track.with_stream_url(url, expires_at);
            }

            resolve(&config, &track).await?;
        }
        Commands::Interval {
            start,
            end,
            duration,
            position,
        } => {
            interval(start, end, duration, position)?;
        }
    }

    Ok(())
}

async fn resolve(config: &AppConfig, track: &Track) -> anyhow::Result<()> {
    let client = Arc::new(HalfbeatClient::new(config.client.clone())?);
    let resolver = SourceResolver::new(
        client.clone(),
        client.clone(),
        client,
        &config.playback,
    )?;

    tracing::info!(track_id = %track.id, "Resolving source");
    let resolved = resolver.resolve(track).await?;

    println!("kind:       {:?}", resolved.kind);
    println!("url:        {}", resolved.url);
    match resolved.expires_at {
        Some(expires_at) => println!("expires at: {}", expires_at.to_rfc3339()),
        None => println!("expires at: unknown"),
    }
    println!("refreshed:  {}", resolved.refreshed);

    Ok(())
}

fn interval(start: f64, end: f64, duration: f64, position: Option<f64>) -> anyhow::Result<()> {
    if let Err(e) = validate_skip_bounds(start, end) {
        tracing::warn!(error = %e, "Skip bounds will be re-clamped");
    }

    let window = Interval::clamp(start, end, duration);
    println!("{}", serde_json::to_string_pretty(&window)?);

    if window.is_provisional() {
        println!("duration unusable, window is provisional");
    }

    if let Some(position) = position {
        let clamped = window.clamp_position(position);
        println!("position:    {position} -> {clamped}");
        println!(
            "in interval: {:.3} / {:.3}",
            window.progress_in_interval(clamped),
            window.length()
        );
    }

    Ok(())
}
