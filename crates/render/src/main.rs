mod output;
mod photos;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use teammap_core::engine::HeadlessFactory;
use teammap_core::models::RawRecord;
use teammap_core::session::DebugStatus;
use teammap_core::{EngineConfig, MapError, PeopleMap};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use photos::HttpPhotos;

/// Render a people map snapshot from a JSON file of location records.
#[derive(Debug, Parser)]
#[command(name = "teammap-render", version)]
struct Args {
    /// JSON array of `{user, location, border_color, location_type}` records.
    #[arg(long)]
    input: PathBuf,
    /// Output directory for map.svg, status.json and icons/.
    #[arg(long, default_value = "map-out")]
    out: PathBuf,
    /// Zoom to after the initial fit.
    #[arg(long)]
    zoom: Option<f64>,
    #[arg(long)]
    width: Option<f64>,
    #[arg(long)]
    height: Option<f64>,
    /// Photo service base URL. Falls back to TEAMMAP_PHOTO_BASE.
    #[arg(long)]
    photo_base: Option<String>,
    /// JSON engine config; TEAMMAP_* variables are applied on top.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Person id whose pin or cluster gets its overlay opened.
    #[arg(long)]
    open: Option<String>,
}

fn load_config(args: &Args) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_json(&json).map_err(anyhow::Error::msg)?
        }
        None => EngineConfig::default(),
    };
    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
}

async fn run(args: &Args, mut config: EngineConfig) -> anyhow::Result<DebugStatus> {
    if let Some(w) = args.width {
        config.viewport_width_px = w;
    }
    if let Some(h) = args.height {
        config.viewport_height_px = h;
    }

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading records {}", args.input.display()))?;
    let records: Vec<RawRecord> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", args.input.display()))?;

    let photo_base = args
        .photo_base
        .clone()
        .or_else(|| std::env::var("TEAMMAP_PHOTO_BASE").ok());
    if photo_base.is_none() {
        info!("No photo base configured, pins use the default avatar");
    }

    let mut map = PeopleMap::new(config, HeadlessFactory::default(), HttpPhotos::new(photo_base));

    // Records arrive before the engine is ready; they are drawn once it is
    match map.load(&records).await {
        Ok(outcome) => info!(?outcome, records = records.len(), "Records loaded"),
        Err(MapError::NoValidLocations) => {
            warn!(records = records.len(), "None of the records has a usable location")
        }
        Err(err) => return Err(err.into()),
    }
    let signal = map.start().await?;
    info!(?signal, "Map ready");

    if let Some(zoom) = args.zoom {
        map.set_zoom(zoom)?;
        map.settle().await?;
    }
    if let Some(person) = &args.open {
        match map.shape_for_point(person) {
            Some(shape) => {
                map.activate(&shape)?;
            }
            None => warn!(%person, "Not on the map, no overlay opened"),
        }
    }

    let status = output::write_snapshot(&args.out, &map)?;
    map.dispose();
    Ok(status)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let status = run(&args, config).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
