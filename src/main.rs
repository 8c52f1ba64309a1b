//! Fog Explorer - Entry Point
//!
//! Replays a recorded track (or a simulated walk) through the location
//! stream into an exploration session, then prints progress and a summary of
//! the fog overlay around the last position.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use fog_explorer::core::config::ExplorationConfig;
use fog_explorer::core::error::Result;
use fog_explorer::core::types::{Coordinate, LocationFix};
use fog_explorer::location::provider::ScriptedProvider;
use fog_explorer::location::simulate::RandomWalk;
use fog_explorer::location::stream::LocationStream;
use fog_explorer::metrics::coverage;
use fog_explorer::{ExplorationSession, ExplorationState};

/// Fog-of-war exploration engine
#[derive(Parser, Debug)]
#[command(name = "fog-explorer")]
#[command(about = "Feed GPS fixes through the exploration engine and report progress")]
struct Args {
    /// TOML config file (missing sections use defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Viewport span for the overlay summary, degrees
    #[arg(long, global = true, default_value_t = 0.05)]
    span: f64,

    /// Write the exploration state here when done
    #[arg(long, global = true)]
    state_out: Option<PathBuf>,

    /// Start from a previously saved exploration state
    #[arg(long, global = true)]
    restore: Option<PathBuf>,

    /// Delay between fixes, milliseconds
    #[arg(long, global = true, default_value_t = 0)]
    interval_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON array of fixes
    Replay {
        #[arg(long)]
        track: PathBuf,
    },
    /// Generate a seeded random walk
    Simulate {
        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 500)]
        steps: usize,

        /// Meters between fixes
        #[arg(long, default_value_t = 50.0)]
        step_m: f64,

        #[arg(long, default_value_t = 34.0522, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, default_value_t = -118.2437, allow_hyphen_values = true)]
        lon: f64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fog_explorer=info")))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ExplorationConfig::load(path)?,
        None => ExplorationConfig::default(),
    };

    let fixes = match &args.command {
        Command::Replay { track } => load_track(track)?,
        Command::Simulate {
            seed,
            steps,
            step_m,
            lat,
            lon,
        } => RandomWalk::new(*seed, Coordinate::try_new(*lat, *lon)?, *steps, *step_m).generate(),
    };
    tracing::info!("Fog Explorer starting with {} fixes", fixes.len());

    let mut session = ExplorationSession::new(config.clone())?;
    if let Some(path) = &args.restore {
        session.restore_state(ExplorationState::load(path)?)?;
    }

    let total = fixes.len() as u64;
    let provider = ScriptedProvider::evenly_spaced(fixes, Duration::from_millis(args.interval_ms));
    let mut stream = LocationStream::new(provider, config.location.clone());

    let rt = Runtime::new()?;
    let applied = rt.block_on(async {
        stream.start();
        let applied = session
            .run_until(&mut stream, |status| status.accepted + status.rejected >= total)
            .await;
        let status = stream.status();
        stream.stop().await;
        println!(
            "Fixes: {} accepted, {} rejected, stream {:?}",
            status.accepted, status.rejected, status.state
        );
        applied
    });

    let center = session
        .metrics()
        .previous_position()
        .map(|p| p.coordinate)
        .unwrap_or(session.viewport().center);
    session.set_viewport(center, args.span, args.span);

    display_summary(&session, applied);

    if let Some(path) = &args.state_out {
        session.serialize_state().save(path)?;
        println!("State written to {}", path.display());
    }
    Ok(())
}

fn load_track(path: &Path) -> Result<Vec<LocationFix>> {
    let content = fs::read_to_string(path)?;
    let fixes: Vec<LocationFix> = serde_json::from_str(&content)?;
    tracing::debug!("Loaded {} fixes from {}", fixes.len(), path.display());
    Ok(fixes)
}

fn display_summary(session: &ExplorationSession, applied: usize) {
    let snap = session.snapshot();
    let overlay = session.current_overlay();
    let viewport = session.viewport();

    println!();
    println!("=== EXPLORATION ===");
    println!("Positions applied:   {}", applied);
    println!("Distance:            {:.2} mi", snap.total_distance_miles);
    println!("Visited cells:       {}", snap.visited_cell_count);
    println!(
        "Level:               {} ({} cells to next)",
        snap.level, snap.cells_until_next_level
    );
    println!("Explored:            {:.8}% of Earth", snap.explored_percent);
    println!();
    println!("=== OVERLAY ===");
    println!(
        "Viewport:            ({:.5}, {:.5}) span {:.4}° x {:.4}°",
        viewport.center.lat, viewport.center.lon, viewport.lat_span, viewport.lon_span
    );
    println!("Visible:             {:.6}% of globe", coverage::viewport_visible_percent(viewport));
    println!("Detail:              {:?}", overlay.detail);
    println!("Holes:               {}", overlay.hole_count());
    println!("Fog fill:            {}", session.config().style.fill.to_hex());
    if let Some(err) = session.last_error() {
        println!();
        println!("Location error: {}", err);
    }
}
