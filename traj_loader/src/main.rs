//! # Trajectory Loader
//!
//! Loads one CSV motion profile into a buffer slot of the shared trajectory
//! segment and publishes its fill count.
//!
//! ```text
//! traj_loader <FILE> <PROFILE> <BUFFER>
//! ```
//!
//! PROFILE 0 selects PVT rows, 1 position-only rows. BUFFER is the slot
//! index (0 = A, 1 = B, 2 = C with the default layout).

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{debug, error, info, Level};
use tracing_subscriber::EnvFilter;
use traj::prelude::{ConfigError, Packing};
use traj_loader::{
    open_source, BufferLoader, DecodePolicy, LoadError, LoadResult, LoadSummary, LoaderConfig,
};
use traj_shm::TrajectorySegment;

/// Trajectory Loader: CSV motion profile → shared-memory buffer slot
#[derive(Parser, Debug)]
#[command(name = "traj_loader")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Loads a CSV trajectory into a shared-memory buffer slot")]
struct Args {
    /// CSV trajectory file.
    file: PathBuf,

    /// Packing profile: 0 = PVT, 1 = position-only.
    profile: u8,

    /// Buffer slot index.
    buffer: usize,

    /// Loader configuration TOML (default: config/traj_loader.toml if present).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Segment file, overrides `segment.path`.
    #[arg(long, value_name = "PATH")]
    segment: Option<PathBuf>,

    /// Fail on non-numeric tokens, short rows and overflow.
    #[arg(long)]
    strict: bool,

    /// Treat the first line as data.
    #[arg(long)]
    no_header: bool,

    /// Load into a private anonymous mapping instead of the segment file.
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format and print the load summary as JSON.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = LoaderConfig::load_or_default(args.config.as_deref());
    let default_level = config
        .as_ref()
        .map(|c| c.shared.log_level.as_directive())
        .unwrap_or("info");
    setup_tracing(&args, default_level);

    info!("Trajectory Loader v{} starting...", env!("CARGO_PKG_VERSION"));
    match LoaderConfig::source(args.config.as_deref()) {
        Some(path) => info!("Config: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    let result = config
        .map_err(LoadError::from)
        .and_then(|config| run(&args, config));
    match result {
        Ok(summary) => {
            if args.json {
                match serde_json::to_string(&summary) {
                    Ok(json) => println!("{json}"),
                    Err(e) => error!("Could not encode summary: {e}"),
                }
            }
        }
        Err(e) => {
            error!("FATAL: {e}");
            process::exit(1);
        }
    }
}

fn run(args: &Args, mut config: LoaderConfig) -> LoadResult<LoadSummary> {
    apply_overrides(args, &mut config)?;
    let packing = Packing::from_u8(args.profile).ok_or(LoadError::InvalidProfile(args.profile))?;
    let layout = config.segment.layout();

    // Open the source first: a missing file must not disturb the slot.
    let file = open_source(&args.file)?;

    let mut segment = if args.dry_run {
        info!("Dry run: loading into an anonymous mapping");
        TrajectorySegment::anonymous(layout)?
    } else {
        TrajectorySegment::open_or_create(&config.segment.path, layout)?
    };
    info!(
        "Segment {} ready: {} axes, {} rows x {} buffers from offset {}",
        config.segment.path.display(),
        layout.num_axes,
        layout.capacity,
        layout.buffer_count,
        layout.base_offset
    );

    info!(
        "Loading {} into buffer {} ({packing} packing)",
        args.file.display(),
        args.buffer
    );
    let summary = BufferLoader::new(&mut segment, config.decode)
        .load_reader(file, packing, args.buffer)?;

    info!(
        "Load complete: buffer {}, {} rows written, {} dropped, {} short, {} anomalies",
        summary.buffer,
        summary.rows_written,
        summary.rows_dropped,
        summary.short_rows,
        summary.anomalies
    );
    Ok(summary)
}

/// Apply CLI flags on top of the file configuration.
fn apply_overrides(args: &Args, config: &mut LoaderConfig) -> Result<(), ConfigError> {
    if let Some(ref path) = args.segment {
        config.segment.path = path.clone();
    }
    if args.strict {
        config.decode.policy = DecodePolicy::Strict;
    }
    if args.no_header {
        config.decode.skip_header = false;
    }
    config.validate()
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args, default_level: &str) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
