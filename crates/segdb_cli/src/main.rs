//! SegDB CLI
//!
//! Command-line access to a segment store.
//!
//! # Commands
//!
//! - `get-id` - Show the database key of a numeric device id
//! - `generate` - Populate the store with synthetic devices
//! - `insert-segment` - Insert one segment and prune expired ones
//! - `get-segments` - List the active segments of a device
//! - `show-segment-stats` - Count active and expired segments of a device
//! - `compact` - Rewrite the record log
//!
//! Without `--path` the store lives in memory for the duration of the
//! command, which is mostly useful for `generate` benchmarks.

mod commands;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use segdb_core::{StoreStrategy, MAX_SEGMENT_ID};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SegDB command-line tools.
#[derive(Parser)]
#[command(name = "segdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Store strategy: 'native' or 'mapper'
    #[arg(global = true, short, long, default_value = "native")]
    algorithm: StoreStrategy,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the database key a numeric device id maps to
    #[command(alias = "getId")]
    GetId {
        /// Numeric device id
        #[arg(short, long)]
        device: u64,
    },

    /// Generate synthetic devices and segments
    Generate {
        /// Number of devices to generate
        #[arg(long = "num-devices", visible_alias = "numDevices")]
        num_devices: u64,

        /// Size of the segment id space
        #[arg(
            long = "num-segments",
            visible_alias = "numSegments",
            value_parser = clap::value_parser!(u64).range(1..=MAX_SEGMENT_ID + 1)
        )]
        num_segments: u64,

        /// Mean number of segments per device
        #[arg(
            long = "avg-segments-per-device",
            visible_alias = "avgSegmentsPerDevice",
            default_value_t = segdb_core::PopulatorConfig::DEFAULT_AVG_SEGMENTS_PER_DEVICE
        )]
        avg_segments_per_device: u64,

        /// Worker threads (defaults to one per core)
        #[arg(long = "num-threads", visible_alias = "numThreads")]
        num_threads: Option<usize>,

        /// Seed for reproducible data
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Insert a segment for a device and remove its expired segments
    #[command(alias = "insertSegment")]
    InsertSegment {
        /// Numeric device id
        #[arg(short, long)]
        device: u64,

        /// Segment id
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(..=MAX_SEGMENT_ID))]
        segment: u64,

        /// Partner id, e.g. 'www.abcdef.com'
        #[arg(long)]
        partner: String,
    },

    /// List the active segments of a device
    #[command(alias = "getSegments")]
    GetSegments {
        /// Numeric device id
        #[arg(short, long)]
        device: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Count the active and expired segments of a device
    #[command(alias = "showSegmentStats")]
    ShowSegmentStats {
        /// Numeric device id
        #[arg(short, long)]
        device: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Rewrite the record log, keeping only live records
    Compact,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path = cli.path.as_deref();
    match cli.command {
        Commands::GetId { device } => {
            println!("{}", commands::get_id::run(device));
        }
        Commands::Generate {
            num_devices,
            num_segments,
            avg_segments_per_device,
            num_threads,
            seed,
        } => {
            let args = commands::generate::GenerateArgs {
                num_devices,
                num_segments,
                avg_segments_per_device,
                num_threads,
                seed,
            };
            commands::generate::run(path, cli.algorithm, &args)?;
        }
        Commands::InsertSegment {
            device,
            segment,
            partner,
        } => {
            commands::insert_segment::run(path, cli.algorithm, device, segment, &partner)?;
        }
        Commands::GetSegments { device, format } => {
            commands::get_segments::run(path, cli.algorithm, device, format)?;
        }
        Commands::ShowSegmentStats { device, format } => {
            commands::segment_stats::run(path, cli.algorithm, device, format)?;
        }
        Commands::Compact => {
            let path = path.ok_or("Database path required for compact")?;
            commands::compact::run(path)?;
        }
    }

    Ok(())
}
