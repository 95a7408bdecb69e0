//! Show-segment-stats command implementation.

use super::{open, OutputFormat};
use segdb_core::{id_for, StoreStrategy};
use serde::Serialize;
use std::path::Path;

/// Segment counts of one device.
#[derive(Debug, Serialize)]
pub struct SegmentStats {
    /// Device key.
    pub device: String,
    /// Entries that have not expired.
    pub active: usize,
    /// Entries past their expiry.
    pub expired: usize,
}

/// Runs the show-segment-stats command.
pub fn run(
    path: Option<&Path>,
    strategy: StoreStrategy,
    device: u64,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open(path, strategy)?;
    let key = id_for(device);
    let counts = store.get_count_of_active_and_expired_segments(&key)?;
    let stats = SegmentStats {
        device: key,
        active: counts.active,
        expired: counts.expired,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => println!(
            "Device id {} has {} active segments and {} expired segments",
            stats.device, stats.active, stats.expired
        ),
    }
    Ok(())
}
