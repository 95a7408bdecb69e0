//! Insert-segment command implementation.

use super::open;
use segdb_core::{id_for, Segment, StoreStrategy, DAYS_TO_KEEP_SEGMENTS};
use std::path::Path;

/// Flags given to segments inserted from the command line.
const CLI_SEGMENT_FLAGS: i64 = 1;

/// Runs the insert-segment command.
pub fn run(
    path: Option<&Path>,
    strategy: StoreStrategy,
    device: u64,
    segment_id: u64,
    partner: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open(path, strategy)?;
    let segment = Segment::expiring_in(segment_id, partner, CLI_SEGMENT_FLAGS, DAYS_TO_KEEP_SEGMENTS);
    store.insert_segment_and_remove_expired(&id_for(device), &segment)?;
    println!("Successfully inserted");
    Ok(())
}
