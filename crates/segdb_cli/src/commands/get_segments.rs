//! Get-segments command implementation.

use super::{open, OutputFormat};
use segdb_core::{id_for, Segment, StoreStrategy};
use serde::Serialize;
use std::path::Path;

/// A segment as printed in JSON output.
#[derive(Debug, Serialize)]
pub struct SegmentView {
    /// Segment id.
    pub segment_id: u64,
    /// Expiry in epoch milliseconds, absent if it never expires.
    pub expiry: Option<i64>,
    /// Flags.
    pub flags: i64,
    /// Partner id.
    pub partner_id: String,
}

impl From<Segment> for SegmentView {
    fn from(segment: Segment) -> Self {
        Self {
            segment_id: segment.segment_id,
            expiry: segment.expiry,
            flags: segment.flags,
            partner_id: segment.partner_id,
        }
    }
}

/// Active segments of one device.
#[derive(Debug, Serialize)]
pub struct DeviceSegments {
    /// Device key.
    pub device: String,
    /// Active segments in ascending id order.
    pub segments: Vec<SegmentView>,
}

/// Runs the get-segments command.
pub fn run(
    path: Option<&Path>,
    strategy: StoreStrategy,
    device: u64,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open(path, strategy)?;
    let key = id_for(device);
    let segments = store.get_active_segments(&key)?;

    match format {
        OutputFormat::Json => {
            let result = DeviceSegments {
                device: key,
                segments: segments.into_iter().map(SegmentView::from).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            for (i, segment) in segments.iter().enumerate() {
                println!("{}: {}", i + 1, segment);
            }
        }
    }
    Ok(())
}
