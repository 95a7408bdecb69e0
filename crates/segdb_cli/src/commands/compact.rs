//! Compact command implementation.

use super::open_engine;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.join(segdb_core::engine::LOG_FILE_NAME).exists() {
        return Err(format!("No database found at {}", path.display()).into());
    }

    println!("Compacting {}", path.display());
    let engine = open_engine(Some(path))?;
    let report = engine.compact()?;
    let saved = report.bytes_before.saturating_sub(report.bytes_after);

    println!("  Records:     {}", report.records);
    println!("  Size before: {} bytes", report.bytes_before);
    println!("  Size after:  {} bytes", report.bytes_after);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        saved,
        if report.bytes_before > 0 {
            saved as f64 / report.bytes_before as f64 * 100.0
        } else {
            0.0
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_database_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(dir.path()).is_err());
    }
}
