//! Generate command implementation.

use super::open;
use segdb_core::metrics::format_thousands;
use segdb_core::{BulkPopulator, PopulatorConfig, StoreStrategy};
use std::path::Path;

/// Arguments of the generate command.
#[derive(Debug, Clone)]
pub struct GenerateArgs {
    /// Devices to generate.
    pub num_devices: u64,
    /// Size of the segment id space.
    pub num_segments: u64,
    /// Mean segments per device.
    pub avg_segments_per_device: u64,
    /// Worker threads; one per core when unset.
    pub num_threads: Option<usize>,
    /// Base seed.
    pub seed: Option<u64>,
}

impl GenerateArgs {
    /// Builds the populator configuration.
    pub fn to_config(&self) -> PopulatorConfig {
        let mut config = PopulatorConfig::new(self.num_devices, self.num_segments)
            .avg_segments_per_device(self.avg_segments_per_device);
        if let Some(threads) = self.num_threads {
            config = config.num_threads(threads);
        }
        if let Some(seed) = self.seed {
            config = config.seed(seed);
        }
        config
    }
}

/// Runs the generate command.
pub fn run(
    path: Option<&Path>,
    strategy: StoreStrategy,
    args: &GenerateArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.to_config();
    config.validate()?;

    let store = open(path, strategy)?;
    let report = BulkPopulator::new(store, config)?.run()?;

    println!();
    println!(
        "Inserted {} devices ({} failed) with {} segments in {:.2?}",
        format_thousands(report.devices_inserted),
        format_thousands(report.device_inserts_failed),
        format_thousands(report.segments_created),
        report.elapsed
    );
    if !report.completed {
        println!("Wait limit reached before all workers finished");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_arguments_override_defaults() {
        let args = GenerateArgs {
            num_devices: 10,
            num_segments: 20,
            avg_segments_per_device: 3,
            num_threads: Some(2),
            seed: Some(9),
        };
        let config = args.to_config();
        assert_eq!(config.num_threads, 2);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.avg_segments_per_device, 3);
    }

    #[test]
    fn invalid_arguments_fail_before_opening() {
        let dir = tempfile::tempdir().unwrap();
        let args = GenerateArgs {
            num_devices: 10,
            num_segments: 0,
            avg_segments_per_device: 3,
            num_threads: None,
            seed: None,
        };
        assert!(run(Some(dir.path()), StoreStrategy::Native, &args).is_err());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
