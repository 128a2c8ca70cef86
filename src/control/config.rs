//! Protocol parameters loaded from `config.toml`.

use serde::Deserialize;
use std::path::Path;

use crate::simulation::TimingParameters;
use crate::simulation::types::{DEFAULT_BACKOFF_RANGE, DEFAULT_JAM_TICKS, DEFAULT_STATION_QUEUE_CAPACITY, DEFAULT_TRANSMIT_TICKS};

/// Tunables of the medium-access protocol. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Backoff range every transceiver starts with.
    pub initial_backoff_range: u32,
    /// Ticks a transceiver needs to send one message.
    pub transmit_ticks: u32,
    /// Length of the jam burst after a collision.
    pub jam_ticks: u32,
    /// Outbound queue depth of each station.
    pub station_queue_capacity: usize,
    /// Seed for backoff draws. Drawn from entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_backoff_range: DEFAULT_BACKOFF_RANGE,
            transmit_ticks: DEFAULT_TRANSMIT_TICKS,
            jam_ticks: DEFAULT_JAM_TICKS,
            station_queue_capacity: DEFAULT_STATION_QUEUE_CAPACITY,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Returns
    /// * `Ok(SimulationConfig)` if the file was read, parsed and validated
    /// * `Err(String)` with a descriptive error message otherwise
    pub fn load(config_path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(config_path).map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content).map_err(|e| format!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.initial_backoff_range == 0 {
            return Err("initial-backoff-range must be at least 1".to_string());
        }
        if self.transmit_ticks == 0 {
            return Err("transmit-ticks must be at least 1".to_string());
        }
        if self.jam_ticks == 0 {
            return Err("jam-ticks must be at least 1".to_string());
        }
        if self.station_queue_capacity == 0 {
            return Err("station-queue-capacity must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn timing(&self) -> TimingParameters {
        TimingParameters {
            initial_backoff_range: self.initial_backoff_range,
            transmit_ticks: self.transmit_ticks,
            jam_ticks: self.jam_ticks,
        }
    }

    /// Derive the config path from a scene file path.
    ///
    /// Replaces the scene filename with "config.toml" in the same directory.
    pub fn config_path_from_scene(scene_path: &str) -> std::path::PathBuf {
        let scene = Path::new(scene_path);
        scene.parent().unwrap_or(Path::new(".")).join("config.toml")
    }
}
