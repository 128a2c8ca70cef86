//! Scene loading, parsing, and validation logic.
//!
//! A scene names the transceivers of a network, how they are linked, which
//! stations hang off them and what those stations should send at start-up.
//! Labels in the file are free-form strings; building the scene maps them to
//! simulation ids.

use anyhow::Context;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;

use crate::control::config::SimulationConfig;
use crate::simulation::Simulation;
use crate::simulation::types::{StationId, TransceiverId};

/// Error type for scene loading failures.
#[derive(Debug)]
pub enum SceneLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
    BuildError(String),
}

impl std::fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            SceneLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            SceneLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            SceneLoadError::BuildError(msg) => write!(f, "Failed to build network: {}", msg),
        }
    }
}

impl std::error::Error for SceneLoadError {}

/// A transceiver, optionally hanging off an earlier one.
#[derive(Debug, Deserialize, Clone)]
pub struct TransceiverSpec {
    pub id: String,
    /// Label of the transceiver to link to. Absent for roots.
    #[serde(default)]
    pub parent: Option<String>,
    /// Link weight in ticks. Defaults to 1; ignored for roots.
    #[serde(default)]
    pub weight: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StationSpec {
    pub id: String,
    pub transceiver: String,
    #[serde(default)]
    pub weight: Option<u32>,
}

/// A message queued at a station before the first tick.
#[derive(Debug, Deserialize, Clone)]
pub struct MessageSpec {
    pub station: String,
    pub payload: String,
    pub destination: String,
}

/// Root structure representing the entire scene.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    pub transceivers: Vec<TransceiverSpec>,
    #[serde(default)]
    pub stations: Vec<StationSpec>,
    #[serde(default)]
    pub messages: Vec<MessageSpec>,
}

/// A scene turned into a runnable simulation.
pub struct BuiltScene {
    pub simulation: Simulation,
    pub transceivers: HashMap<String, TransceiverId>,
    pub stations: HashMap<String, StationId>,
}

impl BuiltScene {
    /// Label of a station id, for reporting.
    pub fn station_label(&self, id: StationId) -> Option<&str> {
        self.stations.iter().find(|(_, v)| **v == id).map(|(k, _)| k.as_str())
    }
}

/// Load and parse a scene from a file.
///
/// # Parameters
///
/// * `path` - Path to the scene JSON file
///
/// # Returns
///
/// Parsed and validated Scene or an error.
pub fn load_scene(path: &str) -> Result<Scene, SceneLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| SceneLoadError::FileReadError(e.to_string()))?;

    parse_scene(&data)
}

/// Parse and validate scene JSON.
pub fn parse_scene(data: &str) -> Result<Scene, SceneLoadError> {
    let scene: Scene = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| SceneLoadError::ParseError(format!("{:#}", e)))?;

    validate_scene(&scene).map_err(SceneLoadError::ValidationError)?;

    Ok(scene)
}

/// Validate scene structure.
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scene(scene: &Scene) -> Result<(), String> {
    const MAX_TRANSCEIVERS: usize = 10000;

    if scene.transceivers.is_empty() {
        return Err("Scene must contain at least one transceiver".to_string());
    }
    if scene.transceivers.len() > MAX_TRANSCEIVERS {
        return Err(format!(
            "Transceiver count {} exceeds maximum of {}",
            scene.transceivers.len(),
            MAX_TRANSCEIVERS
        ));
    }

    // Parents must be declared before their children.
    let mut declared = HashSet::new();
    for t in &scene.transceivers {
        if let Some(parent) = &t.parent {
            if !declared.contains(parent.as_str()) {
                return Err(format!("Transceiver '{}' refers to undeclared parent '{}'", t.id, parent));
            }
        }
        if t.weight == Some(0) {
            return Err(format!("Transceiver '{}' has zero link weight", t.id));
        }
        if !declared.insert(t.id.as_str()) {
            return Err(format!("Duplicate transceiver id found: {}", t.id));
        }
    }

    let mut stations = HashSet::new();
    let mut occupied = HashSet::new();
    for s in &scene.stations {
        if !declared.contains(s.transceiver.as_str()) {
            return Err(format!("Station '{}' refers to unknown transceiver '{}'", s.id, s.transceiver));
        }
        if s.weight == Some(0) {
            return Err(format!("Station '{}' has zero link weight", s.id));
        }
        if !occupied.insert(s.transceiver.as_str()) {
            return Err(format!("Transceiver '{}' has more than one station", s.transceiver));
        }
        if !stations.insert(s.id.as_str()) {
            return Err(format!("Duplicate station id found: {}", s.id));
        }
    }

    for (idx, m) in scene.messages.iter().enumerate() {
        if !stations.contains(m.station.as_str()) {
            return Err(format!("Message {} is sent from unknown station '{}'", idx, m.station));
        }
        if !stations.contains(m.destination.as_str()) {
            return Err(format!("Message {} is addressed to unknown station '{}'", idx, m.destination));
        }
    }

    Ok(())
}

impl Scene {
    /// Create the network described by the scene and queue its messages.
    pub fn build(&self, config: &SimulationConfig) -> Result<BuiltScene, SceneLoadError> {
        let mut simulation = Simulation::new(config);
        let mut transceivers: HashMap<String, TransceiverId> = HashMap::new();
        let mut stations: HashMap<String, StationId> = HashMap::new();
        let build_err = |e: crate::simulation::TopologyError| SceneLoadError::BuildError(e.to_string());

        for t in &self.transceivers {
            let id = match t.parent.as_ref().and_then(|p| transceivers.get(p)) {
                Some(&parent) => simulation.attach_transceiver(parent, t.weight.unwrap_or(1)).map_err(build_err)?.0,
                None => simulation.create_transceiver(),
            };
            transceivers.insert(t.id.clone(), id);
        }

        for s in &self.stations {
            let transceiver = transceivers
                .get(&s.transceiver)
                .copied()
                .ok_or_else(|| SceneLoadError::BuildError(format!("Unknown transceiver '{}'", s.transceiver)))?;
            let (id, _) = simulation.attach_station(transceiver, s.weight.unwrap_or(1)).map_err(build_err)?;
            stations.insert(s.id.clone(), id);
        }

        for m in &self.messages {
            let (Some(&from), Some(&to)) = (stations.get(&m.station), stations.get(&m.destination)) else {
                return Err(SceneLoadError::BuildError(format!("Unknown station in message '{}'", m.payload)));
            };
            if !simulation.enqueue(from, m.payload.clone(), to).map_err(build_err)? {
                log::warn!("Station '{}' queue is full, message '{}' dropped", m.station, m.payload);
            }
        }

        log::info!(
            "Scene built: {} transceivers, {} stations, {} links, {} queued messages",
            simulation.transceivers().len(),
            simulation.stations().len(),
            simulation.links().len(),
            self.messages.len()
        );

        Ok(BuiltScene {
            simulation,
            transceivers,
            stations,
        })
    }
}
