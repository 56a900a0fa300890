//! Scene loading, parsing, and validation logic.
//!
//! A scene is a JSON document describing the initial constellation:
//! devices with their seeded files, satellites, and an optional schedule of
//! transfers to request at given ticks.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;

use crate::simulation::geometry::RADIUS_OF_JUPITER;
use crate::simulation::{Angle, Constellation, DeviceKind, SatelliteKind};

/// Upper bound on entities in one scene.
const MAX_ENTITIES: usize = 10_000;

/// Error type for scene loading failures.
#[derive(Debug)]
pub enum SceneLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            SceneLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            SceneLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for SceneLoadError {}

/// A file placed on a device before the first tick.
#[derive(Debug, Deserialize, Clone)]
pub struct SeedFile {
    pub name: String,
    pub contents: String,
}

/// Ground device entry.
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    /// Bearing in degrees; any real value, normalised on load.
    pub position: f64,
    #[serde(default)]
    pub files: Vec<SeedFile>,
}

/// Satellite entry.
#[derive(Debug, Deserialize, Clone)]
pub struct SatelliteSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SatelliteKind,
    /// Orbital radius in km.
    pub height: f64,
    /// Bearing in degrees.
    pub position: f64,
}

/// A `send_file` request issued right before tick `tick` runs.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ScheduledTransfer {
    pub tick: u64,
    pub file: String,
    pub from: String,
    pub to: String,
}

/// Root structure representing the entire scene.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Scene {
    #[serde(default)]
    pub devices: Vec<DeviceSpec>,
    #[serde(default)]
    pub satellites: Vec<SatelliteSpec>,
    /// Scheduled transfers, in any order.
    #[serde(default)]
    pub transfers: Vec<ScheduledTransfer>,
    /// Number of ticks to run when the command line does not say.
    #[serde(default)]
    pub ticks: Option<u64>,
}

impl Scene {
    /// Transfers scheduled for `tick`, in file order.
    pub fn transfers_at(&self, tick: u64) -> impl Iterator<Item = &ScheduledTransfer> {
        self.transfers.iter().filter(move |transfer| transfer.tick == tick)
    }

    /// Build the initial constellation. Expects a validated scene.
    pub fn build(&self) -> Constellation {
        let mut constellation = Constellation::new();
        for device in &self.devices {
            constellation.create_device(device.id.clone(), device.kind, Angle::from_degrees(device.position));
            for file in &device.files {
                if let Err(e) = constellation.add_file_to_device(&device.id, &file.name, &file.contents) {
                    log::warn!("Skipping seeded file {} on {}: {}", file.name, device.id, e);
                }
            }
        }
        for satellite in &self.satellites {
            constellation.create_satellite(satellite.id.clone(), satellite.kind, satellite.height, Angle::from_degrees(satellite.position));
        }
        constellation
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

/// Parse and validate a scene from JSON text.
pub fn parse_scene(data: &str) -> Result<Scene, SceneLoadError> {
    let scene: Scene = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| SceneLoadError::ParseError(format!("{:#}", e)))?;

    validate_scene(&scene).map_err(SceneLoadError::ValidationError)?;

    Ok(scene)
}

/// Validate scene configuration.
///
/// Rejects:
/// - Empty scenes and scenes with more than `MAX_ENTITIES` entities
/// - Identifiers shared by two entities, device or satellite
/// - Non-finite bearings or heights, and satellites at or below the ground
/// - The same filename seeded twice onto one device
/// - Scheduled transfers naming unknown entities
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scene(scene: &Scene) -> Result<(), String> {
    let entity_count = scene.devices.len() + scene.satellites.len();
    if entity_count == 0 {
        return Err("Scene must contain at least one device or satellite".to_string());
    }
    if entity_count > MAX_ENTITIES {
        return Err(format!("Entity count {} exceeds maximum of {}", entity_count, MAX_ENTITIES));
    }

    let mut ids = HashSet::new();
    for id in scene.devices.iter().map(|d| &d.id).chain(scene.satellites.iter().map(|s| &s.id)) {
        if !ids.insert(id.as_str()) {
            return Err(format!("Duplicate id found: {}", id));
        }
    }

    for device in &scene.devices {
        if !device.position.is_finite() {
            return Err(format!("Device {} has a non-finite position", device.id));
        }
        let mut names = HashSet::new();
        for file in &device.files {
            if !names.insert(file.name.as_str()) {
                return Err(format!("Device {} seeds file {} more than once", device.id, file.name));
            }
        }
    }

    for satellite in &scene.satellites {
        if !satellite.position.is_finite() {
            return Err(format!("Satellite {} has a non-finite position", satellite.id));
        }
        if !satellite.height.is_finite() || satellite.height <= RADIUS_OF_JUPITER {
            return Err(format!(
                "Satellite {} height {} km must be above the surface ({} km)",
                satellite.id, satellite.height, RADIUS_OF_JUPITER
            ));
        }
    }

    for (idx, transfer) in scene.transfers.iter().enumerate() {
        for endpoint in [&transfer.from, &transfer.to] {
            if !ids.contains(endpoint.as_str()) {
                return Err(format!("Transfer {} ({}) refers to unknown entity {}", idx, transfer.file, endpoint));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "devices": [
            { "id": "phone", "type": "HandheldDevice", "position": 0,
              "files": [ { "name": "hello.txt", "contents": "hello" } ] },
            { "id": "desk", "type": "desktop", "position": -90 }
        ],
        "satellites": [
            { "id": "std", "type": "StandardSatellite", "height": 80000, "position": 0 },
            { "id": "relay", "type": "relay", "height": 90000, "position": 45 }
        ],
        "transfers": [
            { "tick": 2, "file": "hello.txt", "from": "phone", "to": "std" },
            { "tick": 0, "file": "hello.txt", "from": "phone", "to": "relay" }
        ],
        "ticks": 12
    }"#;

    fn scene_with(patch: impl FnOnce(&mut Scene)) -> Result<(), String> {
        let mut scene = parse_scene(SCENE).unwrap();
        patch(&mut scene);
        validate_scene(&scene)
    }

    #[test]
    fn parses_full_names_and_aliases() {
        let scene = parse_scene(SCENE).unwrap();
        assert_eq!(scene.devices[0].kind, DeviceKind::Handheld);
        assert_eq!(scene.devices[1].kind, DeviceKind::Desktop);
        assert_eq!(scene.satellites[1].kind, SatelliteKind::Relay);
        assert_eq!(scene.ticks, Some(12));
        assert_eq!(scene.transfers_at(2).count(), 1);
        assert_eq!(scene.transfers_at(0).next().map(|t| t.to.as_str()), Some("relay"));
        assert_eq!(scene.transfers_at(5).count(), 0);
    }

    #[test]
    fn builds_a_constellation_with_seeded_files() {
        let constellation = parse_scene(SCENE).unwrap().build();
        assert_eq!(constellation.list_device_ids(), vec!["desk".to_string(), "phone".to_string()]);
        assert_eq!(constellation.list_satellite_ids(), vec!["relay".to_string(), "std".to_string()]);
        let phone = constellation.snapshot_of("phone").unwrap();
        assert_eq!(phone.files["hello.txt"].size, 5);
        assert_eq!(constellation.snapshot_of("desk").unwrap().position, Angle::from_degrees(270.0));
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let scene = parse_scene(r#"{ "satellites": [ { "id": "s", "type": "teleporting", "height": 70000, "position": 10 } ] }"#).unwrap();
        assert!(scene.devices.is_empty());
        assert!(scene.transfers.is_empty());
        assert_eq!(scene.ticks, None);
    }

    #[test]
    fn rejects_empty_scene() {
        let err = parse_scene("{}").unwrap_err();
        assert!(matches!(err, SceneLoadError::ValidationError(_)));
    }

    #[test]
    fn rejects_unknown_kind_as_parse_error() {
        let err = parse_scene(r#"{ "devices": [ { "id": "x", "type": "Toaster", "position": 0 } ] }"#).unwrap_err();
        assert!(matches!(err, SceneLoadError::ParseError(_)));
        assert!(err.to_string().starts_with("Failed to parse JSON"));
    }

    #[test]
    fn rejects_duplicate_ids_across_collections() {
        let err = scene_with(|scene| scene.satellites[0].id = "phone".into()).unwrap_err();
        assert!(err.contains("Duplicate id"), "{err}");
    }

    #[test]
    fn rejects_satellite_below_the_surface() {
        let err = scene_with(|scene| scene.satellites[0].height = RADIUS_OF_JUPITER).unwrap_err();
        assert!(err.contains("above the surface"), "{err}");
    }

    #[test]
    fn rejects_non_finite_positions() {
        assert!(scene_with(|scene| scene.devices[0].position = f64::NAN).is_err());
        assert!(scene_with(|scene| scene.satellites[1].position = f64::INFINITY).is_err());
    }

    #[test]
    fn rejects_duplicate_seeded_files() {
        let err = scene_with(|scene| {
            let copy = scene.devices[0].files[0].clone();
            scene.devices[0].files.push(copy);
        })
        .unwrap_err();
        assert!(err.contains("more than once"), "{err}");
    }

    #[test]
    fn rejects_transfers_to_unknown_entities() {
        let err = scene_with(|scene| scene.transfers[0].to = "ghost".into()).unwrap_err();
        assert!(err.contains("ghost"), "{err}");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_scene("/definitely/not/here/scene.json").unwrap_err();
        assert!(matches!(err, SceneLoadError::FileReadError(_)));
    }
}
