//! Orbital network simulation core.
//!
//! Ground devices and satellites around Jupiter exchange files over links
//! that need line of sight and range at both ends. The core integrates:
//! - Bearing arithmetic and polar geometry
//! - Per-kind orbital motion, including teleports and relay hysteresis
//! - Reachability with relay closure
//! - The file transfer state machine with per-kind storage and interruption rules
//!
//! ## Module Organization
//!
//! - `angle`: Normalised bearings
//! - `geometry`: Distance and occlusion by the central body
//! - `types`: Entity kinds with their fixed parameters, files and stores
//! - `motion`: How each satellite kind moves per tick
//! - `reachability`: One-hop links and the relay closure
//! - `transfer`: Validation, delivery and interruption of transfers
//! - `events`: Bounded journal of notable events
//! - `network`: The [`Constellation`] registry and tick orchestrator
//!
//! ## Public API
//!
//! Build a [`Constellation`], create entities, seed files onto devices, then
//! alternate `send_file` and `tick` calls and read back snapshots.

pub mod angle;
pub mod events;
pub mod geometry;
pub mod motion;
pub mod network;
pub mod reachability;
pub mod transfer;
pub mod types;

pub use angle::Angle;
pub use events::{EventKind, SimulationEvent};
pub use network::Constellation;
pub use types::{DeviceKind, EntitySnapshot, SatelliteKind};
