//! Type definitions for the simulation.
//!
//! Contains all data structures used across the simulation including:
//! - Device and satellite kinds with their fixed parameters as data
//! - Files, the in-flight transfer descriptor and the per-entity file store
//! - Devices and satellites themselves
//! - Serialisable snapshots handed to the reporting layer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::angle::Angle;
use super::geometry::RADIUS_OF_JUPITER;

/// Identifier of a device or satellite. Compared by value everywhere.
pub type EntityId = String;

/// Ground device kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceKind {
    #[serde(rename = "HandheldDevice", alias = "handheld")]
    Handheld,
    #[serde(rename = "LaptopDevice", alias = "laptop")]
    Laptop,
    #[serde(rename = "DesktopDevice", alias = "desktop")]
    Desktop,
}

impl DeviceKind {
    /// Maximum link distance in km.
    pub const fn range(self) -> f64 {
        match self {
            DeviceKind::Handheld => 50_000.0,
            DeviceKind::Laptop => 100_000.0,
            DeviceKind::Desktop => 200_000.0,
        }
    }

    pub const fn type_name(self) -> &'static str {
        match self {
            DeviceKind::Handheld => "HandheldDevice",
            DeviceKind::Laptop => "LaptopDevice",
            DeviceKind::Desktop => "DesktopDevice",
        }
    }
}

/// Satellite kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SatelliteKind {
    #[serde(rename = "StandardSatellite", alias = "standard")]
    Standard,
    #[serde(rename = "TeleportingSatellite", alias = "teleporting")]
    Teleporting,
    #[serde(rename = "RelaySatellite", alias = "relay")]
    Relay,
}

/// Per-tick byte budget of one side of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bandwidth {
    Limited(usize),
    Unlimited,
}

impl Bandwidth {
    /// Effective rate of a link: the tighter of both sides. An unlimited side
    /// never constrains the other one.
    pub fn min(self, other: Bandwidth) -> Bandwidth {
        match (self, other) {
            (Bandwidth::Limited(a), Bandwidth::Limited(b)) => Bandwidth::Limited(a.min(b)),
            (Bandwidth::Limited(a), Bandwidth::Unlimited) | (Bandwidth::Unlimited, Bandwidth::Limited(a)) => Bandwidth::Limited(a),
            (Bandwidth::Unlimited, Bandwidth::Unlimited) => Bandwidth::Unlimited,
        }
    }
}

/// Storage rule applied to a receiver before a transfer is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageLimit {
    /// Maximum number of files held (complete or in flight), if capped.
    pub max_files: Option<usize>,
    /// Maximum total declared size of all held files.
    pub max_bytes: usize,
}

/// What happens to an in-flight file when the link to its source is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptPolicy {
    /// Drop the partial file.
    Discard,
    /// Keep the bytes delivered so far and mark the file complete.
    ForceComplete,
}

/// Fixed parameters of a satellite kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SatelliteProfile {
    /// Linear orbital speed in km per tick.
    pub linear_speed: f64,
    /// Maximum link distance in km.
    pub range: f64,
    /// Device kinds this satellite can talk to.
    pub supports: &'static [DeviceKind],
    /// `None` means no storage check is ever applied.
    pub storage: Option<StorageLimit>,
    pub send_rate: Bandwidth,
    pub receive_rate: Bandwidth,
    pub interrupt_policy: InterruptPolicy,
}

const ALL_DEVICE_KINDS: &[DeviceKind] = &[DeviceKind::Handheld, DeviceKind::Laptop, DeviceKind::Desktop];

const STANDARD_PROFILE: SatelliteProfile = SatelliteProfile {
    linear_speed: 2_500.0,
    range: 150_000.0,
    supports: &[DeviceKind::Handheld, DeviceKind::Laptop],
    storage: Some(StorageLimit {
        max_files: Some(3),
        max_bytes: 80,
    }),
    send_rate: Bandwidth::Limited(1),
    receive_rate: Bandwidth::Limited(1),
    interrupt_policy: InterruptPolicy::Discard,
};

const TELEPORTING_PROFILE: SatelliteProfile = SatelliteProfile {
    linear_speed: 1_000.0,
    range: 200_000.0,
    supports: ALL_DEVICE_KINDS,
    storage: Some(StorageLimit {
        max_files: None,
        max_bytes: 200,
    }),
    send_rate: Bandwidth::Limited(10),
    receive_rate: Bandwidth::Limited(15),
    interrupt_policy: InterruptPolicy::ForceComplete,
};

const RELAY_PROFILE: SatelliteProfile = SatelliteProfile {
    linear_speed: 1_500.0,
    range: 300_000.0,
    supports: ALL_DEVICE_KINDS,
    storage: None,
    send_rate: Bandwidth::Unlimited,
    receive_rate: Bandwidth::Unlimited,
    interrupt_policy: InterruptPolicy::Discard,
};

impl SatelliteKind {
    pub fn profile(self) -> &'static SatelliteProfile {
        match self {
            SatelliteKind::Standard => &STANDARD_PROFILE,
            SatelliteKind::Teleporting => &TELEPORTING_PROFILE,
            SatelliteKind::Relay => &RELAY_PROFILE,
        }
    }

    pub fn supports(self, device: DeviceKind) -> bool {
        self.profile().supports.contains(&device)
    }

    pub const fn type_name(self) -> &'static str {
        match self {
            SatelliteKind::Standard => "StandardSatellite",
            SatelliteKind::Teleporting => "TeleportingSatellite",
            SatelliteKind::Relay => "RelaySatellite",
        }
    }
}

/// A file held by an entity.
///
/// Sizes and offsets count characters of the contents. While a file is in
/// flight it holds only the characters delivered so far, but `size` already
/// carries the full size of the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    name: String,
    contents: String,
    size: usize,
    completed: bool,
}

impl File {
    /// A complete file, e.g. one seeded directly onto a device.
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        let contents = contents.into();
        Self {
            name: name.into(),
            size: contents.chars().count(),
            contents,
            completed: true,
        }
    }

    /// Empty, incomplete file reserving `size` for an incoming transfer.
    pub fn placeholder(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            contents: String::new(),
            size,
            completed: false,
        }
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub(crate) fn append(&mut self, chunk: &str) {
        self.contents.push_str(chunk);
    }

    /// Flip the completion flag. It never reverts.
    pub(crate) fn mark_completed(&mut self) {
        self.completed = true;
    }
}

/// Bookkeeping for one active transfer into a receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundTransfer {
    /// Name of the placeholder file being filled in.
    pub filename: String,
    /// Sending entity.
    pub source: EntityId,
    /// Full contents of the source file, captured when the transfer started.
    pub contents: String,
    /// Full size of the source file.
    pub size: usize,
    pub rate: Bandwidth,
    /// Characters already delivered.
    pub delivered: usize,
}

/// Files of one entity plus its transfer slots.
///
/// At most one inbound transfer may be active. `sending` marks a satellite
/// that is currently the source of some transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStore {
    pub(crate) files: BTreeMap<String, File>,
    pub(crate) inbound: Option<InboundTransfer>,
    pub(crate) sending: bool,
}

impl FileStore {
    pub fn get(&self, filename: &str) -> Option<&File> {
        self.files.get(filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.files.contains_key(filename)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Sum of declared sizes, in-flight placeholders included.
    pub fn total_size(&self) -> usize {
        self.files.values().map(File::size).sum()
    }

    pub fn inbound(&self) -> Option<&InboundTransfer> {
        self.inbound.as_ref()
    }

    pub fn is_receiving(&self) -> bool {
        self.inbound.is_some()
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Insert a file, returning the one it replaced.
    pub(crate) fn insert(&mut self, file: File) -> Option<File> {
        self.files.insert(file.name.clone(), file)
    }
}

/// A ground device.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: EntityId,
    pub kind: DeviceKind,
    pub position: Angle,
    pub store: FileStore,
}

impl Device {
    pub fn new(id: impl Into<EntityId>, kind: DeviceKind, position: Angle) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            store: FileStore::default(),
        }
    }

    pub fn range(&self) -> f64 {
        self.kind.range()
    }

    /// Devices sit on the ground.
    pub fn height(&self) -> f64 {
        RADIUS_OF_JUPITER
    }
}

/// Direction of travel along an orbit. Clockwise decreases the bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    Anticlockwise,
}

impl Direction {
    pub fn reversed(self) -> Direction {
        match self {
            Direction::Clockwise => Direction::Anticlockwise,
            Direction::Anticlockwise => Direction::Clockwise,
        }
    }

    /// Move `position` by `step` in this direction.
    pub fn apply(self, position: Angle, step: Angle) -> Angle {
        match self {
            Direction::Clockwise => position - step,
            Direction::Anticlockwise => position + step,
        }
    }
}

/// A satellite on a circular orbit.
#[derive(Debug, Clone, PartialEq)]
pub struct Satellite {
    pub id: EntityId,
    pub kind: SatelliteKind,
    /// Orbital radius in km, fixed at creation.
    pub height: f64,
    pub position: Angle,
    pub direction: Direction,
    pub store: FileStore,
}

impl Satellite {
    pub fn new(id: impl Into<EntityId>, kind: SatelliteKind, height: f64, position: Angle) -> Self {
        let direction = match kind {
            SatelliteKind::Teleporting if position < Angle::HALF_TURN => Direction::Anticlockwise,
            _ => Direction::Clockwise,
        };
        Self {
            id: id.into(),
            kind,
            height,
            position,
            direction,
            store: FileStore::default(),
        }
    }

    pub fn profile(&self) -> &'static SatelliteProfile {
        self.kind.profile()
    }

    pub fn range(&self) -> f64 {
        self.profile().range
    }

    pub fn supports(&self, device: DeviceKind) -> bool {
        self.kind.supports(device)
    }
}

/// Reported state of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSnapshot {
    pub filename: String,
    pub contents: String,
    pub size: usize,
    pub completed: bool,
}

impl From<&File> for FileSnapshot {
    fn from(file: &File) -> Self {
        Self {
            filename: file.name.clone(),
            contents: file.contents.clone(),
            size: file.size,
            completed: file.completed,
        }
    }
}

/// Reported state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub position: Angle,
    /// Orbital radius, or the ground radius for devices.
    pub height: f64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub files: BTreeMap<String, FileSnapshot>,
}

fn snapshot_files(store: &FileStore) -> BTreeMap<String, FileSnapshot> {
    store.files.iter().map(|(name, file)| (name.clone(), file.into())).collect()
}

impl From<&Device> for EntitySnapshot {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            position: device.position,
            height: device.height(),
            kind: device.kind.type_name(),
            files: snapshot_files(&device.store),
        }
    }
}

impl From<&Satellite> for EntitySnapshot {
    fn from(satellite: &Satellite) -> Self {
        Self {
            id: satellite.id.clone(),
            position: satellite.position,
            height: satellite.height,
            kind: satellite.kind.type_name(),
            files: snapshot_files(&satellite.store),
        }
    }
}
