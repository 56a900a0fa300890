//! Radio reachability with line-of-sight checks and relay closure.
//!
//! A one-hop link needs all of:
//! - a clear line past the central body,
//! - a distance within the range of both ends,
//! - for a device/satellite pair, the satellite supporting the device kind.
//!
//! Devices never link to each other directly. Relay satellites extend
//! reachability transitively; every other entity is a leaf of the closure.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::angle::Angle;
use super::geometry::{distance, is_visible};
use super::types::{Bandwidth, Device, EntityId, FileStore, InterruptPolicy, Satellite, SatelliteKind, StorageLimit};

/// Borrowed reference to either kind of entity.
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Device(&'a Device),
    Satellite(&'a Satellite),
}

impl<'a> Entity<'a> {
    pub fn id(&self) -> &'a str {
        match *self {
            Entity::Device(device) => &device.id,
            Entity::Satellite(satellite) => &satellite.id,
        }
    }

    pub fn position(&self) -> Angle {
        match *self {
            Entity::Device(device) => device.position,
            Entity::Satellite(satellite) => satellite.position,
        }
    }

    pub fn height(&self) -> f64 {
        match *self {
            Entity::Device(device) => device.height(),
            Entity::Satellite(satellite) => satellite.height,
        }
    }

    pub fn range(&self) -> f64 {
        match *self {
            Entity::Device(device) => device.range(),
            Entity::Satellite(satellite) => satellite.range(),
        }
    }

    pub fn store(&self) -> &'a FileStore {
        match *self {
            Entity::Device(device) => &device.store,
            Entity::Satellite(satellite) => &satellite.store,
        }
    }

    /// Devices are never the limiting side of a link.
    pub fn send_rate(&self) -> Bandwidth {
        match *self {
            Entity::Device(_) => Bandwidth::Unlimited,
            Entity::Satellite(satellite) => satellite.profile().send_rate,
        }
    }

    pub fn receive_rate(&self) -> Bandwidth {
        match *self {
            Entity::Device(_) => Bandwidth::Unlimited,
            Entity::Satellite(satellite) => satellite.profile().receive_rate,
        }
    }

    pub fn storage(&self) -> Option<StorageLimit> {
        match *self {
            Entity::Device(_) => None,
            Entity::Satellite(satellite) => satellite.profile().storage,
        }
    }

    pub fn interrupt_policy(&self) -> InterruptPolicy {
        match *self {
            Entity::Device(_) => InterruptPolicy::Discard,
            Entity::Satellite(satellite) => satellite.profile().interrupt_policy,
        }
    }

    fn as_relay(&self) -> Option<&'a Satellite> {
        match *self {
            Entity::Satellite(satellite) if satellite.kind == SatelliteKind::Relay => Some(satellite),
            _ => None,
        }
    }
}

/// Read-only view over both entity collections.
#[derive(Debug, Clone, Copy)]
pub struct EntityView<'a> {
    pub devices: &'a BTreeMap<EntityId, Device>,
    pub satellites: &'a BTreeMap<EntityId, Satellite>,
}

impl<'a> EntityView<'a> {
    pub fn new(devices: &'a BTreeMap<EntityId, Device>, satellites: &'a BTreeMap<EntityId, Satellite>) -> Self {
        Self { devices, satellites }
    }

    /// Resolve an identifier. Satellites are looked up first.
    pub fn entity(&self, id: &str) -> Option<Entity<'a>> {
        if let Some(satellite) = self.satellites.get(id) {
            return Some(Entity::Satellite(satellite));
        }
        self.devices.get(id).map(Entity::Device)
    }

    pub fn entities(self) -> impl Iterator<Item = Entity<'a>> + 'a {
        let Self { devices, satellites } = self;
        satellites
            .values()
            .map(Entity::Satellite)
            .chain(devices.values().map(Entity::Device))
    }

    /// Every entity one hop away from `origin`.
    pub fn direct_neighbors(self, origin: Entity<'a>) -> impl Iterator<Item = Entity<'a>> + 'a {
        self.entities()
            .filter(move |other| other.id() != origin.id() && in_direct_range(origin, *other))
    }

    /// All entities `origin_id` could exchange a file with this tick.
    ///
    /// Breadth-first closure: the one-hop neighbours of the origin form the
    /// initial result, and every relay found is expanded once, in discovery
    /// order, adding its own one-hop neighbours. The origin itself and any
    /// entity whose kind cannot exchange files with the origin are dropped.
    ///
    /// # Returns
    ///
    /// The reachable identifiers; empty if `origin_id` is unknown.
    pub fn reachable_from(&self, origin_id: &str) -> BTreeSet<EntityId> {
        let Some(origin) = self.entity(origin_id) else {
            return BTreeSet::new();
        };

        let mut found: Vec<Entity<'a>> = self.direct_neighbors(origin).collect();
        let mut relays: Vec<&'a Satellite> = found.iter().filter_map(Entity::as_relay).collect();
        let mut queued: HashSet<&'a str> = relays.iter().map(|relay| relay.id.as_str()).collect();

        let mut cursor = 0;
        while cursor < relays.len() {
            let relay = relays[cursor];
            cursor += 1;
            for neighbor in self.direct_neighbors(Entity::Satellite(relay)) {
                if let Some(next) = neighbor.as_relay() {
                    if queued.insert(next.id.as_str()) {
                        relays.push(next);
                    }
                }
                found.push(neighbor);
            }
        }

        found
            .into_iter()
            .filter(|entity| entity.id() != origin.id())
            .filter(|entity| compatible(origin, *entity))
            .map(|entity| entity.id().to_string())
            .collect()
    }

    /// Two entities are in range when each appears in the other's reachable set.
    pub fn in_range(&self, a: &str, b: &str) -> bool {
        self.reachable_from(a).contains(b) && self.reachable_from(b).contains(a)
    }
}

/// Whether the two kinds can exchange files at all.
pub fn compatible(a: Entity<'_>, b: Entity<'_>) -> bool {
    match (a, b) {
        (Entity::Satellite(_), Entity::Satellite(_)) => true,
        (Entity::Device(device), Entity::Satellite(satellite)) | (Entity::Satellite(satellite), Entity::Device(device)) => {
            satellite.supports(device.kind)
        }
        (Entity::Device(_), Entity::Device(_)) => false,
    }
}

/// One-hop link test between two entities.
pub fn in_direct_range(a: Entity<'_>, b: Entity<'_>) -> bool {
    if !compatible(a, b) {
        return false;
    }
    if !is_visible(a.height(), a.position(), b.height(), b.position()) {
        return false;
    }
    let link = distance(a.height(), a.position(), b.height(), b.position());
    link <= a.range() && link <= b.range()
}
