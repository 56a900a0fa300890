//! Tick orchestrator and entity registry.
//!
//! [`Constellation`] owns every device and satellite and drives the
//! simulation one tick at a time. A tick runs four phases in order:
//! 1) move every satellite along its orbit,
//! 2) advance every in-flight transfer by its per-tick quota,
//! 3) release satellites that no longer feed any receiver,
//! 4) resolve transfers whose endpoints are no longer mutually reachable.
//!
//! Nothing else mutates entity state, so observers always see the state
//! between two whole ticks.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::angle::Angle;
use super::events::{EventJournal, EventKind, SimulationEvent};
use super::reachability::{Entity, EntityView};
use super::transfer::{self, Progress, TransferError};
use super::types::{Device, DeviceKind, EntityId, EntitySnapshot, File, InterruptPolicy, Satellite, SatelliteKind};

/// The simulated world: all entities, the tick counter and the event journal.
#[derive(Debug, Clone, Default)]
pub struct Constellation {
    devices: BTreeMap<EntityId, Device>,
    satellites: BTreeMap<EntityId, Satellite>,
    tick_count: u64,
    events: EventJournal,
}

impl Constellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view used by reachability and transfer validation.
    pub fn view(&self) -> EntityView<'_> {
        EntityView::new(&self.devices, &self.satellites)
    }

    /// Add a device, replacing any entity that already uses `id`.
    pub fn create_device(&mut self, id: impl Into<EntityId>, kind: DeviceKind, position: Angle) {
        let id = id.into();
        if self.forget(&id) {
            log::warn!("Replacing existing entity {}", id);
        }
        log::debug!("Created {} {} at {}", kind.type_name(), id, position);
        self.devices.insert(id.clone(), Device::new(id, kind, position));
    }

    /// Add a satellite, replacing any entity that already uses `id`.
    ///
    /// # Parameters
    ///
    /// * `id` - Unique identifier across devices and satellites
    /// * `kind` - Satellite kind, fixing speed, range and transfer rules
    /// * `height` - Orbital radius in km
    /// * `position` - Initial bearing
    pub fn create_satellite(&mut self, id: impl Into<EntityId>, kind: SatelliteKind, height: f64, position: Angle) {
        let id = id.into();
        if self.forget(&id) {
            log::warn!("Replacing existing entity {}", id);
        }
        log::debug!("Created {} {} at {} (height {} km)", kind.type_name(), id, position, height);
        self.satellites.insert(id.clone(), Satellite::new(id, kind, height, position));
    }

    /// Remove a device. Transfers it was feeding are resolved at the next tick.
    pub fn remove_device(&mut self, id: &str) -> bool {
        self.devices.remove(id).is_some()
    }

    /// Remove a satellite. Transfers it was feeding are resolved at the next tick.
    pub fn remove_satellite(&mut self, id: &str) -> bool {
        self.satellites.remove(id).is_some()
    }

    fn forget(&mut self, id: &str) -> bool {
        let device = self.devices.remove(id).is_some();
        let satellite = self.satellites.remove(id).is_some();
        device || satellite
    }

    pub fn list_device_ids(&self) -> Vec<EntityId> {
        self.devices.keys().cloned().collect()
    }

    pub fn list_satellite_ids(&self) -> Vec<EntityId> {
        self.satellites.keys().cloned().collect()
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn satellite(&self, id: &str) -> Option<&Satellite> {
        self.satellites.get(id)
    }

    /// Seed a complete file straight onto a device, bypassing the transfer engine.
    pub fn add_file_to_device(&mut self, id: &str, filename: &str, contents: &str) -> Result<(), TransferError> {
        let device = self
            .devices
            .get_mut(id)
            .ok_or_else(|| TransferError::UnknownEntity(id.to_string()))?;
        if device.store.contains(filename) {
            return Err(TransferError::AlreadyExists(filename.to_string()));
        }
        device.store.insert(File::new(filename, contents));
        Ok(())
    }

    /// Start copying `filename` from `from` to `to`.
    ///
    /// Validation happens entirely on borrowed state; on error nothing has
    /// changed. Both ends must be mutually reachable when the request is
    /// made. Losing the link later is resolved by the interruption phase.
    ///
    /// # Returns
    ///
    /// `Ok(())` once the placeholder and descriptor are installed on the
    /// receiver, otherwise the first validation error.
    pub fn send_file(&mut self, filename: &str, from: &str, to: &str) -> Result<(), TransferError> {
        let view = self.view();
        let source = view.entity(from).ok_or_else(|| TransferError::UnknownEntity(from.to_string()))?;
        let destination = view.entity(to).ok_or_else(|| TransferError::UnknownEntity(to.to_string()))?;
        let queued = transfer::prepare(view, filename, source, destination)?;

        log::debug!(
            "Transfer of {} ({} bytes) from {} to {} queued at {:?}",
            queued.filename,
            queued.size,
            queued.source,
            queued.destination,
            queued.rate
        );
        if queued.marks_sender {
            if let Some(satellite) = self.satellites.get_mut(&queued.source) {
                satellite.store.sending = true;
            }
        }
        self.events.push(
            self.tick_count,
            EventKind::TransferStarted {
                filename: queued.filename.clone(),
                source: queued.source.clone(),
                destination: queued.destination.clone(),
                size: queued.size,
            },
        );
        match self.satellites.get_mut(&queued.destination) {
            Some(satellite) => satellite.store.admit(queued),
            None => {
                if let Some(device) = self.devices.get_mut(&queued.destination) {
                    device.store.admit(queued);
                }
            }
        }
        Ok(())
    }

    /// Identifiers `id` could exchange a file with right now.
    pub fn reachable_from(&self, id: &str) -> BTreeSet<EntityId> {
        self.view().reachable_from(id)
    }

    /// Whether `a` and `b` appear in each other's reachable sets.
    pub fn is_in_range(&self, a: &str, b: &str) -> bool {
        self.view().in_range(a, b)
    }

    /// Advance the whole simulation by one tick.
    pub fn tick(&mut self) {
        let tick = self.tick_count;
        log::trace!("Tick {} starting", tick);
        self.advance_orbits(tick);
        self.advance_transfers(tick);
        self.release_senders();
        self.resolve_interruptions(tick);
        self.tick_count += 1;
    }

    /// Run `ticks` sequential ticks.
    pub fn simulate(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.tick_count
    }

    pub fn snapshot_of(&self, id: &str) -> Option<EntitySnapshot> {
        self.view().entity(id).map(snapshot)
    }

    /// Snapshots of every device, then every satellite, each sorted by id.
    pub fn snapshots(&self) -> Vec<EntitySnapshot> {
        self.devices
            .values()
            .map(EntitySnapshot::from)
            .chain(self.satellites.values().map(EntitySnapshot::from))
            .collect()
    }

    pub fn drain_events(&mut self) -> Vec<SimulationEvent> {
        self.events.drain()
    }

    fn advance_orbits(&mut self, tick: u64) {
        for satellite in self.satellites.values_mut() {
            if satellite.advance_orbit() {
                self.events.push(
                    tick,
                    EventKind::Teleported {
                        satellite: satellite.id.clone(),
                        position: satellite.position,
                    },
                );
            }
        }
    }

    fn advance_transfers(&mut self, tick: u64) {
        let stores = self
            .satellites
            .values_mut()
            .map(|satellite| (&satellite.id, &mut satellite.store))
            .chain(self.devices.values_mut().map(|device| (&device.id, &mut device.store)));
        for (id, store) in stores {
            if let Progress::Completed { filename, source } = store.advance_inbound() {
                log::debug!("Transfer of {} from {} to {} completed", filename, source, id);
                self.events.push(
                    tick,
                    EventKind::TransferCompleted {
                        filename,
                        source,
                        destination: id.clone(),
                    },
                );
            }
        }
    }

    /// Clear the sender flag of every satellite that is not receiving and
    /// is no longer the source of any in-flight descriptor.
    fn release_senders(&mut self) {
        let feeding: HashSet<EntityId> = self
            .view()
            .entities()
            .filter_map(|entity| entity.store().inbound())
            .map(|inbound| inbound.source.clone())
            .collect();
        for satellite in self.satellites.values_mut() {
            if satellite.store.sending && !satellite.store.is_receiving() && !feeding.contains(&satellite.id) {
                log::trace!("{} has bandwidth again", satellite.id);
                satellite.store.sending = false;
            }
        }
    }

    /// Apply each receiver's interruption policy to transfers whose source
    /// is gone or no longer mutually reachable.
    fn resolve_interruptions(&mut self, tick: u64) {
        let view = self.view();
        let lost: Vec<(EntityId, InterruptPolicy)> = view
            .entities()
            .filter(|receiver| {
                receiver
                    .store()
                    .inbound()
                    .is_some_and(|inbound| view.entity(&inbound.source).is_none() || !view.in_range(receiver.id(), &inbound.source))
            })
            .map(|receiver| (receiver.id().to_string(), receiver.interrupt_policy()))
            .collect();

        for (id, policy) in lost {
            let store = match self.satellites.get_mut(&id) {
                Some(satellite) => &mut satellite.store,
                None => match self.devices.get_mut(&id) {
                    Some(device) => &mut device.store,
                    None => continue,
                },
            };
            let Some(interruption) = store.interrupt_inbound(policy) else {
                continue;
            };
            log::debug!(
                "Transfer of {} from {} to {} lost its link after {} bytes ({:?})",
                interruption.filename,
                interruption.source,
                id,
                interruption.delivered,
                policy
            );
            self.events.push(
                tick,
                EventKind::interrupted(policy, interruption.filename, interruption.source, id, interruption.delivered),
            );
        }
    }
}

fn snapshot(entity: Entity<'_>) -> EntitySnapshot {
    match entity {
        Entity::Device(device) => device.into(),
        Entity::Satellite(satellite) => satellite.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::geometry::RADIUS_OF_JUPITER;
    use crate::simulation::transfer::StorageShortfall;

    const HEIGHT: f64 = 80_000.0;

    fn deg(d: f64) -> Angle {
        Angle::from_degrees(d)
    }

    /// A handheld and a standard satellite sharing a bearing, plus a seeded file.
    fn phone_and_standard(contents: &str) -> Constellation {
        let mut c = Constellation::new();
        c.create_device("phone", DeviceKind::Handheld, deg(0.0));
        c.create_satellite("std", SatelliteKind::Standard, HEIGHT, deg(0.0));
        c.add_file_to_device("phone", "msg", contents).unwrap();
        c
    }

    fn file<'a>(c: &'a Constellation, id: &str, name: &str) -> Option<&'a File> {
        let view_store = match c.satellite(id) {
            Some(satellite) => &satellite.store,
            None => &c.device(id)?.store,
        };
        view_store.get(name)
    }

    #[test]
    fn standard_satellite_receives_one_byte_per_tick() {
        let mut c = phone_and_standard("hello");
        c.send_file("msg", "phone", "std").unwrap();
        let placeholder = file(&c, "std", "msg").unwrap();
        assert_eq!(placeholder.size(), 5);
        assert_eq!(placeholder.contents(), "");

        for tick in 1..5 {
            c.tick();
            let partial = file(&c, "std", "msg").unwrap();
            assert_eq!(partial.contents().len(), tick);
            assert!(!partial.is_completed());
        }
        c.tick();
        let done = file(&c, "std", "msg").unwrap();
        assert_eq!(done.contents(), "hello");
        assert!(done.is_completed());

        let snapshot = c.snapshot_of("std").unwrap();
        assert!(snapshot.files["msg"].completed);
        assert_eq!(snapshot.kind, "StandardSatellite");
    }

    #[test]
    fn same_filename_twice_already_exists() {
        let mut c = phone_and_standard("hello");
        c.send_file("msg", "phone", "std").unwrap();
        assert_eq!(c.send_file("msg", "phone", "std"), Err(TransferError::AlreadyExists("msg".into())));
    }

    #[test]
    fn busy_destination_has_no_bandwidth() {
        let mut c = phone_and_standard("hello");
        c.add_file_to_device("phone", "other", "abc").unwrap();
        c.send_file("msg", "phone", "std").unwrap();
        assert_eq!(c.send_file("other", "phone", "std"), Err(TransferError::NoBandwidth("std".into())));
    }

    #[test]
    fn unknown_ids_are_reported_before_anything_else() {
        let mut c = phone_and_standard("hello");
        assert_eq!(c.send_file("missing", "ghost", "std"), Err(TransferError::UnknownEntity("ghost".into())));
        assert_eq!(c.send_file("msg", "phone", "ghost"), Err(TransferError::UnknownEntity("ghost".into())));
        assert_eq!(c.add_file_to_device("std", "x", "y"), Err(TransferError::UnknownEntity("std".into())));
    }

    #[test]
    fn failed_send_leaves_state_untouched() {
        let mut c = phone_and_standard(&"x".repeat(81));
        let before = c.snapshots();
        assert_eq!(
            c.send_file("msg", "phone", "std"),
            Err(TransferError::NoStorageSpace(StorageShortfall::MaxStorageReached))
        );
        assert_eq!(c.snapshots(), before);
        assert!(c.drain_events().is_empty());
    }

    #[test]
    fn sender_is_released_once_its_transfer_completes() {
        let mut c = Constellation::new();
        c.create_satellite("tele", SatelliteKind::Teleporting, HEIGHT, deg(90.0));
        for id in ["a", "b", "c"] {
            c.create_device(id, DeviceKind::Desktop, deg(90.0));
        }
        c.add_file_to_device("a", "doc", &"d".repeat(20)).unwrap();
        c.add_file_to_device("a", "memo", "m").unwrap();

        c.send_file("doc", "a", "tele").unwrap();
        c.simulate(2);
        assert!(file(&c, "tele", "doc").unwrap().is_completed());

        c.send_file("doc", "tele", "b").unwrap();
        assert!(c.satellite("tele").unwrap().store.is_sending());
        assert_eq!(c.send_file("doc", "tele", "c"), Err(TransferError::NoBandwidth("tele".into())));
        // Devices never exchange files directly
        assert_eq!(c.send_file("memo", "a", "c"), Err(TransferError::OutOfRange("a".into(), "c".into())));

        c.tick();
        assert!(c.satellite("tele").unwrap().store.is_sending());
        c.tick();
        assert!(file(&c, "b", "doc").unwrap().is_completed());
        assert!(!c.satellite("tele").unwrap().store.is_sending());
        c.send_file("doc", "tele", "c").unwrap();
    }

    #[test]
    fn removed_source_discards_on_standard_and_force_completes_on_teleporting() {
        let contents = "abcdefghijklmnopqrstuvwxyz0123456789ABCD";
        let mut c = Constellation::new();
        c.create_device("phone", DeviceKind::Laptop, deg(0.0));
        c.create_device("laptop", DeviceKind::Laptop, deg(0.0));
        c.create_satellite("std", SatelliteKind::Standard, HEIGHT, deg(0.0));
        c.create_satellite("tele", SatelliteKind::Teleporting, HEIGHT, deg(0.0));
        c.add_file_to_device("phone", "f", contents).unwrap();
        c.add_file_to_device("laptop", "f", contents).unwrap();

        c.send_file("f", "phone", "std").unwrap();
        c.send_file("f", "laptop", "tele").unwrap();
        c.tick();
        c.remove_device("phone");
        c.remove_device("laptop");
        c.tick();

        assert!(file(&c, "std", "f").is_none());
        assert!(!c.satellite("std").unwrap().store.is_receiving());

        let forced = file(&c, "tele", "f").unwrap();
        assert!(forced.is_completed());
        assert_eq!(forced.contents(), &contents[..30]);
        assert_eq!(forced.size(), 40);

        let kinds: Vec<EventKind> = c.drain_events().into_iter().map(|event| event.kind).collect();
        assert!(kinds.iter().any(|kind| matches!(kind, EventKind::TransferDiscarded { delivered: 2, .. })));
        assert!(kinds.iter().any(|kind| matches!(kind, EventKind::TransferForceCompleted { delivered: 30, .. })));
    }

    #[test]
    fn unreachable_pairs_are_refused_before_any_state_changes() {
        let mut c = Constellation::new();
        c.create_device("a", DeviceKind::Desktop, deg(0.0));
        c.create_device("b", DeviceKind::Desktop, deg(180.0));
        c.create_device("phone", DeviceKind::Handheld, deg(0.0));
        c.create_satellite("relay", SatelliteKind::Relay, HEIGHT, deg(180.0));
        c.add_file_to_device("a", "f", "secret payload").unwrap();
        c.add_file_to_device("phone", "g", "0123456789").unwrap();
        assert!(c.reachable_from("a").is_empty());
        assert!(!c.is_in_range("phone", "relay"));
        let before = c.snapshots();

        assert_eq!(c.send_file("f", "a", "b"), Err(TransferError::OutOfRange("a".into(), "b".into())));
        assert_eq!(c.send_file("g", "phone", "relay"), Err(TransferError::OutOfRange("phone".into(), "relay".into())));
        assert_eq!(c.snapshots(), before);

        c.tick();
        assert!(file(&c, "b", "f").is_none());
        assert!(file(&c, "relay", "g").is_none());
        assert!(c.drain_events().is_empty());
    }

    #[test]
    fn orbit_loss_discards_on_standard_and_force_completes_on_teleporting() {
        // Both satellites start 26 degrees behind their handheld and move
        // clockwise; the horizon at this height is about 29.09 degrees
        let contents = "z".repeat(80);
        let mut c = Constellation::new();
        for (phone, satellite, kind) in [("p1", "std", SatelliteKind::Standard), ("p2", "tele", SatelliteKind::Teleporting)] {
            c.create_device(phone, DeviceKind::Handheld, deg(226.0));
            c.create_satellite(satellite, kind, HEIGHT, deg(200.0));
            c.add_file_to_device(phone, "f", &contents).unwrap();
            c.send_file("f", phone, satellite).unwrap();
        }

        c.tick();
        assert_eq!(file(&c, "std", "f").unwrap().contents().len(), 1);
        c.tick();
        assert!(!c.is_in_range("p1", "std"));
        assert!(file(&c, "std", "f").is_none());
        assert!(!c.satellite("std").unwrap().store.is_receiving());

        c.simulate(2);
        assert!(c.is_in_range("p2", "tele"));
        assert_eq!(file(&c, "tele", "f").unwrap().contents().len(), 60);
        c.tick();
        assert!(!c.is_in_range("p2", "tele"));
        let kept = file(&c, "tele", "f").unwrap();
        assert!(kept.is_completed());
        assert_eq!(kept.contents().len(), 75);
        assert_eq!(kept.size(), 80);

        let kinds: Vec<EventKind> = c.drain_events().into_iter().map(|event| event.kind).collect();
        assert!(kinds.iter().any(|kind| matches!(kind, EventKind::TransferDiscarded { delivered: 2, .. })));
        assert!(kinds.iter().any(|kind| matches!(kind, EventKind::TransferForceCompleted { delivered: 75, .. })));
    }

    #[test]
    fn standard_receiver_drops_the_file_when_it_orbits_out_of_sight() {
        // 1.79 degrees per tick: still visible after 16 ticks, hidden after 17
        let mut c = phone_and_standard(&"x".repeat(30));
        c.send_file("msg", "phone", "std").unwrap();
        c.simulate(16);
        assert_eq!(file(&c, "std", "msg").unwrap().contents().len(), 16);
        assert!(c.is_in_range("phone", "std"));
        c.tick();
        assert!(!c.is_in_range("phone", "std"));
        assert!(file(&c, "std", "msg").is_none());
    }

    #[test]
    fn teleporting_receiver_keeps_what_arrived_before_teleporting_away() {
        let mut c = Constellation::new();
        c.create_device("desk", DeviceKind::Desktop, deg(179.5));
        c.create_satellite("tele", SatelliteKind::Teleporting, HEIGHT, deg(179.5));
        c.add_file_to_device("desk", "f", &"y".repeat(50)).unwrap();
        c.send_file("f", "desk", "tele").unwrap();

        c.tick();
        let tele = c.satellite("tele").unwrap();
        assert_eq!(tele.position, Angle::ZERO);
        let kept = tele.store.get("f").unwrap();
        assert!(kept.is_completed());
        assert_eq!(kept.contents().len(), 15);
        assert_eq!(kept.size(), 50);
        assert!(c.drain_events().iter().any(|event| matches!(event.kind, EventKind::Teleported { .. })));
    }

    #[test]
    fn relay_bridges_a_device_and_a_distant_satellite() {
        let mut c = Constellation::new();
        c.create_device("phone", DeviceKind::Handheld, deg(0.0));
        c.create_satellite("relay", SatelliteKind::Relay, HEIGHT, deg(0.0));
        c.create_satellite("far", SatelliteKind::Standard, HEIGHT, deg(40.0));

        assert!(c.reachable_from("phone").contains("far"));
        assert!(c.reachable_from("far").contains("phone"));
        assert!(c.is_in_range("phone", "far"));
        assert!(!c.reachable_from("phone").contains("phone"));

        c.add_file_to_device("phone", "note", "hi").unwrap();
        c.send_file("note", "phone", "far").unwrap();
        c.tick();
        assert_eq!(file(&c, "far", "note").unwrap().contents(), "h");
        c.tick();
        assert!(file(&c, "far", "note").unwrap().is_completed());
    }

    #[test]
    fn ticks_are_additive() {
        let build = || {
            let mut c = phone_and_standard("additivity");
            c.create_satellite("tele", SatelliteKind::Teleporting, HEIGHT, deg(175.0));
            c.create_satellite("relay", SatelliteKind::Relay, HEIGHT, deg(150.0));
            c.send_file("msg", "phone", "std").unwrap();
            c
        };
        let mut split = build();
        split.simulate(3);
        split.simulate(4);
        let mut whole = build();
        whole.simulate(7);
        assert_eq!(split.elapsed_ticks(), 7);
        assert_eq!(split.snapshots(), whole.snapshots());
        assert_eq!(split.drain_events(), whole.drain_events());
    }

    #[test]
    fn registry_keeps_ids_unique_across_collections() {
        let mut c = Constellation::new();
        c.create_device("x", DeviceKind::Laptop, deg(10.0));
        c.create_satellite("x", SatelliteKind::Relay, HEIGHT, deg(10.0));
        c.create_device("a", DeviceKind::Laptop, deg(10.0));
        assert_eq!(c.list_device_ids(), vec!["a".to_string()]);
        assert_eq!(c.list_satellite_ids(), vec!["x".to_string()]);
        assert!(c.remove_satellite("x"));
        assert!(!c.remove_satellite("x"));
        assert!(c.snapshot_of("x").is_none());
    }

    #[test]
    fn device_snapshot_reports_ground_radius() {
        let mut c = Constellation::new();
        c.create_device("d", DeviceKind::Desktop, deg(-30.0));
        c.add_file_to_device("d", "f", "abc").unwrap();
        assert_eq!(c.add_file_to_device("d", "f", "again"), Err(TransferError::AlreadyExists("f".into())));
        let snapshot = c.snapshot_of("d").unwrap();
        assert_eq!(snapshot.height, RADIUS_OF_JUPITER);
        assert_eq!(snapshot.position, deg(330.0));
        assert_eq!(snapshot.files["f"].contents, "abc");
    }
}
