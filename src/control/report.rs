//! Final JSON report of a simulation run.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::simulation::types::EntityId;
use crate::simulation::{Constellation, EntitySnapshot, EventKind, SimulationEvent};

/// Number of events of each kind seen during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventSummary {
    pub transfers_started: u64,
    pub transfers_completed: u64,
    pub transfers_discarded: u64,
    pub transfers_force_completed: u64,
    pub teleports: u64,
}

impl EventSummary {
    pub fn record(&mut self, event: &SimulationEvent) {
        let counter = match event.kind {
            EventKind::TransferStarted { .. } => &mut self.transfers_started,
            EventKind::TransferCompleted { .. } => &mut self.transfers_completed,
            EventKind::TransferDiscarded { .. } => &mut self.transfers_discarded,
            EventKind::TransferForceCompleted { .. } => &mut self.transfers_force_completed,
            EventKind::Teleported { .. } => &mut self.teleports,
        };
        *counter += 1;
    }
}

/// A scheduled transfer refused by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedTransfer {
    pub tick: u64,
    pub file: String,
    pub from: EntityId,
    pub to: EntityId,
    pub reason: String,
}

/// Everything printed at the end of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimulationReport {
    pub elapsed_ticks: u64,
    pub entities: Vec<EntitySnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachability: Option<BTreeMap<EntityId, BTreeSet<EntityId>>>,
    pub events: EventSummary,
    pub rejected_transfers: Vec<RejectedTransfer>,
}

impl SimulationReport {
    /// Capture the current state of `constellation`.
    ///
    /// # Parameters
    ///
    /// * `constellation` - World to report on
    /// * `include_reachability` - Compute each entity's reachable set as well
    /// * `events` - Counters gathered while running
    /// * `rejected_transfers` - Scheduled transfers that failed validation
    pub fn capture(
        constellation: &Constellation,
        include_reachability: bool,
        events: EventSummary,
        rejected_transfers: Vec<RejectedTransfer>,
    ) -> Self {
        let reachability = include_reachability.then(|| {
            constellation
                .list_device_ids()
                .into_iter()
                .chain(constellation.list_satellite_ids())
                .map(|id| {
                    let reachable = constellation.reachable_from(&id);
                    (id, reachable)
                })
                .collect()
        });
        Self {
            elapsed_ticks: constellation.elapsed_ticks(),
            entities: constellation.snapshots(),
            reachability,
            events,
            rejected_transfers,
        }
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty { serde_json::to_string_pretty(self) } else { serde_json::to_string(self) }
    }
}
