//! Bounded journal of notable simulation events.
//!
//! The orchestrator records transfer lifecycle changes and teleports here so
//! a runner can report them without hooking into the tick loop. The journal
//! keeps the most recent [`EVENT_JOURNAL_CAPACITY`] entries; older ones are
//! dropped silently.

use serde::Serialize;
use std::collections::VecDeque;

use super::angle::Angle;
use super::types::{EntityId, InterruptPolicy};

/// Maximum number of events kept before the oldest are dropped.
pub const EVENT_JOURNAL_CAPACITY: usize = 1000;

/// Something that happened during a tick or a send request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EventKind {
    TransferStarted {
        filename: String,
        source: EntityId,
        destination: EntityId,
        size: usize,
    },
    TransferCompleted {
        filename: String,
        source: EntityId,
        destination: EntityId,
    },
    TransferDiscarded {
        filename: String,
        source: EntityId,
        destination: EntityId,
        delivered: usize,
    },
    TransferForceCompleted {
        filename: String,
        source: EntityId,
        destination: EntityId,
        delivered: usize,
    },
    Teleported {
        satellite: EntityId,
        position: Angle,
    },
}

impl EventKind {
    /// Event describing a transfer resolved after its link dropped.
    pub fn interrupted(policy: InterruptPolicy, filename: String, source: EntityId, destination: EntityId, delivered: usize) -> Self {
        match policy {
            InterruptPolicy::Discard => EventKind::TransferDiscarded {
                filename,
                source,
                destination,
                delivered,
            },
            InterruptPolicy::ForceComplete => EventKind::TransferForceCompleted {
                filename,
                source,
                destination,
                delivered,
            },
        }
    }
}

/// An event stamped with the tick it happened on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationEvent {
    /// Number of ticks completed before the event (0 for the first tick).
    pub tick: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Ring buffer of [`SimulationEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct EventJournal {
    entries: VecDeque<SimulationEvent>,
}

impl EventJournal {
    /// Push an event, popping the oldest if at capacity.
    pub fn push(&mut self, tick: u64, kind: EventKind) {
        if self.entries.len() >= EVENT_JOURNAL_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(SimulationEvent { tick, kind });
    }

    /// Take every buffered event, oldest first.
    pub fn drain(&mut self) -> Vec<SimulationEvent> {
        self.entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
