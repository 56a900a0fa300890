//! File transfer state machine.
//!
//! A transfer goes through three stages:
//! - [`prepare`] validates a request against read-only borrows of both ends
//!   and their surroundings, producing a [`QueuedTransfer`] without touching
//!   any state,
//! - [`FileStore::admit`] installs the placeholder file and the in-flight
//!   descriptor on the receiver,
//! - [`FileStore::advance_inbound`] delivers one tick worth of characters,
//!   and [`FileStore::interrupt_inbound`] resolves a lost link per the
//!   receiver's policy.

use std::fmt;
use thiserror::Error;

use super::reachability::{Entity, EntityView, compatible};
use super::types::{Bandwidth, EntityId, File, FileStore, InboundTransfer, InterruptPolicy, StorageLimit};

/// Which storage rule a receiver would break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageShortfall {
    MaxFilesReached,
    MaxStorageReached,
}

impl fmt::Display for StorageShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageShortfall::MaxFilesReached => write!(f, "Max Files Reached"),
            StorageShortfall::MaxStorageReached => write!(f, "Max Storage Reached"),
        }
    }
}

/// Reasons a transfer request is refused. Refusal never changes any state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("no device or satellite with id {0}")]
    UnknownEntity(EntityId),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("no bandwidth available on {0}")]
    NoBandwidth(EntityId),
    #[error("file already exists: {0}")]
    AlreadyExists(String),
    #[error("no storage space: {0}")]
    NoStorageSpace(StorageShortfall),
    #[error("{0} and {1} are not in range")]
    OutOfRange(EntityId, EntityId),
}

/// A validated transfer, ready to be admitted by the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTransfer {
    pub filename: String,
    pub source: EntityId,
    pub destination: EntityId,
    /// Full contents of the source file at the time of the request.
    pub contents: String,
    /// Declared size of the source file.
    pub size: usize,
    /// Effective rate: the tighter of the sender's and the receiver's.
    pub rate: Bandwidth,
    /// The source is a satellite and must be flagged as busy sending.
    pub marks_sender: bool,
}

/// Validate a request to copy `filename` from `source` to `destination`.
///
/// Runs [`check_request`] first, then refuses pairs that cannot exchange
/// files at all (two devices, or a device the satellite does not support)
/// and pairs that are not mutually reachable in `view` right now.
///
/// # Returns
///
/// The transfer to admit, or the first rule it broke.
pub fn prepare(
    view: EntityView<'_>,
    filename: &str,
    source: Entity<'_>,
    destination: Entity<'_>,
) -> Result<QueuedTransfer, TransferError> {
    let queued = check_request(filename, source, destination)?;
    if !compatible(source, destination) || !view.in_range(source.id(), destination.id()) {
        return Err(TransferError::OutOfRange(source.id().to_string(), destination.id().to_string()));
    }
    Ok(queued)
}

/// File and storage rules of a request, independent of where both ends are.
///
/// Checks run in a fixed order and the first failure wins:
/// 1. the source holds a complete file of that name (a file the source is
///    still receiving counts as missing),
/// 2. a satellite source is not already sending,
/// 3. the destination has no other transfer coming in,
/// 4. the destination does not hold that filename yet,
/// 5. the destination's storage rule allows the extra file.
pub fn check_request(filename: &str, source: Entity<'_>, destination: Entity<'_>) -> Result<QueuedTransfer, TransferError> {
    let file = source
        .store()
        .get(filename)
        .filter(|file| file.is_completed())
        .ok_or_else(|| TransferError::NotFound(filename.to_string()))?;

    let marks_sender = matches!(source, Entity::Satellite(_));
    if marks_sender && source.store().is_sending() {
        return Err(TransferError::NoBandwidth(source.id().to_string()));
    }

    let target = destination.store();
    // A busy receiver that already holds the name reports the clash instead
    if target.is_receiving() && !target.contains(filename) {
        return Err(TransferError::NoBandwidth(destination.id().to_string()));
    }
    if target.contains(filename) {
        return Err(TransferError::AlreadyExists(filename.to_string()));
    }
    if let Some(limit) = destination.storage() {
        check_storage(target, limit, file.size()).map_err(TransferError::NoStorageSpace)?;
    }

    Ok(QueuedTransfer {
        filename: filename.to_string(),
        source: source.id().to_string(),
        destination: destination.id().to_string(),
        contents: file.contents().to_string(),
        size: file.size(),
        rate: source.send_rate().min(destination.receive_rate()),
        marks_sender,
    })
}

/// Apply a storage rule to a store about to receive `incoming` more bytes.
pub fn check_storage(store: &FileStore, limit: StorageLimit, incoming: usize) -> Result<(), StorageShortfall> {
    if let Some(max_files) = limit.max_files {
        if store.len() >= max_files {
            return Err(StorageShortfall::MaxFilesReached);
        }
    }
    if store.total_size() + incoming > limit.max_bytes {
        return Err(StorageShortfall::MaxStorageReached);
    }
    Ok(())
}

/// Outcome of advancing a receiver by one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Nothing in flight.
    Idle,
    Delivering { delivered: usize, size: usize },
    Completed { filename: String, source: EntityId },
}

/// Outcome of resolving a transfer whose link was lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interruption {
    pub filename: String,
    pub source: EntityId,
    /// Characters delivered before the link dropped.
    pub delivered: usize,
    pub policy: InterruptPolicy,
}

impl FileStore {
    /// Install a validated transfer: an empty placeholder of the full size
    /// plus the in-flight descriptor.
    pub(crate) fn admit(&mut self, queued: QueuedTransfer) {
        debug_assert!(self.inbound.is_none(), "second inbound transfer admitted");
        self.insert(File::placeholder(queued.filename.clone(), queued.size));
        self.inbound = Some(InboundTransfer {
            filename: queued.filename,
            source: queued.source,
            contents: queued.contents,
            size: queued.size,
            rate: queued.rate,
            delivered: 0,
        });
    }

    /// Deliver up to one tick's quota of characters into the placeholder.
    ///
    /// The offset moves by the full quota even if the captured contents run
    /// short (a force-completed file resent), so every transfer finishes in
    /// `ceil(size / rate)` ticks and never overshoots its declared size.
    pub(crate) fn advance_inbound(&mut self) -> Progress {
        let Some(inbound) = self.inbound.as_mut() else {
            return Progress::Idle;
        };

        let remaining = inbound.size.saturating_sub(inbound.delivered);
        let quota = match inbound.rate {
            Bandwidth::Limited(rate) => rate.min(remaining),
            Bandwidth::Unlimited => remaining,
        };
        let chunk: String = inbound.contents.chars().skip(inbound.delivered).take(quota).collect();
        inbound.delivered += quota;

        let mut file = self.files.get_mut(&inbound.filename);
        if let Some(file) = file.as_deref_mut() {
            file.append(&chunk);
        }
        if inbound.delivered < inbound.size {
            return Progress::Delivering {
                delivered: inbound.delivered,
                size: inbound.size,
            };
        }

        if let Some(file) = file {
            file.mark_completed();
        }
        match self.inbound.take() {
            Some(done) => Progress::Completed {
                filename: done.filename,
                source: done.source,
            },
            None => Progress::Idle,
        }
    }

    /// Resolve the in-flight transfer after its link was lost.
    ///
    /// [`InterruptPolicy::Discard`] removes the partial file;
    /// [`InterruptPolicy::ForceComplete`] keeps the characters delivered so
    /// far and marks the file complete while its declared size stays put.
    pub(crate) fn interrupt_inbound(&mut self, policy: InterruptPolicy) -> Option<Interruption> {
        let inbound = self.inbound.take()?;
        match policy {
            InterruptPolicy::Discard => {
                self.files.remove(&inbound.filename);
            }
            InterruptPolicy::ForceComplete => {
                if let Some(file) = self.files.get_mut(&inbound.filename) {
                    file.mark_completed();
                }
            }
        }
        Some(Interruption {
            filename: inbound.filename,
            source: inbound.source,
            delivered: inbound.delivered,
            policy,
        })
    }
}
