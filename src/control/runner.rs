//! Headless run loop: builds the constellation from a scene, issues the
//! scheduled transfers, drives the ticks and gathers the final report.

use log::{debug, info, warn};

use super::config::SimulatorConfig;
use super::report::{EventSummary, RejectedTransfer, SimulationReport};
use crate::common::scene::Scene;
use crate::simulation::{Constellation, EventKind, SimulationEvent};

/// Run `ticks` ticks of `scene`.
///
/// Transfers scheduled for tick `t` are requested once `t` ticks have
/// elapsed, so those scheduled exactly at `ticks` are still issued and show
/// up as in-flight placeholders in the report. Later ones are skipped.
///
/// # Parameters
///
/// * `scene` - Validated scene
/// * `ticks` - Number of ticks to simulate
/// * `config` - Runner settings
///
/// # Returns
///
/// The report describing the state after the last tick.
pub fn run(scene: &Scene, ticks: u64, config: &SimulatorConfig) -> SimulationReport {
    let mut constellation = scene.build();
    info!(
        "Loaded {} devices and {} satellites, running {} ticks",
        scene.devices.len(),
        scene.satellites.len(),
        ticks
    );

    let mut summary = EventSummary::default();
    let mut rejected = Vec::new();

    for tick in 0..=ticks {
        for transfer in scene.transfers_at(tick) {
            match constellation.send_file(&transfer.file, &transfer.from, &transfer.to) {
                Ok(()) => debug!("Tick {}: requested {} from {} to {}", tick, transfer.file, transfer.from, transfer.to),
                Err(e) => {
                    warn!("Tick {}: transfer of {} from {} to {} rejected: {}", tick, transfer.file, transfer.from, transfer.to, e);
                    rejected.push(RejectedTransfer {
                        tick,
                        file: transfer.file.clone(),
                        from: transfer.from.clone(),
                        to: transfer.to.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        if tick == ticks {
            break;
        }

        constellation.tick();
        let elapsed = constellation.elapsed_ticks();
        if config.report_interval > 0 && elapsed % config.report_interval == 0 {
            report_positions(&constellation);
        }
        for event in constellation.drain_events() {
            log_event(&event);
            summary.record(&event);
        }
    }
    for event in constellation.drain_events() {
        summary.record(&event);
    }

    let skipped = scene.transfers.iter().filter(|transfer| transfer.tick > ticks).count();
    if skipped > 0 {
        warn!("{} scheduled transfers fall after the last tick and were not issued", skipped);
    }

    info!("Finished after {} ticks", constellation.elapsed_ticks());
    SimulationReport::capture(&constellation, config.print_reachability, summary, rejected)
}

fn log_event(event: &SimulationEvent) {
    match &event.kind {
        EventKind::TransferStarted { .. } => {}
        EventKind::TransferCompleted {
            filename,
            source,
            destination,
        } => info!("Tick {}: {} arrived at {} from {}", event.tick, filename, destination, source),
        EventKind::TransferDiscarded {
            filename,
            source,
            destination,
            delivered,
        } => info!("Tick {}: {} lost the link to {}, dropped {} after {} bytes", event.tick, destination, source, filename, delivered),
        EventKind::TransferForceCompleted {
            filename,
            source,
            destination,
            delivered,
        } => info!("Tick {}: {} lost the link to {}, kept {} bytes of {}", event.tick, destination, source, delivered, filename),
        EventKind::Teleported { satellite, position } => info!("Tick {}: {} teleported to {}", event.tick, satellite, position),
    }
}

fn report_positions(constellation: &Constellation) {
    info!("Positions after {} ticks:", constellation.elapsed_ticks());
    for snapshot in constellation.snapshots() {
        info!("  {} ({}) at {}", snapshot.id, snapshot.kind, snapshot.position);
    }
}
