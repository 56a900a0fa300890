//! Control module for driving a headless simulation run.
//!
//! Reads the runner configuration, issues the scene's scheduled transfers
//! tick by tick, and renders the final report.

pub mod config;
pub mod report;
pub mod runner;

pub use config::SimulatorConfig;
