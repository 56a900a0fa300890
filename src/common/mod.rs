//! Inputs shared by the runner: scene files and their validation.

pub mod scene;
