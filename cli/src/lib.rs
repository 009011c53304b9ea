//! depot-cli library, exposes modules for unit tests

pub mod commands;
pub mod pending;
pub mod progress;
pub mod prompt;
pub mod render;
