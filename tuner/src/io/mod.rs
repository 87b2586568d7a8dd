//! I/O adapters for tuner commands.

pub mod config;
pub mod document;
pub mod interrupt;
pub mod metrics;
pub mod process;
