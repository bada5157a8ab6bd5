//! Core domain types for taskpilot.

pub mod brief;
pub mod config;
pub mod history;
pub mod interpreter;
pub mod lifecycle;
pub mod schedule;
pub mod store;
pub mod task;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
