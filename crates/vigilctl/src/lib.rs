//! Vigil Control - CLI for the health-event log monitor
//!
//! Four pipeline stages over append-only JSONL logs: window evaluation,
//! heartbeat emission, retention compaction and parity verification.
//! Exposed as a library so the command layer is testable end to end.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod report;
