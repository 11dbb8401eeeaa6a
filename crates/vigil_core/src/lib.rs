//! Vigil Core - Health-event log engine
//!
//! Append-only JSONL health logs, trailing-window SLO evaluation,
//! idempotent heartbeat emission, tiered retention compaction and
//! raw/compacted parity checks. Every cascade layer (raw history, its
//! digest, the heartbeat stream, the compacted stream) runs through the
//! same components.

pub mod compact;
pub mod config;
pub mod digest;
pub mod entry;
pub mod error;
pub mod heartbeat;
pub mod parity;
pub mod regression;
pub mod store;
pub mod window;

pub use compact::{CompactionPlan, RetentionPolicy, SelectedRow};
pub use config::VigilConfig;
pub use digest::{Digest, WindowDeltas};
pub use entry::{DigestStatus, EntrySummary, HealthEntry, LogRecord, RiskLevel, SyncState};
pub use error::VigilError;
pub use heartbeat::{HeartbeatOutcome, HeartbeatRecord};
pub use parity::ParityResult;
pub use store::EventLogStore;
pub use window::{SloThresholds, WindowEvaluation, WindowSummary};
