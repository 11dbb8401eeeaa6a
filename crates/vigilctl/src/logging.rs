//! Invocation audit log for vigilctl
//!
//! One JSONL row per invocation, appended with an XDG fallback chain.
//! Audit failures never change the command's outcome.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;

/// Log entry for each vigilctl invocation
#[derive(Debug, Serialize, Deserialize)]
pub struct CtlLogEntry {
    /// ISO 8601 timestamp
    pub ts: String,

    /// Request ID (UUID)
    pub req_id: String,

    /// Subcommand name
    pub command: String,

    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Exit code
    pub exit_code: i32,

    /// Duration in milliseconds
    pub duration_ms: u64,

    /// Success flag
    pub ok: bool,
}

impl CtlLogEntry {
    /// Discover log file path with fallback chain
    ///
    /// Priority:
    /// 1. $VIGILCTL_LOG_FILE environment variable (explicit override)
    /// 2. $XDG_STATE_HOME/vigil/ctl.jsonl (XDG standard)
    /// 3. ~/.local/state/vigil/ctl.jsonl (XDG fallback)
    fn discover_log_path() -> Option<String> {
        if let Ok(path) = std::env::var("VIGILCTL_LOG_FILE") {
            return Some(path);
        }

        if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
            return Some(format!("{}/vigil/ctl.jsonl", xdg_state));
        }

        if let Ok(home) = std::env::var("HOME") {
            return Some(format!("{}/.local/state/vigil/ctl.jsonl", home));
        }

        None
    }

    /// Write the entry, falling back to stderr on failure.
    /// Stdout stays reserved for the JSON report.
    pub fn write(&self) -> Result<(), std::io::Error> {
        let json = serde_json::to_string(self)?;

        if let Some(path) = Self::discover_log_path() {
            match Self::write_to_file(&json, &path) {
                Ok(()) => return Ok(()),
                Err(_) => {
                    eprintln!("{}", json);
                    return Ok(());
                }
            }
        }

        eprintln!("{}", json);
        Ok(())
    }

    fn write_to_file(json: &str, path: &str) -> Result<(), std::io::Error> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    /// Generate request ID
    pub fn generate_req_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Current timestamp in ISO 8601 format
    pub fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }
}
