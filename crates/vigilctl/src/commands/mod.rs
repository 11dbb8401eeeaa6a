//! Subcommand implementations
//!
//! Each command runs to completion and returns a report plus exit code;
//! unexpected errors are folded into a failure report so the cascade
//! downstream always has something to read.

mod compact;
mod heartbeat;
mod parity;
mod slo;

pub use compact::run as compact;
pub use heartbeat::run as heartbeat;
pub use parity::run as parity;
pub use slo::run as slo;

use crate::cli::Commands;
use crate::report::CommandOutcome;
use vigil_core::VigilConfig;

/// Route one parsed invocation to its implementation
pub fn dispatch(command: &Commands, config: &VigilConfig) -> CommandOutcome {
    match command {
        Commands::Slo(args) => slo(args, config),
        Commands::Heartbeat(args) => heartbeat(args, config),
        Commands::Compact(args) => compact(args, config),
        Commands::Parity(args) => parity(args, config),
    }
}
