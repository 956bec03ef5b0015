//! # Debate Feature
//!
//! Runs turn-based debates between a human and the model inside a Discord
//! thread: per-thread session state, turn locking, streamed replies with
//! throttled message edits, concession detection, and idle session sweep.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 1.2.0: Per-debate prompt template overrides
//! - 1.1.0: Win counters and bot self-concession detection
//! - 1.0.0: Initial implementation with threaded debates

pub mod aggregator;
pub mod orchestrator;
pub mod output;
pub mod registry;
pub mod session;

use thiserror::Error;

use output::OutputError;

pub use aggregator::{StreamAggregator, StreamUpdate, DEBOUNCE_INTERVAL};
pub use orchestrator::{DebateOrchestrator, CONTEXT_WINDOW};
pub use output::{DiscordOutput, ThreadOutput};
pub use registry::{SessionRegistry, IDLE_THRESHOLD, SWEEP_INTERVAL};
pub use session::{DebateSession, Speaker};

/// Errors surfaced to the debate-start caller
#[derive(Debug, Error)]
pub enum DebateError {
    #[error("a debate is already running in thread {0}")]
    AlreadyExists(u64),
    #[error("debates can only be started in a text channel")]
    UnsupportedContext,
    #[error(transparent)]
    Output(OutputError),
}

impl DebateError {
    /// Map a setup-phase output failure onto the caller-facing taxonomy
    pub(crate) fn from_output(error: OutputError) -> Self {
        match error {
            OutputError::UnsupportedContext => DebateError::UnsupportedContext,
            other => DebateError::Output(other),
        }
    }
}
