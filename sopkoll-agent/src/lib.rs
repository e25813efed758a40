//! Background offline-cache and reminder agent.
//!
//! The agent lives on its own tasks, independent of the frontend's screens:
//! it owns the versioned response cache, applies the network-first/
//! cache-fallback fetch policy, and runs the recurring reminder check once
//! armed. It never panics and never surfaces errors to a user — it has no
//! UI to report to.

/// Agent lifecycle: activation, install, inbox, and the reminder timer.
pub mod agent;
/// Versioned, file-backed response cache bucket.
pub mod bucket;
/// Notification surface abstraction.
pub mod notify;
/// Network-first fetch policy with cache fallback.
pub mod policy;
/// Recurring reminder check with per-slot dedup.
pub mod reminder;

pub use agent::*;
pub use bucket::*;
pub use notify::*;
pub use policy::*;

#[derive(thiserror::Error, Debug)]
/// Errors internal to the agent. Swallowed-and-logged at the task boundary.
pub enum AgentError {
    /// Reading or writing a cache bucket failed.
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Encoding cache contents failed.
    #[error("Cache encode error: {0}")]
    Encode(#[from] serde_json::Error),
}
