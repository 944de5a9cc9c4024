//! crates/reading_streak_core/src/error.rs

use crate::ports::PortError;
use crate::validator::RejectionReason;

/// Errors returned by the core streak operations.
#[derive(Debug, thiserror::Error)]
pub enum StreakError {
    /// The event was refused before reaching the store. Never retried.
    #[error("Validation error: {0}")]
    Validation(#[from] RejectionReason),

    /// The store failed; nothing past the failing step was written.
    #[error("Persistence error: {0}")]
    Port(#[from] PortError),
}

pub type StreakResult<T> = Result<T, StreakError>;
