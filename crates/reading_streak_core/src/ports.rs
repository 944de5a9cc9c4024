//! crates/reading_streak_core/src/ports.rs
//!
//! Defines the persistence contracts (traits) the streak core depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete store (PostgreSQL, in-memory, ...).

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{DailySummary, UserStreak, ValidatedEvent};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the underlying store.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Constraint violated: {0}")]
    Conflict(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Store Ports (Traits)
//=========================================================================================

/// A unit of work scoped to the streak row of a single user.
///
/// Dropping a transaction without calling [`StreakTransaction::commit`] discards
/// every write made through it.
#[async_trait]
pub trait StreakTransaction: Send {
    /// Reads the streak row of `user_id` and holds it exclusively until the
    /// transaction ends. Returns `None` for a user that has never been seen.
    async fn lock_streak(&mut self, user_id: Uuid) -> PortResult<Option<UserStreak>>;

    async fn upsert_streak(&mut self, streak: &UserStreak) -> PortResult<()>;

    async fn commit(self: Box<Self>) -> PortResult<()>;

    async fn rollback(self: Box<Self>) -> PortResult<()>;
}

#[async_trait]
pub trait StreakStore: Send + Sync {
    // --- Event Store ---
    /// Appends a validated event and returns the id assigned by the store.
    async fn append_event(&self, user_id: Uuid, event: &ValidatedEvent) -> PortResult<i64>;

    /// Sums `seconds_open` over the user's events on a calendar day; 0 when there are none.
    async fn sum_seconds(&self, user_id: Uuid, date: NaiveDate) -> PortResult<i64>;

    /// Distinct users with at least one event on a calendar day.
    async fn list_users_active_on(&self, date: NaiveDate) -> PortResult<Vec<Uuid>>;

    // --- Daily Summaries ---
    /// Inserts or fully overwrites the summary row for `(user_id, date)`.
    async fn upsert_daily_summary(&self, summary: &DailySummary) -> PortResult<()>;

    async fn get_daily_summary(&self, user_id: Uuid, date: NaiveDate) -> PortResult<DailySummary>;

    // --- Streaks ---
    async fn get_streak(&self, user_id: Uuid) -> PortResult<UserStreak>;

    async fn begin(&self) -> PortResult<Box<dyn StreakTransaction>>;
}
