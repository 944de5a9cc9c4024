//! crates/reading_streak_core/src/aggregator.rs
//!
//! Turns raw reading events into per-day summaries and feeds each summary into
//! the streak state machine.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{DailySummary, NewReadingEvent, SessionProgress, UserStreak};
use crate::error::StreakResult;
use crate::ports::{PortResult, StreakStore};
use crate::streak::StreakMachine;
use crate::validator;

/// Result of recording one reading event on the interactive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub event_id: i64,
    /// Calendar day the event was counted towards.
    pub date: NaiveDate,
    pub progress: SessionProgress,
}

/// Result of summarizing one user-day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyOutcome {
    pub summary: DailySummary,
    pub streak: UserStreak,
}

/// Sole writer of `DailySummary` rows.
#[derive(Clone)]
pub struct DailyAggregator {
    store: Arc<dyn StreakStore>,
    streaks: StreakMachine,
}

impl DailyAggregator {
    pub fn new(store: Arc<dyn StreakStore>) -> Self {
        let streaks = StreakMachine::new(store.clone());
        Self { store, streaks }
    }

    pub fn streaks(&self) -> &StreakMachine {
        &self.streaks
    }

    pub(crate) fn store(&self) -> &Arc<dyn StreakStore> {
        &self.store
    }

    /// Validates and appends an event, then reports progress for its day.
    ///
    /// The summary and streak are not touched here; the caller schedules
    /// [`DailyAggregator::summarize`] for `outcome.date`.
    pub async fn record_event(
        &self,
        user_id: Uuid,
        event: NewReadingEvent,
    ) -> StreakResult<RecordOutcome> {
        let event = validator::validate(event)?;
        let date = event.date();

        let event_id = self.store.append_event(user_id, &event).await?;
        let total_seconds = self.store.sum_seconds(user_id, date).await?;
        debug!(%user_id, event_id, %date, total_seconds, "Reading event recorded");

        Ok(RecordOutcome {
            event_id,
            date,
            progress: SessionProgress::from_total(total_seconds),
        })
    }

    /// Recomputes the summary for `(user_id, date)` from the event store and
    /// runs the streak transition for that day.
    ///
    /// The summary is always rebuilt from the full event set, so calling this
    /// repeatedly is safe. If the sum or the upsert fails, the streak is not touched.
    pub async fn summarize(&self, user_id: Uuid, date: NaiveDate) -> PortResult<DailyOutcome> {
        let total_seconds = self.store.sum_seconds(user_id, date).await?;
        let summary = DailySummary::from_total(user_id, date, total_seconds);
        self.store.upsert_daily_summary(&summary).await?;

        let streak = self
            .streaks
            .transition(user_id, date, summary.threshold_met)
            .await?;

        info!(
            %user_id,
            %date,
            total_seconds,
            threshold_met = summary.threshold_met,
            current_streak = streak.current_streak,
            "Daily summary updated"
        );

        Ok(DailyOutcome { summary, streak })
    }
}
