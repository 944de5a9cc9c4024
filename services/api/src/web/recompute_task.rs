//! services/api/src/web/recompute_task.rs
//!
//! Background recompute of a user's daily summary after an event is recorded.

use chrono::NaiveDate;
use reading_streak_core::DailyAggregator;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

/// Spawns the summary and streak recompute for `(user_id, date)`.
///
/// The request that recorded the event does not wait for this task. Running it
/// more than once for the same day leaves the streak unchanged, so overlapping
/// with the batch or a retried request is harmless.
pub fn spawn_daily_recompute(
    aggregator: DailyAggregator,
    user_id: Uuid,
    date: NaiveDate,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match aggregator.summarize(user_id, date).await {
            Ok(outcome) => info!(
                %user_id,
                %date,
                current_streak = outcome.streak.current_streak,
                "Updated daily summary for user"
            ),
            Err(e) => error!(%user_id, %date, "Background recompute failed: {}", e),
        }
    })
}
