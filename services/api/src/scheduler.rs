//! services/api/src/scheduler.rs
//!
//! Periodic driver for the daily streak batch.

use chrono::{Local, NaiveDate};
use reading_streak_core::BatchDriver;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Spawns a task that runs the batch for the current server-local date every
/// `interval`, until `shutdown` is cancelled.
///
/// The first run happens one full interval after start-up. The first tick after
/// midnight also re-runs the previous tick's date, so activity recorded after
/// that day's last run still reaches the streaks.
pub fn spawn_daily_batch(
    batch: BatchDriver,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_run: Option<NaiveDate> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Daily streak scheduler stopped.");
                    return;
                }
                _ = ticker.tick() => {
                    let today = Local::now().date_naive();
                    for date in dates_to_process(last_run, today) {
                        info!("Processing daily streaks for {}", date);
                        if let Err(e) = batch.run_for_date(date).await {
                            error!("Error processing daily streaks for {}: {}", date, e);
                        }
                    }
                    last_run = Some(today);
                }
            }
        }
    })
}

/// Dates a tick should process, oldest first: the previous tick's date when the
/// day has rolled over since, then `today`.
fn dates_to_process(last_run: Option<NaiveDate>, today: NaiveDate) -> Vec<NaiveDate> {
    match last_run {
        Some(previous) if previous < today => vec![previous, today],
        _ => vec![today],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reading_streak_core::{DailyAggregator, MemoryStore, NewReadingEvent, StreakStore};
    use std::sync::Arc;
    use uuid::Uuid;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, n).unwrap()
    }

    #[test]
    fn first_tick_processes_only_today() {
        assert_eq!(dates_to_process(None, day(3)), vec![day(3)]);
    }

    #[test]
    fn same_day_tick_does_not_repeat_earlier_dates() {
        assert_eq!(dates_to_process(Some(day(3)), day(3)), vec![day(3)]);
    }

    #[test]
    fn tick_after_midnight_also_finishes_the_previous_day() {
        assert_eq!(dates_to_process(Some(day(3)), day(4)), vec![day(3), day(4)]);
        // After a long pause only the last run date is caught up.
        assert_eq!(dates_to_process(Some(day(1)), day(4)), vec![day(1), day(4)]);
    }

    #[test]
    fn clock_moving_backwards_processes_only_today() {
        assert_eq!(dates_to_process(Some(day(4)), day(3)), vec![day(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_the_batch_on_each_tick_until_cancelled() {
        let store = Arc::new(MemoryStore::new());
        let aggregator = DailyAggregator::new(store.clone());
        let user = Uuid::new_v4();
        aggregator
            .record_event(
                user,
                NewReadingEvent {
                    page_number: 1,
                    surah_name: "Al-Fatihah".to_string(),
                    seconds_open: 400,
                    created_at: None,
                },
            )
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let handle = spawn_daily_batch(
            BatchDriver::new(aggregator, 1),
            Duration::from_secs(60),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_secs(61)).await;
        let streak = store.get_streak(user).await.unwrap();
        assert_eq!(streak.current_streak, 1);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
