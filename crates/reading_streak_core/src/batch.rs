//! crates/reading_streak_core/src/batch.rs
//!
//! End-of-day driver: re-runs the summary and streak pipeline for every user
//! who read on a given date.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tracing::{error, info};

use crate::aggregator::DailyAggregator;
use crate::ports::PortResult;

/// Summary of one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub date: NaiveDate,
    pub processed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct BatchDriver {
    aggregator: DailyAggregator,
    concurrency: usize,
}

impl BatchDriver {
    /// `concurrency` bounds how many users are processed at once (minimum 1).
    pub fn new(aggregator: DailyAggregator, concurrency: usize) -> Self {
        Self {
            aggregator,
            concurrency: concurrency.max(1),
        }
    }

    /// Processes every user with at least one event on `date`.
    ///
    /// Only a failure to enumerate the users is returned as an error. A failing
    /// user is logged and counted, and the run carries on with the others.
    pub async fn run_for_date(&self, date: NaiveDate) -> PortResult<BatchReport> {
        let users = self.aggregator.store().list_users_active_on(date).await?;
        info!(%date, users = users.len(), "Processing daily streaks");

        let results: Vec<_> = stream::iter(users)
            .map(|user_id| {
                let aggregator = self.aggregator.clone();
                async move { (user_id, aggregator.summarize(user_id, date).await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = BatchReport {
            date,
            processed: 0,
            failed: 0,
        };
        for (user_id, result) in results {
            match result {
                Ok(_) => report.processed += 1,
                Err(e) => {
                    error!(%user_id, %date, "Error updating streak: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            %date,
            processed = report.processed,
            failed = report.failed,
            "Daily streak batch finished"
        );
        Ok(report)
    }
}
