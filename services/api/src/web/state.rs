//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use reading_streak_core::{BatchDriver, DailyAggregator, StreakMachine, StreakStore};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: DailyAggregator,
    pub streaks: StreakMachine,
    pub batch: BatchDriver,
}

impl AppState {
    /// Wires the core services around a single store. The aggregator, the streak
    /// machine and the batch driver all share it.
    pub fn new(store: Arc<dyn StreakStore>, config: &Config) -> Self {
        let aggregator = DailyAggregator::new(store);
        let streaks = aggregator.streaks().clone();
        let batch = BatchDriver::new(aggregator.clone(), config.batch_concurrency);
        Self {
            aggregator,
            streaks,
            batch,
        }
    }
}
