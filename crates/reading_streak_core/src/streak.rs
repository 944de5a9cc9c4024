//! crates/reading_streak_core/src/streak.rs
//!
//! The streak state machine. The state of a user is the tuple
//! `(current_streak, longest_streak, last_active_date)`; each processed day
//! moves it forward through [`UserStreak::advance`], and [`StreakMachine`]
//! applies that step to the persisted row inside a per-user transaction.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::UserStreak;
use crate::ports::{PortError, PortResult, StreakStore, StreakTransaction};

impl UserStreak {
    /// The state of a user that has never been processed.
    pub fn initial(user_id: Uuid) -> Self {
        Self {
            user_id,
            current_streak: 0,
            longest_streak: 0,
            last_active_date: None,
        }
    }

    /// Computes the state after processing `today`.
    ///
    /// A day that misses the threshold leaves the streak alone; a missed day is
    /// only noticed as a gap when the next qualifying day is processed.
    /// Processing the same qualifying day twice is a no-op.
    pub fn advance(&self, today: NaiveDate, threshold_met: bool) -> UserStreak {
        if !threshold_met {
            return UserStreak {
                longest_streak: self.longest_streak.max(self.current_streak),
                ..self.clone()
            };
        }

        let current_streak = match self.last_active_date {
            None => 1,
            Some(last) if Some(last) == today.pred_opt() => self.current_streak.saturating_add(1),
            Some(last) if last == today => self.current_streak,
            // Gap of two or more days, or an out-of-order replay of an older day.
            Some(_) => 1,
        };

        UserStreak {
            user_id: self.user_id,
            current_streak,
            longest_streak: self.longest_streak.max(current_streak),
            last_active_date: Some(today),
        }
    }
}

/// Applies streak transitions against the store. Sole writer of `UserStreak` rows.
#[derive(Clone)]
pub struct StreakMachine {
    store: Arc<dyn StreakStore>,
}

impl StreakMachine {
    pub fn new(store: Arc<dyn StreakStore>) -> Self {
        Self { store }
    }

    /// Moves the user's streak forward by one processed day.
    ///
    /// The read-modify-write runs in one transaction holding the user's row, so
    /// concurrent callers for the same user are serialized. Any failure rolls
    /// the transaction back.
    pub async fn transition(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        threshold_met: bool,
    ) -> PortResult<UserStreak> {
        let mut tx = self.store.begin().await?;

        match apply(&mut *tx, user_id, today, threshold_met).await {
            Ok(next) => {
                tx.commit().await?;
                debug!(
                    %user_id,
                    %today,
                    threshold_met,
                    current = next.current_streak,
                    longest = next.longest_streak,
                    "Streak updated"
                );
                Ok(next)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(%user_id, "Failed to roll back streak transaction: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Returns the user's streak, or the zero state if they have none yet.
    pub async fn get_streak(&self, user_id: Uuid) -> PortResult<UserStreak> {
        match self.store.get_streak(user_id).await {
            Ok(streak) => Ok(streak),
            Err(PortError::NotFound(_)) => Ok(UserStreak::initial(user_id)),
            Err(e) => Err(e),
        }
    }
}

async fn apply(
    tx: &mut dyn StreakTransaction,
    user_id: Uuid,
    today: NaiveDate,
    threshold_met: bool,
) -> PortResult<UserStreak> {
    let current = tx
        .lock_streak(user_id)
        .await?
        .unwrap_or_else(|| UserStreak::initial(user_id));
    let next = current.advance(today, threshold_met);
    tx.upsert_streak(&next).await?;
    Ok(next)
}
