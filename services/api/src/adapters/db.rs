//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `StreakStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::NaiveDate;
use reading_streak_core::domain::{day_bounds, DailySummary, UserStreak, ValidatedEvent};
use reading_streak_core::ports::{PortError, PortResult, StreakStore, StreakTransaction};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `StreakStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a `sqlx` failure onto the port's error taxonomy.
fn port_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            PortError::Unavailable(e.to_string())
        }
        sqlx::Error::Database(db)
            if db.is_unique_violation() || db.is_check_violation() || db.is_foreign_key_violation() =>
        {
            PortError::Conflict(e.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DailySummaryRecord {
    user_id: Uuid,
    date: NaiveDate,
    total_seconds: i64,
    threshold_met: bool,
}
impl DailySummaryRecord {
    fn to_domain(self) -> DailySummary {
        DailySummary {
            user_id: self.user_id,
            date: self.date,
            total_seconds: self.total_seconds,
            threshold_met: self.threshold_met,
        }
    }
}

#[derive(FromRow)]
struct StreakRecord {
    user_id: Uuid,
    current_streak: i32,
    longest_streak: i32,
    last_active_date: Option<NaiveDate>,
}
impl StreakRecord {
    fn to_domain(self) -> UserStreak {
        UserStreak {
            user_id: self.user_id,
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            last_active_date: self.last_active_date,
        }
    }
}

//=========================================================================================
// `StreakStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl StreakStore for DbAdapter {
    async fn append_event(&self, user_id: Uuid, event: &ValidatedEvent) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO reading_events (user_id, page_number, surah_name, seconds_open, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(user_id)
        .bind(event.page_number())
        .bind(event.surah_name())
        .bind(event.seconds_open())
        .bind(event.created_at())
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)
    }

    async fn sum_seconds(&self, user_id: Uuid, date: NaiveDate) -> PortResult<i64> {
        let (start, end) = day_bounds(date);
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(seconds_open), 0)::BIGINT FROM reading_events \
             WHERE user_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)
    }

    async fn list_users_active_on(&self, date: NaiveDate) -> PortResult<Vec<Uuid>> {
        let (start, end) = day_bounds(date);
        sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT user_id FROM reading_events WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)
    }

    async fn upsert_daily_summary(&self, summary: &DailySummary) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO daily_summaries (user_id, date, total_seconds, threshold_met) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, date) DO UPDATE SET \
             total_seconds = EXCLUDED.total_seconds, \
             threshold_met = EXCLUDED.threshold_met, \
             updated_at = NOW()",
        )
        .bind(summary.user_id)
        .bind(summary.date)
        .bind(summary.total_seconds)
        .bind(summary.threshold_met)
        .execute(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(())
    }

    async fn get_daily_summary(&self, user_id: Uuid, date: NaiveDate) -> PortResult<DailySummary> {
        let record = sqlx::query_as::<_, DailySummaryRecord>(
            "SELECT user_id, date, total_seconds, threshold_met FROM daily_summaries \
             WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!(
                "Daily summary for {} on {} not found",
                user_id, date
            )),
            _ => port_error(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_streak(&self, user_id: Uuid) -> PortResult<UserStreak> {
        let record = sqlx::query_as::<_, StreakRecord>(
            "SELECT user_id, current_streak, longest_streak, last_active_date \
             FROM user_streaks WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Streak for user {} not found", user_id))
            }
            _ => port_error(e),
        })?;
        Ok(record.to_domain())
    }

    async fn begin(&self) -> PortResult<Box<dyn StreakTransaction>> {
        let tx = self.pool.begin().await.map_err(port_error)?;
        Ok(Box::new(PgStreakTransaction { tx }))
    }
}

//=========================================================================================
// Row-locked Streak Transaction
//=========================================================================================

/// A streak transaction backed by a PostgreSQL transaction.
///
/// The user's row is created if missing and then held with `FOR UPDATE`, so a
/// second transaction for the same user blocks until this one ends. Dropping it
/// without committing rolls back.
struct PgStreakTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StreakTransaction for PgStreakTransaction {
    async fn lock_streak(&mut self, user_id: Uuid) -> PortResult<Option<UserStreak>> {
        // A brand new user has no row to lock yet.
        sqlx::query("INSERT INTO user_streaks (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(port_error)?;

        let record = sqlx::query_as::<_, StreakRecord>(
            "SELECT user_id, current_streak, longest_streak, last_active_date \
             FROM user_streaks WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(port_error)?;

        Ok(record.map(StreakRecord::to_domain))
    }

    async fn upsert_streak(&mut self, streak: &UserStreak) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO user_streaks (user_id, current_streak, longest_streak, last_active_date) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id) DO UPDATE SET \
             current_streak = EXCLUDED.current_streak, \
             longest_streak = EXCLUDED.longest_streak, \
             last_active_date = EXCLUDED.last_active_date, \
             updated_at = NOW()",
        )
        .bind(streak.user_id)
        .bind(streak.current_streak)
        .bind(streak.longest_streak)
        .bind(streak.last_active_date)
        .execute(&mut *self.tx)
        .await
        .map_err(port_error)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        self.tx.commit().await.map_err(port_error)
    }

    async fn rollback(self: Box<Self>) -> PortResult<()> {
        self.tx.rollback().await.map_err(port_error)
    }
}
