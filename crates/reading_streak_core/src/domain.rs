//! crates/reading_streak_core/src/domain.rs
//!
//! Defines the pure, core data structures for reading engagement and streaks.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

/// Events shorter than this are treated as accidental opens and rejected.
pub const MIN_SECONDS_OPEN: i32 = 30;
/// Longer events are clamped down to this value.
pub const MAX_SECONDS_OPEN: i32 = 600;
pub const FIRST_PAGE: i32 = 1;
/// Canonical page count of the reference text.
pub const LAST_PAGE: i32 = 604;
/// Engaged seconds a calendar day needs before it counts towards the streak.
pub const DAILY_THRESHOLD_SECONDS: i64 = 300;

/// A reading event as reported by a client, before validation.
#[derive(Debug, Clone)]
pub struct NewReadingEvent {
    pub page_number: i32,
    pub surah_name: String,
    pub seconds_open: i32,
    /// Caller-supplied timestamp. `None` means "stamp with server time".
    pub created_at: Option<DateTime<Utc>>,
}

/// A reading event that passed validation and is ready to be appended.
///
/// Only the validator can build one, so holding a `ValidatedEvent` means
/// `seconds_open` is within bounds and `page_number` is a real page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEvent {
    pub(crate) page_number: i32,
    pub(crate) surah_name: String,
    pub(crate) seconds_open: i32,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) clamped: bool,
}

impl ValidatedEvent {
    pub fn page_number(&self) -> i32 {
        self.page_number
    }

    pub fn surah_name(&self) -> &str {
        &self.surah_name
    }

    pub fn seconds_open(&self) -> i32 {
        self.seconds_open
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True if the reported duration was above the cap and got clamped.
    pub fn was_clamped(&self) -> bool {
        self.clamped
    }

    /// The server-local calendar day this event counts towards.
    pub fn date(&self) -> NaiveDate {
        calendar_date(self.created_at)
    }
}

/// A persisted reading event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingEvent {
    pub id: i64,
    pub user_id: Uuid,
    pub page_number: i32,
    pub surah_name: String,
    pub seconds_open: i32,
    pub created_at: DateTime<Utc>,
}

/// Total engaged time for one user on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySummary {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub total_seconds: i64,
    pub threshold_met: bool,
}

impl DailySummary {
    /// Builds the summary for a day from its summed engaged seconds.
    pub fn from_total(user_id: Uuid, date: NaiveDate, total_seconds: i64) -> Self {
        Self {
            user_id,
            date,
            total_seconds,
            threshold_met: total_seconds >= DAILY_THRESHOLD_SECONDS,
        }
    }

    pub fn progress(&self) -> SessionProgress {
        SessionProgress::from_total(self.total_seconds)
    }
}

/// The rolling streak record of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStreak {
    pub user_id: Uuid,
    pub current_streak: i32,
    pub longest_streak: i32,
    /// Most recent day on which the threshold was met.
    pub last_active_date: Option<NaiveDate>,
}

/// How far a user is towards today's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub total_seconds: i64,
    /// Whole percent, capped at 100.
    pub percentage_done: u8,
}

impl SessionProgress {
    pub fn from_total(total_seconds: i64) -> Self {
        let percent = (total_seconds.max(0) * 100 / DAILY_THRESHOLD_SECONDS).min(100);
        Self {
            total_seconds,
            percentage_done: percent as u8,
        }
    }
}

/// Returns the server-local calendar day of a timestamp.
pub fn calendar_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

/// Returns the `[start, end)` UTC instants covering a server-local calendar day.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(date);
    let end = date
        .succ_opt()
        .map(local_midnight)
        .unwrap_or_else(|| start + Duration::days(1));
    (start, end)
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    // A DST jump can skip midnight entirely; the day then starts an hour later.
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            Local
                .from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
        })
        .map(|at| at.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}
