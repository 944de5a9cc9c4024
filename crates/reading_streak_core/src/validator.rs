//! crates/reading_streak_core/src/validator.rs
//!
//! Rejects malformed reading events before they reach the event store.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::{
    NewReadingEvent, ValidatedEvent, FIRST_PAGE, LAST_PAGE, MAX_SECONDS_OPEN, MIN_SECONDS_OPEN,
};

/// Why a reading event was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionReason {
    #[error("Reading time of {seconds_open}s is below the {}s minimum", MIN_SECONDS_OPEN)]
    EngagementTooShort { seconds_open: i32 },
    #[error("Page {page_number} is outside {}..={}", FIRST_PAGE, LAST_PAGE)]
    PageOutOfRange { page_number: i32 },
}

impl RejectionReason {
    /// Stable machine-readable code reported to clients.
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::EngagementTooShort { .. } => "ENGAGEMENT_TOO_SHORT",
            RejectionReason::PageOutOfRange { .. } => "PAGE_OUT_OF_RANGE",
        }
    }
}

/// Validates an event, stamping it with the current time if the caller gave none.
pub fn validate(event: NewReadingEvent) -> Result<ValidatedEvent, RejectionReason> {
    validate_at(event, Utc::now())
}

/// Same as [`validate`] with an explicit "now".
pub fn validate_at(
    event: NewReadingEvent,
    now: DateTime<Utc>,
) -> Result<ValidatedEvent, RejectionReason> {
    if event.seconds_open < MIN_SECONDS_OPEN {
        return Err(RejectionReason::EngagementTooShort {
            seconds_open: event.seconds_open,
        });
    }

    if !(FIRST_PAGE..=LAST_PAGE).contains(&event.page_number) {
        return Err(RejectionReason::PageOutOfRange {
            page_number: event.page_number,
        });
    }

    let clamped = event.seconds_open > MAX_SECONDS_OPEN;
    let seconds_open = if clamped {
        warn!(
            reported = event.seconds_open,
            cap = MAX_SECONDS_OPEN,
            page = event.page_number,
            "Clamping reported reading time"
        );
        MAX_SECONDS_OPEN
    } else {
        event.seconds_open
    };

    Ok(ValidatedEvent {
        page_number: event.page_number,
        surah_name: event.surah_name,
        seconds_open,
        created_at: event.created_at.unwrap_or(now),
        clamped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(page_number: i32, seconds_open: i32) -> NewReadingEvent {
        NewReadingEvent {
            page_number,
            surah_name: "Al-Baqarah".to_string(),
            seconds_open,
            created_at: None,
        }
    }

    #[test]
    fn seconds_open_lower_bound() {
        assert_eq!(
            validate(event(10, 29)),
            Err(RejectionReason::EngagementTooShort { seconds_open: 29 })
        );
        let accepted = validate(event(10, 30)).unwrap();
        assert_eq!(accepted.seconds_open(), 30);
        assert!(!accepted.was_clamped());
    }

    #[test]
    fn seconds_open_above_cap_is_clamped_not_rejected() {
        let at_cap = validate(event(10, 600)).unwrap();
        assert_eq!(at_cap.seconds_open(), 600);
        assert!(!at_cap.was_clamped());

        let over = validate(event(10, 601)).unwrap();
        assert_eq!(over.seconds_open(), 600);
        assert!(over.was_clamped());
    }

    #[test]
    fn page_number_bounds() {
        assert_eq!(
            validate(event(0, 60)),
            Err(RejectionReason::PageOutOfRange { page_number: 0 })
        );
        assert_eq!(
            validate(event(605, 60)),
            Err(RejectionReason::PageOutOfRange { page_number: 605 })
        );
        assert_eq!(validate(event(1, 60)).unwrap().page_number(), 1);
        assert_eq!(validate(event(604, 60)).unwrap().page_number(), 604);
    }

    #[test]
    fn short_engagement_is_reported_before_a_bad_page() {
        let err = validate(event(0, 5)).unwrap_err();
        assert_eq!(err.code(), "ENGAGEMENT_TOO_SHORT");
    }

    #[test]
    fn created_at_prefers_caller_time() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();

        let stamped = validate_at(event(3, 45), now).unwrap();
        assert_eq!(stamped.created_at(), now);

        let mut supplied = event(3, 45);
        supplied.created_at = Some(earlier);
        assert_eq!(validate_at(supplied, now).unwrap().created_at(), earlier);
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            RejectionReason::PageOutOfRange { page_number: 700 }.code(),
            "PAGE_OUT_OF_RANGE"
        );
    }
}
