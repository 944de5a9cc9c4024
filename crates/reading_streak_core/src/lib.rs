pub mod aggregator;
pub mod batch;
pub mod domain;
pub mod error;
pub mod memory;
pub mod ports;
pub mod streak;
pub mod validator;

pub use aggregator::{DailyAggregator, DailyOutcome, RecordOutcome};
pub use batch::{BatchDriver, BatchReport};
pub use domain::{
    DailySummary, NewReadingEvent, ReadingEvent, SessionProgress, UserStreak, ValidatedEvent,
};
pub use error::{StreakError, StreakResult};
pub use memory::MemoryStore;
pub use ports::{PortError, PortResult, StreakStore, StreakTransaction};
pub use streak::StreakMachine;
pub use validator::{validate, RejectionReason};
