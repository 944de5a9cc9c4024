//! crates/reading_streak_core/src/memory.rs
//!
//! An in-process implementation of the store ports, used by the core and API
//! test suites.
//!
//! Streak transactions take a per-user async lock when they read the row and
//! release it on commit, rollback or drop, so transitions for one user are
//! serialized while different users proceed independently. Lock entries are
//! kept for the life of the store.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{calendar_date, DailySummary, ReadingEvent, UserStreak, ValidatedEvent};
use crate::ports::{PortError, PortResult, StreakStore, StreakTransaction};

#[derive(Default)]
struct Tables {
    next_event_id: i64,
    events: Vec<ReadingEvent>,
    summaries: HashMap<(Uuid, NaiveDate), DailySummary>,
    streaks: HashMap<Uuid, UserStreak>,
}

#[derive(Default)]
struct Inner {
    tables: Mutex<Tables>,
    user_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl Inner {
    async fn user_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.user_locks
            .lock()
            .await
            .entry(user_id)
            .or_default()
            .clone()
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored events of a user, in insertion order.
    pub async fn events_for(&self, user_id: Uuid) -> Vec<ReadingEvent> {
        self.inner
            .tables
            .lock()
            .await
            .events
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StreakStore for MemoryStore {
    async fn append_event(&self, user_id: Uuid, event: &ValidatedEvent) -> PortResult<i64> {
        let mut tables = self.inner.tables.lock().await;
        tables.next_event_id += 1;
        let id = tables.next_event_id;
        tables.events.push(ReadingEvent {
            id,
            user_id,
            page_number: event.page_number(),
            surah_name: event.surah_name().to_string(),
            seconds_open: event.seconds_open(),
            created_at: event.created_at(),
        });
        Ok(id)
    }

    async fn sum_seconds(&self, user_id: Uuid, date: NaiveDate) -> PortResult<i64> {
        let tables = self.inner.tables.lock().await;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.user_id == user_id && calendar_date(e.created_at) == date)
            .map(|e| i64::from(e.seconds_open))
            .sum())
    }

    async fn list_users_active_on(&self, date: NaiveDate) -> PortResult<Vec<Uuid>> {
        let tables = self.inner.tables.lock().await;
        let users: BTreeSet<Uuid> = tables
            .events
            .iter()
            .filter(|e| calendar_date(e.created_at) == date)
            .map(|e| e.user_id)
            .collect();
        Ok(users.into_iter().collect())
    }

    async fn upsert_daily_summary(&self, summary: &DailySummary) -> PortResult<()> {
        self.inner
            .tables
            .lock()
            .await
            .summaries
            .insert((summary.user_id, summary.date), summary.clone());
        Ok(())
    }

    async fn get_daily_summary(&self, user_id: Uuid, date: NaiveDate) -> PortResult<DailySummary> {
        self.inner
            .tables
            .lock()
            .await
            .summaries
            .get(&(user_id, date))
            .cloned()
            .ok_or_else(|| {
                PortError::NotFound(format!("Daily summary for {} on {} not found", user_id, date))
            })
    }

    async fn get_streak(&self, user_id: Uuid) -> PortResult<UserStreak> {
        self.inner
            .tables
            .lock()
            .await
            .streaks
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Streak for user {} not found", user_id)))
    }

    async fn begin(&self) -> PortResult<Box<dyn StreakTransaction>> {
        Ok(Box::new(MemoryTransaction {
            inner: self.inner.clone(),
            held: None,
            pending: None,
        }))
    }
}

struct MemoryTransaction {
    inner: Arc<Inner>,
    held: Option<(Uuid, OwnedMutexGuard<()>)>,
    pending: Option<UserStreak>,
}

impl MemoryTransaction {
    fn ensure_holds(&self, user_id: Uuid) -> PortResult<()> {
        match &self.held {
            Some((held, _)) if *held == user_id => Ok(()),
            Some((held, _)) => Err(PortError::Conflict(format!(
                "Transaction holds user {}, not {}",
                held, user_id
            ))),
            None => Err(PortError::Conflict(format!(
                "Streak row of user {} was not locked",
                user_id
            ))),
        }
    }
}

#[async_trait]
impl StreakTransaction for MemoryTransaction {
    async fn lock_streak(&mut self, user_id: Uuid) -> PortResult<Option<UserStreak>> {
        if self.held.is_none() {
            let guard = self.inner.user_lock(user_id).await.lock_owned().await;
            self.held = Some((user_id, guard));
        }
        self.ensure_holds(user_id)?;

        if let Some(pending) = &self.pending {
            return Ok(Some(pending.clone()));
        }
        Ok(self.inner.tables.lock().await.streaks.get(&user_id).cloned())
    }

    async fn upsert_streak(&mut self, streak: &UserStreak) -> PortResult<()> {
        self.ensure_holds(streak.user_id)?;
        self.pending = Some(streak.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        let MemoryTransaction {
            inner,
            held,
            pending,
        } = *self;
        if let Some(streak) = pending {
            inner.tables.lock().await.streaks.insert(streak.user_id, streak);
        }
        drop(held);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> PortResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.lock_streak(user).await.unwrap(), None);
        tx.upsert_streak(&UserStreak::initial(user).advance(day, true))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert!(matches!(
            store.get_streak(user).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn a_transaction_is_bound_to_one_user() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.lock_streak(Uuid::new_v4()).await.unwrap();

        let other = UserStreak::initial(Uuid::new_v4());
        assert!(matches!(
            tx.upsert_streak(&other).await,
            Err(PortError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn lock_is_released_when_the_transaction_is_dropped() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        let mut first = store.begin().await.unwrap();
        first.lock_streak(user).await.unwrap();
        drop(first);

        let mut second = store.begin().await.unwrap();
        let locked = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            second.lock_streak(user),
        )
        .await;
        assert!(locked.is_ok());
    }
}
