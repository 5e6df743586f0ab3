use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::TrackerConfig,
    error::AppError,
    models::outing::{Outing, OutingRecord, OutingReturn},
    services::{
        clock::Clock,
        duration::{clamped_elapsed, format_elapsed},
        store::OutingStore,
    },
    timestamp::{self, Timestamp},
};

/// Owns the outing lifecycle: one open outing per student, closed exactly once.
///
/// State transitions for a student run one at a time; the store's own
/// uniqueness guard backs this up across processes.
#[derive(Clone)]
pub struct OutingTracker {
    config: TrackerConfig,
    store: Arc<dyn OutingStore>,
    clock: Arc<dyn Clock>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl OutingTracker {
    pub fn with_clock(
        config: TrackerConfig,
        store: Arc<dyn OutingStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            clock,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Opens an outing. The student must exist; callers check that.
    pub async fn start_outing(
        &self,
        student_id: &str,
        reason: &str,
        client_time: Option<&str>,
    ) -> Result<Outing, AppError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::validation("a reason is required to start an outing"));
        }
        let time_out = self.resolve_time(client_time)?;

        let lock = self.student_lock(student_id);
        let opened = {
            let _guard = lock.lock().await;
            self.open_locked(student_id, reason, time_out).await
        };
        self.release_lock(student_id, lock);
        opened
    }

    async fn open_locked(
        &self,
        student_id: &str,
        reason: &str,
        time_out: Timestamp,
    ) -> Result<Outing, AppError> {
        if self.store.has_open(student_id).await? {
            warn!("student {student_id} tried to start a second outing");
            return Err(AppError::AlreadyOnOuting);
        }

        let record = self
            .store
            .insert(student_id, reason, &timestamp::to_storage(&time_out))
            .await?;
        info!("student {student_id} started outing {} at {time_out}", record.id);
        self.hydrate(record)
    }

    /// Closes the newest open outing and reports how long it lasted.
    ///
    /// With nothing open this fails with [`AppError::NoOpenOuting`] and
    /// writes nothing.
    pub async fn mark_return(
        &self,
        student_id: &str,
        client_time: Option<&str>,
    ) -> Result<OutingReturn, AppError> {
        let time_in = self.resolve_time(client_time)?;

        let lock = self.student_lock(student_id);
        let closed = {
            let _guard = lock.lock().await;
            self.close_locked(student_id, time_in).await
        };
        self.release_lock(student_id, lock);
        closed
    }

    async fn close_locked(
        &self,
        student_id: &str,
        time_in: Timestamp,
    ) -> Result<OutingReturn, AppError> {
        let Some(record) = self.store.latest_open(student_id).await? else {
            debug!("student {student_id} has no open outing to return from");
            return Err(AppError::NoOpenOuting);
        };

        let time_out = timestamp::parse_timestamp(&record.time_out, self.config.timezone)?;
        let elapsed = clamped_elapsed(&time_out, &time_in);

        if !self
            .store
            .close(record.id, &timestamp::to_storage(&time_in))
            .await?
        {
            return Err(AppError::NoOpenOuting);
        }

        let duration = format_elapsed(elapsed);
        info!(
            "student {student_id} returned from outing {} after {duration}",
            record.id
        );

        Ok(OutingReturn {
            time_in,
            duration: duration.clone(),
            outing: Outing {
                id: record.id,
                student_id: record.student_id,
                reason: record.reason,
                time_out,
                time_in: Some(time_in),
                duration: Some(duration),
            },
        })
    }

    pub async fn is_on_outing(&self, student_id: &str) -> Result<bool, AppError> {
        self.store.has_open(student_id).await
    }

    /// Every outing of the student, newest first, the open one included.
    pub async fn history(&self, student_id: &str) -> Result<Vec<Outing>, AppError> {
        self.store
            .list(student_id)
            .await?
            .into_iter()
            .map(|record| self.hydrate(record))
            .collect()
    }

    fn resolve_time(&self, client_time: Option<&str>) -> Result<Timestamp, AppError> {
        match client_time {
            Some(text) => timestamp::parse_client_time(text, self.config.timezone),
            None => Ok(timestamp::now_in(self.clock.now(), self.config.timezone)),
        }
    }

    fn hydrate(&self, record: OutingRecord) -> Result<Outing, AppError> {
        let tz = self.config.timezone;
        let time_out = timestamp::parse_timestamp(&record.time_out, tz)?;
        let time_in = record
            .time_in
            .as_deref()
            .map(|raw| timestamp::parse_timestamp(raw, tz))
            .transpose()?;
        let duration = time_in.map(|back| format_elapsed(clamped_elapsed(&time_out, &back)));

        Ok(Outing {
            id: record.id,
            student_id: record.student_id,
            reason: record.reason,
            time_out,
            time_in,
            duration,
        })
    }

    fn student_lock(&self, student_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(&self.locks.entry(student_id.to_string()).or_default())
    }

    /// Drops the table entry once no other caller holds or awaits the lock.
    fn release_lock(&self, student_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(student_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
