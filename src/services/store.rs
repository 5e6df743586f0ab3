use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::{
    db::DbPool,
    error::{is_unique_violation, AppError},
    models::outing::OutingRecord,
};

/// Storage handle the outing tracker works through.
///
/// Implementations must refuse a second open row for the same student with
/// [`AppError::AlreadyOnOuting`] and must only ever set `time_in` on a row
/// that is still open.
#[async_trait]
pub trait OutingStore: Send + Sync {
    async fn insert(
        &self,
        student_id: &str,
        reason: &str,
        time_out: &str,
    ) -> Result<OutingRecord, AppError>;

    /// Newest open outing for the student, if any.
    async fn latest_open(&self, student_id: &str) -> Result<Option<OutingRecord>, AppError>;

    /// Sets `time_in` on an open row. Returns false if the row was not open.
    async fn close(&self, outing_id: i64, time_in: &str) -> Result<bool, AppError>;

    async fn has_open(&self, student_id: &str) -> Result<bool, AppError>;

    /// All outings for the student, newest first.
    async fn list(&self, student_id: &str) -> Result<Vec<OutingRecord>, AppError>;
}

#[derive(Clone)]
pub struct SqliteOutingStore {
    db: DbPool,
}

impl SqliteOutingStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OutingStore for SqliteOutingStore {
    async fn insert(
        &self,
        student_id: &str,
        reason: &str,
        time_out: &str,
    ) -> Result<OutingRecord, AppError> {
        sqlx::query_as::<_, OutingRecord>(
            r#"INSERT INTO outings (student_id, reason, time_out) VALUES (?1, ?2, ?3)
               RETURNING id, student_id, reason, time_out, time_in"#,
        )
        .bind(student_id)
        .bind(reason)
        .bind(time_out)
        .fetch_one(&self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::AlreadyOnOuting
            } else {
                AppError::Persistence(err)
            }
        })
    }

    async fn latest_open(&self, student_id: &str) -> Result<Option<OutingRecord>, AppError> {
        let record = sqlx::query_as::<_, OutingRecord>(
            r#"SELECT id, student_id, reason, time_out, time_in FROM outings
               WHERE student_id = ?1 AND time_in IS NULL ORDER BY id DESC LIMIT 1"#,
        )
        .bind(student_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(record)
    }

    async fn close(&self, outing_id: i64, time_in: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE outings SET time_in = ?1 WHERE id = ?2 AND time_in IS NULL")
            .bind(time_in)
            .bind(outing_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn has_open(&self, student_id: &str) -> Result<bool, AppError> {
        let open: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM outings WHERE student_id = ?1 AND time_in IS NULL)",
        )
        .bind(student_id)
        .fetch_one(&self.db)
        .await?;
        Ok(open != 0)
    }

    async fn list(&self, student_id: &str) -> Result<Vec<OutingRecord>, AppError> {
        let records = sqlx::query_as::<_, OutingRecord>(
            r#"SELECT id, student_id, reason, time_out, time_in FROM outings
               WHERE student_id = ?1 ORDER BY id DESC"#,
        )
        .bind(student_id)
        .fetch_all(&self.db)
        .await?;
        Ok(records)
    }
}

/// Process-local store, for embedding and tests.
#[derive(Clone, Default)]
pub struct MemoryOutingStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    rows: Vec<OutingRecord>,
    next_id: i64,
}

impl MemoryOutingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a row as-is, e.g. one carrying a legacy timestamp encoding.
    pub fn seed(&self, record: OutingRecord) {
        let mut state = self.lock();
        state.next_id = state.next_id.max(record.id);
        state.rows.push(record);
    }

    pub fn rows(&self) -> Vec<OutingRecord> {
        self.lock().rows.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl OutingStore for MemoryOutingStore {
    async fn insert(
        &self,
        student_id: &str,
        reason: &str,
        time_out: &str,
    ) -> Result<OutingRecord, AppError> {
        let mut state = self.lock();
        if state
            .rows
            .iter()
            .any(|row| row.student_id == student_id && row.is_open())
        {
            return Err(AppError::AlreadyOnOuting);
        }
        state.next_id += 1;
        let record = OutingRecord {
            id: state.next_id,
            student_id: student_id.to_string(),
            reason: reason.to_string(),
            time_out: time_out.to_string(),
            time_in: None,
        };
        state.rows.push(record.clone());
        Ok(record)
    }

    async fn latest_open(&self, student_id: &str) -> Result<Option<OutingRecord>, AppError> {
        Ok(self
            .lock()
            .rows
            .iter()
            .filter(|row| row.student_id == student_id && row.is_open())
            .max_by_key(|row| row.id)
            .cloned())
    }

    async fn close(&self, outing_id: i64, time_in: &str) -> Result<bool, AppError> {
        let mut state = self.lock();
        match state
            .rows
            .iter_mut()
            .find(|row| row.id == outing_id && row.is_open())
        {
            Some(row) => {
                row.time_in = Some(time_in.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn has_open(&self, student_id: &str) -> Result<bool, AppError> {
        Ok(self
            .lock()
            .rows
            .iter()
            .any(|row| row.student_id == student_id && row.is_open()))
    }

    async fn list(&self, student_id: &str) -> Result<Vec<OutingRecord>, AppError> {
        let mut records: Vec<_> = self
            .lock()
            .rows
            .iter()
            .filter(|row| row.student_id == student_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_refuses_second_open_row() {
        let store = MemoryOutingStore::new();
        store.insert("s1", "library", "2024-01-01 10:00:00").await.unwrap();
        let err = store
            .insert("s1", "market", "2024-01-01 11:00:00")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyOnOuting));
        assert_eq!(store.rows().len(), 1);
    }

    #[tokio::test]
    async fn memory_store_closes_once() {
        let store = MemoryOutingStore::new();
        let row = store.insert("s1", "library", "2024-01-01 10:00:00").await.unwrap();
        assert!(store.close(row.id, "2024-01-01 11:00:00").await.unwrap());
        assert!(!store.close(row.id, "2024-01-01 12:00:00").await.unwrap());
        assert_eq!(
            store.rows()[0].time_in.as_deref(),
            Some("2024-01-01 11:00:00")
        );
    }
}
