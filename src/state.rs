use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        clock::{Clock, SystemClock},
        outings::OutingTracker,
        store::SqliteOutingStore,
        students::StudentDirectory,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub students: StudentDirectory,
    pub outings: OutingTracker,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> Self {
        Self::with_clock(config, db, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AppConfig, db: DbPool, clock: Arc<dyn Clock>) -> Self {
        let digest = Sha512::digest(config.cookie_secret.as_bytes());
        let cookie_key = Key::from(&digest[..]);
        let outings = OutingTracker::with_clock(
            config.tracker(),
            Arc::new(SqliteOutingStore::new(db.clone())),
            clock,
        );
        Self {
            students: StudentDirectory::new(db.clone()),
            outings,
            config,
            db,
            cookie_key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
