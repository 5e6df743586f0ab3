use std::{env, net::SocketAddr};

use chrono_tz::Tz;

use crate::error::AppError;

pub const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub cookie_secret: String,
    pub timezone: Tz,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://outings.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-hostel-outings-cookie-secret".to_string());

        let timezone = parse_timezone(
            &env::var("APP_TIMEZONE").unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string()),
        )?;

        Ok(Self {
            database_url,
            listen_addr,
            cookie_secret,
            timezone,
        })
    }

    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            timezone: self.timezone,
        }
    }
}

/// Settings the outing tracker needs; passed in at construction.
#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    /// Zone used for server-clock timestamps and for naive stored values.
    pub timezone: Tz,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Kolkata,
        }
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, AppError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|err| AppError::Config(format!("invalid APP_TIMEZONE {name:?}: {err}")))
}
