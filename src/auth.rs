use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{error::AppError, models::session::Session, state::AppState};

pub const SESSION_COOKIE: &str = "outing_session";

pub fn session_ttl() -> Duration {
    Duration::days(7)
}

#[derive(Debug, Clone)]
pub struct AuthenticatedStudent {
    pub student_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct CurrentStudent(pub Option<AuthenticatedStudent>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentStudent {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::from_headers(&parts.headers, state.cookie_key.clone());

        let Some(token) = session_token(&jar, &parts.headers) else {
            return Ok(Self(None));
        };

        let student = resolve_session(state, &token)
            .await?
            .map(|student_id| AuthenticatedStudent { student_id });
        Ok(Self(student))
    }
}

impl CurrentStudent {
    pub fn require_student(&self) -> Result<&AuthenticatedStudent, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }

    /// Requires the session to belong to `student_id`.
    pub fn require_self(&self, student_id: &str) -> Result<&AuthenticatedStudent, AppError> {
        let student = self.require_student()?;
        if student.student_id == student_id {
            Ok(student)
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Session id from the private cookie, falling back to a bearer token.
pub fn session_token(jar: &PrivateCookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

pub async fn create_session(state: &AppState, student_id: &str) -> Result<String, AppError> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO sessions (id, student_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(&id)
    .bind(student_id)
    .bind(now.to_rfc3339())
    .bind((now + session_ttl()).to_rfc3339())
    .execute(&state.db)
    .await?;
    info!("student {student_id} logged in");
    Ok(id)
}

/// Student id behind a live session. Expired sessions are deleted on sight.
pub async fn resolve_session(state: &AppState, session_id: &str) -> Result<Option<String>, AppError> {
    let session = sqlx::query_as::<_, Session>(
        "SELECT id, student_id, created_at, expires_at FROM sessions WHERE id = ?1",
    )
    .bind(session_id)
    .fetch_optional(&state.db)
    .await?;

    let Some(session) = session else {
        return Ok(None);
    };

    let live = DateTime::parse_from_rfc3339(&session.expires_at)
        .map(|expires| expires > Utc::now())
        .unwrap_or(false);
    if live {
        Ok(Some(session.student_id))
    } else {
        debug!("dropping expired session for student {}", session.student_id);
        destroy_session(state, &session.id).await?;
        Ok(None)
    }
}

pub async fn destroy_session(state: &AppState, session_id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?1")
        .bind(session_id)
        .execute(&state.db)
        .await?;
    Ok(())
}

/// The cookie outlives the browser session and expires with the stored one.
pub fn apply_session_cookie(jar: PrivateCookieJar, session_id: &str) -> PrivateCookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, session_id.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(session_ttl().num_seconds())),
    )
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}
