use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    auth,
    error::AppError,
    models::student::{NewStudent, StudentProfile},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_submit))
        .route("/login", post(login_submit))
        .route("/logout", post(logout))
}

#[derive(Deserialize)]
struct RegisterForm {
    #[serde(flatten)]
    student: NewStudent,
    #[serde(default)]
    confirm_password: String,
}

async fn register_submit(
    State(state): State<AppState>,
    Json(form): Json<RegisterForm>,
) -> Result<(StatusCode, Json<StudentProfile>), AppError> {
    if form.student.password != form.confirm_password {
        return Err(AppError::validation("passwords do not match"));
    }
    let profile = state.students.register(form.student).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[derive(Deserialize)]
struct LoginForm {
    sid: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    sid: String,
    token: String,
}

async fn login_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(form): Json<LoginForm>,
) -> Result<(PrivateCookieJar, Json<LoginResponse>), AppError> {
    let student = state
        .students
        .authenticate(&form.sid, &form.password)
        .await?;
    let session_id = auth::create_session(&state, &student.id).await?;
    Ok((
        auth::apply_session_cookie(jar, &session_id),
        Json(LoginResponse {
            sid: student.id,
            token: session_id,
        }),
    ))
}

async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    headers: HeaderMap,
) -> Result<(PrivateCookieJar, StatusCode), AppError> {
    if let Some(token) = auth::session_token(&jar, &headers) {
        auth::destroy_session(&state, &token).await?;
    }
    Ok((auth::clear_session_cookie(jar), StatusCode::NO_CONTENT))
}
