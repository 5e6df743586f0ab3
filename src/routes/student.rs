use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};

use crate::{
    auth::CurrentStudent,
    error::AppError,
    models::{
        outing::{Outing, OutingReturn},
        student::StudentProfile,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:sid", get(overview))
        .route("/:sid/outings", get(history).post(start_outing))
        .route("/:sid/return", post(mark_return))
}

#[derive(Serialize)]
struct StudentOverview {
    details: StudentProfile,
    on_outing: bool,
}

async fn overview(
    State(state): State<AppState>,
    current: CurrentStudent,
    Path(sid): Path<String>,
) -> Result<Json<StudentOverview>, AppError> {
    current.require_self(&sid)?;
    let student = state.students.require(&sid).await?;
    let on_outing = state.outings.is_on_outing(&student.id).await?;
    Ok(Json(StudentOverview {
        details: student.into(),
        on_outing,
    }))
}

#[serde_as]
#[derive(Deserialize)]
struct StartOutingForm {
    reason: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    client_time: Option<String>,
}

async fn start_outing(
    State(state): State<AppState>,
    current: CurrentStudent,
    Path(sid): Path<String>,
    Json(form): Json<StartOutingForm>,
) -> Result<(StatusCode, Json<Outing>), AppError> {
    current.require_self(&sid)?;
    state.students.require(&sid).await?;
    let outing = state
        .outings
        .start_outing(&sid, &form.reason, form.client_time.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(outing)))
}

#[serde_as]
#[derive(Deserialize, Default)]
struct ReturnForm {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    client_time: Option<String>,
}

impl ReturnForm {
    /// An empty body means "now". Anything else must be a valid form.
    fn from_body(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|err| AppError::validation(format!("invalid return request: {err}")))
    }
}

async fn mark_return(
    State(state): State<AppState>,
    current: CurrentStudent,
    Path(sid): Path<String>,
    body: Bytes,
) -> Result<Json<OutingReturn>, AppError> {
    current.require_self(&sid)?;
    state.students.require(&sid).await?;
    let form = ReturnForm::from_body(&body)?;
    let receipt = state
        .outings
        .mark_return(&sid, form.client_time.as_deref())
        .await?;
    Ok(Json(receipt))
}

async fn history(
    State(state): State<AppState>,
    current: CurrentStudent,
    Path(sid): Path<String>,
) -> Result<Json<Vec<Outing>>, AppError> {
    current.require_self(&sid)?;
    state.students.require(&sid).await?;
    Ok(Json(state.outings.history(&sid).await?))
}
