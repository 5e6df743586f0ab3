use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub student_id: String,
    pub created_at: String,
    pub expires_at: String,
}
