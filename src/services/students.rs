use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use tracing::info;

use crate::{
    db::DbPool,
    error::{is_unique_violation, AppError},
    models::student::{NewStudent, Student, StudentProfile},
};

/// Student records: registration, lookup and credential checks.
#[derive(Clone)]
pub struct StudentDirectory {
    db: DbPool,
}

impl StudentDirectory {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn register(&self, new: NewStudent) -> Result<StudentProfile, AppError> {
        let new = normalize(new)?;
        let password_hash = hash_password(&new.password)?;
        let created_at = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"INSERT INTO students
               (id, name, course, branch, semester, year, hostel, room, mobile, password_hash, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
        )
        .bind(&new.id)
        .bind(&new.name)
        .bind(&new.course)
        .bind(&new.branch)
        .bind(&new.semester)
        .bind(&new.year)
        .bind(&new.hostel)
        .bind(&new.room)
        .bind(&new.mobile)
        .bind(&password_hash)
        .bind(&created_at)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(AppError::Duplicate(format!(
                    "student id '{}' is already registered",
                    new.id
                )));
            }
            Err(err) => return Err(err.into()),
        }

        info!("registered student {}", new.id);
        self.require(&new.id).await.map(StudentProfile::from)
    }

    pub async fn find(&self, id: &str) -> Result<Option<Student>, AppError> {
        let student = sqlx::query_as::<_, Student>(
            r#"SELECT id, name, course, branch, semester, year, hostel, room, mobile,
                      password_hash, created_at
               FROM students WHERE id = ?1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(student)
    }

    pub async fn require(&self, id: &str) -> Result<Student, AppError> {
        self.find(id).await?.ok_or(AppError::NotFound)
    }

    /// Checks a student id / password pair. Unknown ids and wrong passwords
    /// are indistinguishable to the caller.
    pub async fn authenticate(&self, id: &str, password: &str) -> Result<Student, AppError> {
        let student = self.find(id.trim()).await?.ok_or(AppError::Unauthorized)?;
        verify_password(password, &student.password_hash)?;
        Ok(student)
    }
}

fn normalize(mut new: NewStudent) -> Result<NewStudent, AppError> {
    for (label, value) in [
        ("id", &mut new.id),
        ("name", &mut new.name),
        ("course", &mut new.course),
        ("branch", &mut new.branch),
        ("semester", &mut new.semester),
        ("year", &mut new.year),
        ("hostel", &mut new.hostel),
        ("mobile", &mut new.mobile),
    ] {
        *value = value.trim().to_string();
        if value.is_empty() {
            return Err(AppError::validation(format!("{label} is required")));
        }
    }
    new.room = new
        .room
        .map(|room| room.trim().to_string())
        .filter(|room| !room.is_empty());
    if new.password.is_empty() {
        return Err(AppError::validation("password is required"));
    }
    Ok(new)
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Other(anyhow!("password hashing failed: {err}")))
}

fn verify_password(password: &str, stored: &str) -> Result<(), AppError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|err| AppError::Other(anyhow!("stored password hash is unreadable: {err}")))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AppError::Unauthorized)
}
