use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub course: String,
    pub branch: String,
    pub semester: String,
    pub year: String,
    pub hostel: String,
    pub room: Option<String>,
    pub mobile: String,
    pub password_hash: String,
    pub created_at: String,
}

/// Public view of a student; never carries the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: String,
    pub name: String,
    pub course: String,
    pub branch: String,
    pub semester: String,
    pub year: String,
    pub hostel: String,
    pub room: Option<String>,
    pub mobile: String,
}

impl From<Student> for StudentProfile {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            name: student.name,
            course: student.course,
            branch: student.branch,
            semester: student.semester,
            year: student.year,
            hostel: student.hostel,
            room: student.room,
            mobile: student.mobile,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub id: String,
    pub name: String,
    pub course: String,
    pub branch: String,
    pub semester: String,
    pub year: String,
    pub hostel: String,
    #[serde(default)]
    pub room: Option<String>,
    pub mobile: String,
    pub password: String,
}
