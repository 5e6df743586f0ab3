pub mod outing;
pub mod session;
pub mod student;
