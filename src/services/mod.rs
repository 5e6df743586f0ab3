pub mod clock;
pub mod duration;
pub mod outings;
pub mod store;
pub mod students;
