pub mod assessments;
pub mod attendance;
pub mod core;
pub mod grades;
pub mod reports;
pub mod roster;
pub mod scores;
