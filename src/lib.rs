//! Grade computation and attendance core of a school information system,
//! with a SQLite record store and a JSON-lines IPC surface.

pub mod calc;
pub mod config;
pub mod db;
pub mod error;
pub mod gradebook;
pub mod ipc;
pub mod model;

pub use error::{GradeError, Result};
