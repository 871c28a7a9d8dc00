use std::path::PathBuf;

use crate::config::Config;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub passing_grade: f64,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            workspace: None,
            db: None,
            passing_grade: config.passing_grade,
        }
    }
}
