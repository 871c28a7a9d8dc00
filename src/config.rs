use crate::calc::grades::{is_valid_grade, DEFAULT_PASSING_GRADE};
use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "GRADEBOOKD_WORKSPACE";
pub const LOG_ENV: &str = "GRADEBOOKD_LOG";
pub const PASSING_GRADE_ENV: &str = "GRADEBOOKD_PASSING_GRADE";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Workspace opened at startup, if any.
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
    pub passing_grade: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            log_filter: "info".to_string(),
            passing_grade: DEFAULT_PASSING_GRADE,
        }
    }
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let workspace = lookup(WORKSPACE_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let log_filter = lookup(LOG_ENV)
            .or_else(|| lookup("RUST_LOG"))
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.log_filter);
        let passing_grade = match lookup(PASSING_GRADE_ENV) {
            None => defaults.passing_grade,
            Some(raw) => {
                let v: f64 = raw.trim().parse().map_err(|_| {
                    anyhow::anyhow!("{PASSING_GRADE_ENV} must be a number, got {raw:?}")
                })?;
                anyhow::ensure!(
                    is_valid_grade(v),
                    "{PASSING_GRADE_ENV} must be between 1.0 and 5.0, got {v}"
                );
                v
            }
        };
        Ok(Self {
            workspace,
            log_filter,
            passing_grade,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = Config::from_lookup(lookup(&[])).expect("config");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn reads_workspace_and_filters() {
        let cfg = Config::from_lookup(lookup(&[
            (WORKSPACE_ENV, "/tmp/grades"),
            ("RUST_LOG", "debug"),
            (PASSING_GRADE_ENV, "2.75"),
        ]))
        .expect("config");
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/grades")));
        assert_eq!(cfg.log_filter, "debug");
        assert_eq!(cfg.passing_grade, 2.75);
    }

    #[test]
    fn rejects_out_of_scale_passing_grade() {
        assert!(Config::from_lookup(lookup(&[(PASSING_GRADE_ENV, "6")])).is_err());
        assert!(Config::from_lookup(lookup(&[(PASSING_GRADE_ENV, "abc")])).is_err());
    }
}
