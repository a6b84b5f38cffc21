//! Runtime settings loaded from the environment (and `.env`).

use std::path::PathBuf;

use crate::error::{AppError, ErrorKind};

pub const DEFAULT_DATA_ROOT: &str = "data/actinia-data/userdata";
pub const DEFAULT_ENGINE_URL: &str = "http://localhost:8088/api/v3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root of the per-user output tree.
    pub data_root: PathBuf,
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl EngineSettings {
    /// Credentials are only needed once we actually talk to the engine.
    pub fn credentials(&self) -> Result<(&str, &str), AppError> {
        match (self.user.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) => Ok((user, password)),
            _ => Err(AppError::new(
                ErrorKind::Config,
                "Missing ACTINIA_USER / ACTINIA_PASSWORD in environment (.env).",
            )),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            data_root: non_empty("RDSM_DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT)),
            engine: EngineSettings {
                url: non_empty("ACTINIA_URL")
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_ENGINE_URL.to_string()),
                user: non_empty("ACTINIA_USER"),
                password: non_empty("ACTINIA_PASSWORD"),
            },
        }
    }
}
