use std::{env, path::PathBuf};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub serve_root: PathBuf,
    pub log_dir: PathBuf,
    pub allow_hidden: bool,
    pub api_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid SERVER_PORT: {err}")))?;

        let serve_root =
            PathBuf::from(env::var("CANOPY_SERVE_ROOT").unwrap_or_else(|_| "./data".into()));

        let log_dir =
            PathBuf::from(env::var("CANOPY_LOG_DIR").unwrap_or_else(|_| "../log".into()));

        let allow_hidden = env::var("CANOPY_ALLOW_HIDDEN")
            .unwrap_or_else(|_| "false".into())
            .parse::<bool>()
            .map_err(|err| AppError::Config(format!("invalid CANOPY_ALLOW_HIDDEN: {err}")))?;

        let api_token = env::var("CANOPY_API_TOKEN")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(Self {
            host,
            port,
            serve_root,
            log_dir,
            allow_hidden,
            api_token,
        })
    }
}
