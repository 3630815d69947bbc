use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_DATA_DIR: &str = "database";
const DEFAULT_STATIC_DIR: &str = "static";
const DEFAULT_SESSION_HOURS: u64 = 24;
const DEFAULT_MAX_UPLOAD_MB: usize = 64;

/// Start-up settings of the server
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    /// Directory holding the collection files and uploaded templates
    pub data_dir: PathBuf,
    /// Served under `/static` when it exists
    pub static_dir: PathBuf,
    pub session_ttl: Duration,
    /// Password of the `admin` account created on first start
    pub admin_password: Option<String>,
    /// Single allowed CORS origin; any origin when unset
    pub cors_origin: Option<String>,
    /// Body limit of template uploads and snapshot restores
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_HOURS * 60 * 60),
            admin_password: None,
            cors_origin: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

impl Config {
    /// Reads `gleemanager [BIND_ADDR] [DATA_DIR]` plus the `GLEE_*` variables
    ///
    /// Positional arguments win over the environment.
    pub fn from_env_and_args<I>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = String>,
    {
        Self::from_sources(args, |key| env::var(key).ok())
    }

    fn from_sources<I, F>(args: I, var: F) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let args: Vec<String> = args.into_iter().skip(1).collect();
        let mut config = Config::default();

        let bind = args
            .first()
            .cloned()
            .or_else(|| var("GLEE_BIND"))
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        config.bind = bind
            .parse()
            .map_err(|_| AppError::Config(format!("invalid bind address '{}'", bind)))?;

        if let Some(dir) = args.get(1).cloned().or_else(|| var("GLEE_DATA_DIR")) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("GLEE_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(hours) = var("GLEE_SESSION_HOURS") {
            let hours: u64 = hours
                .trim()
                .parse()
                .ok()
                .filter(|h| *h > 0)
                .ok_or_else(|| {
                    AppError::Config(format!("invalid GLEE_SESSION_HOURS '{}'", hours))
                })?;
            config.session_ttl = Duration::from_secs(hours * 60 * 60);
        }
        if let Some(megabytes) = var("GLEE_MAX_UPLOAD_MB") {
            config.max_upload_bytes = megabytes
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|mb| *mb > 0)
                .and_then(|mb| mb.checked_mul(1024 * 1024))
                .ok_or_else(|| {
                    AppError::Config(format!("invalid GLEE_MAX_UPLOAD_MB '{}'", megabytes))
                })?;
        }
        config.admin_password = var("GLEE_ADMIN_PASSWORD").filter(|p| !p.is_empty());
        config.cors_origin = var("GLEE_CORS_ORIGIN").filter(|o| !o.is_empty());

        Ok(config)
    }
}
