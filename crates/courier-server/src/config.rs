use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Runtime settings, read from `COURIER_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_mb: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = get("COURIER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse(&get, "COURIER_PORT", "a port number", 3000)?;
        let db_path = get("COURIER_DB_PATH").unwrap_or_else(|| "courier.db".into()).into();
        let upload_dir = get("COURIER_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into()).into();
        let max_upload_mb = parse(&get, "COURIER_MAX_UPLOAD_MB", "a positive integer", 5)?;
        if max_upload_mb == 0 {
            return Err(ConfigError::Invalid {
                name: "COURIER_MAX_UPLOAD_MB",
                expected: "a positive integer",
                value: "0".into(),
            });
        }

        Ok(Self {
            host,
            port,
            db_path,
            upload_dir,
            max_upload_mb,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            name: "COURIER_HOST",
            expected: "an IP address",
            value: self.host.clone(),
        })
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

fn parse<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, expected, value }),
    }
}
