//! # Configuration
//!
//! Runtime settings read from the environment. A `.env` file in the working
//! directory is loaded first when present. Every setting has a local default so
//! the tracker runs with no configuration at all.

use anyhow::{Context, Result};
use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }

        Ok(Self {
            host: try_load("MEDICINE_HOST", "127.0.0.1")?,
            port: try_load("MEDICINE_PORT", "3000")?,
            database_path: try_load("MEDICINE_DB_PATH", "medicine_db.sqlite")?,
            upload_dir: try_load("MEDICINE_UPLOAD_DIR", "prescriptions")?,
            static_dir: try_load("MEDICINE_STATIC_DIR", concat!(env!("CARGO_MANIFEST_DIR"), "/static"))?,
            max_upload_bytes: try_load("MEDICINE_MAX_UPLOAD_BYTES", &DEFAULT_MAX_UPLOAD_BYTES.to_string())?,
        })
    }

    /// Address the HTTP listener binds to
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let address = format!("{}:{}", self.host, self.port);
        address
            .parse()
            .with_context(|| format!("Invalid listen address {address}"))
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("Invalid {key} value '{raw}': {e}"))
}
