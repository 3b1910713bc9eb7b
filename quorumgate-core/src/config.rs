//! Configuration loading.
//!
//! Follows the same load-or-default-and-persist shape used elsewhere in
//! this codebase for process state: try the file, fall back to
//! environment-derived defaults, and write those defaults back out so a
//! second run sees a stable, inspectable config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub mode: Mode,
    pub f_faults: usize,
    pub n_workers: usize,
    pub consensus_timeout_sec: f64,
    pub bind_address: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Fast,
    Full,
}

impl GatewayConfig {
    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(_) => {
                let config = Self::from_env_or_default()?;
                let text = serde_json::to_string_pretty(&config)?;
                tokio::fs::write(path, text).await.ok();
                Ok(config)
            }
        }
    }

    pub fn from_env_or_default() -> anyhow::Result<Self> {
        let mode = match std::env::var("MODE").as_deref() {
            Ok("full") => Mode::Full,
            _ => Mode::Fast,
        };
        let f_faults: usize = std::env::var("F_FAULTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let n_workers: usize = std::env::var("N_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3 * f_faults + 1);
        let consensus_timeout_sec: f64 = std::env::var("CONSENSUS_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30.0);
        let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let data_dir: PathBuf = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()).into();

        if n_workers < 3 * f_faults + 1 {
            anyhow::bail!(
                "N_WORKERS={n_workers} cannot tolerate F_FAULTS={f_faults}: need at least {}",
                3 * f_faults + 1
            );
        }

        Ok(Self {
            mode,
            f_faults,
            n_workers,
            consensus_timeout_sec,
            bind_address,
            port,
            data_dir,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.consensus_timeout_sec)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_env_or_default().expect("default env config is always valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_valid_n_f_relationship() {
        let config = GatewayConfig::default();
        assert!(config.n_workers >= 3 * config.f_faults + 1);
    }

    #[tokio::test]
    async fn load_creates_file_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.config.json");
        let config = GatewayConfig::load(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(config.n_workers, 3 * config.f_faults + 1);
    }
}
