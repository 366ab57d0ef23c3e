use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cloud::Credentials;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub email: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    pub lan_address: String,
    pub refresh_interval: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            email: "user@email.com".to_string(),
            password: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            callback_url: String::new(),
            lan_address: String::new(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

impl BridgeConfig {
    pub fn with_connect_url(connect_url: impl Into<String>) -> Self {
        Self {
            callback_url: connect_url.into(),
            ..Self::default()
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.email.is_empty()
            && !self.password.is_empty()
            && !self.client_id.is_empty()
            && !self.client_secret.is_empty()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            email: self.email.clone(),
            password: self.password.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("invalid config file {path}: {message}")]
    Parse { path: String, message: String },
}

pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<BridgeConfig, ConfigError>;
    fn save(&self, config: &BridgeConfig) -> Result<(), ConfigError>;
}

pub struct FileConfigStore {
    path: PathBuf,
    defaults: BridgeConfig,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>, defaults: BridgeConfig) -> Self {
        Self {
            path: path.into(),
            defaults,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, err: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<BridgeConfig, ConfigError> {
        if !self.path.exists() {
            return Ok(self.defaults.clone());
        }

        let raw = fs::read_to_string(&self.path).map_err(|err| self.io_error(err))?;
        serde_json::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: self.path.display().to_string(),
            message: err.to_string(),
        })
    }

    fn save(&self, config: &BridgeConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let body = serde_json::to_vec_pretty(config).map_err(|err| ConfigError::Parse {
            path: self.path.display().to_string(),
            message: err.to_string(),
        })?;
        fs::write(&self.path, body).map_err(|err| self.io_error(err))
    }
}

#[derive(Default)]
pub struct MemoryConfigStore {
    inner: Mutex<BridgeConfig>,
    saves: AtomicU32,
}

impl MemoryConfigStore {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            inner: Mutex::new(config),
            saves: AtomicU32::new(0),
        }
    }

    pub fn saves(&self) -> u32 {
        self.saves.load(Ordering::Relaxed)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<BridgeConfig, ConfigError> {
        Ok(self
            .inner
            .lock()
            .map(|cfg| cfg.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone()))
    }

    fn save(&self, config: &BridgeConfig) -> Result<(), ConfigError> {
        match self.inner.lock() {
            Ok(mut cfg) => *cfg = config.clone(),
            Err(poisoned) => *poisoned.into_inner() = config.clone(),
        }
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
