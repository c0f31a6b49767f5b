use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::process_lock::{DEFAULT_LOCK_PREFIX, LockOptions, LockStrategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub prefix: String,
    pub strategy: LockStrategy,
    /// Poll a contended lock for up to this many milliseconds instead of failing at once.
    pub wait_ms: Option<u64>,
    /// Lock file directory. Defaults to the system temp dir.
    pub dir: Option<PathBuf>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_LOCK_PREFIX.to_string(),
            strategy: LockStrategy::default(),
            wait_ms: None,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub modules_dir: PathBuf,
    pub root_dir: PathBuf,
    pub lock: LockConfig,
    /// Handed verbatim to every module constructor.
    pub module_config: Value,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            modules_dir: PathBuf::from("modules"),
            root_dir: PathBuf::from("."),
            lock: LockConfig::default(),
            module_config: Value::Null,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::io_at(path, e))?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| Error::json_at(path, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let prefix = &self.lock.prefix;
        if prefix.is_empty() {
            return Err(Error::config("lock.prefix must not be empty"));
        }
        if prefix.contains(['/', '\\']) {
            return Err(Error::config(format!(
                "lock.prefix `{prefix}` must not contain path separators"
            )));
        }
        if cfg!(not(windows)) && self.lock.strategy == LockStrategy::NamedMutex {
            return Err(Error::config(
                "lock.strategy `named_mutex` is only available on windows",
            ));
        }
        Ok(())
    }

    pub fn lock_options(&self) -> LockOptions {
        let defaults = LockOptions::default();
        LockOptions {
            prefix: self.lock.prefix.clone(),
            strategy: self.lock.strategy,
            wait: self.lock.wait_ms.map(Duration::from_millis),
            dir: self.lock.dir.clone().unwrap_or(defaults.dir),
        }
    }
}
