//! File-backed configuration store.
//!
//! Implements [`ConfigPort`] with two single-digit files under a root
//! directory (the SPIFFS mount on the board, any directory on the host):
//!
//! | File               | Value                                        |
//! |--------------------|----------------------------------------------|
//! | `SparkMode.config` | 1 bridge, 2 emulated amp, 3 looper, 4 keyboard |
//! | `BTMode.config`    | 1 BLE peripheral, 2 serial, 3 central        |
//!
//! The value is the first character of the last line.  A missing file
//! means "compiled default"; unreadable content falls back to the default
//! with a warning.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::{BT_MODE_FILE, DeviceConfig, SPARK_MODE_FILE};
use crate::state::{BluetoothRole, OperationMode};

pub struct FileConfigStore {
    root: PathBuf,
}

impl FileConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!("FileConfigStore: root {}", root.display());
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Digit stored in `file`, `None` if the file does not exist.
    fn read_digit(&self, file: &str) -> Result<Option<u8>, ConfigError> {
        let text = match fs::read_to_string(self.root.join(file)) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("config: reading {file}: {e}");
                return Err(ConfigError::IoError);
            }
        };
        let line = text.lines().filter(|l| !l.trim().is_empty()).last();
        let digit = line
            .and_then(|l| l.trim().chars().next())
            .and_then(|c| c.to_digit(10))
            .ok_or(ConfigError::Corrupted)?;
        Ok(Some(digit as u8))
    }

    fn write_digit(&self, file: &str, digit: u8) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.root)
            .and_then(|()| fs::write(self.root.join(file), format!("{digit}\n")))
            .map_err(|e| {
                warn!("config: writing {file}: {e}");
                ConfigError::IoError
            })
    }

    fn value<T: Default>(&self, file: &str, parse: fn(u8) -> Option<T>) -> Result<T, ConfigError> {
        match self.read_digit(file) {
            Ok(None) => {
                debug!("config: {file} absent, using default");
                Ok(T::default())
            }
            Ok(Some(d)) => Ok(parse(d).unwrap_or_else(|| {
                warn!("config: {file} holds unknown value {d}, using default");
                T::default()
            })),
            Err(ConfigError::Corrupted) => {
                warn!("config: {file} is corrupted, using default");
                Ok(T::default())
            }
            Err(e) => Err(e),
        }
    }
}

impl ConfigPort for FileConfigStore {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        let config = DeviceConfig {
            operation_mode: self.value(SPARK_MODE_FILE, OperationMode::from_digit)?,
            bt_role: self.value(BT_MODE_FILE, BluetoothRole::from_digit)?,
        };
        info!(
            "FileConfigStore: mode={} role={:?}",
            config.operation_mode.label(),
            config.bt_role
        );
        Ok(config)
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        self.write_digit(SPARK_MODE_FILE, config.operation_mode.digit())?;
        self.write_digit(BT_MODE_FILE, config.bt_role.digit())?;
        debug!("config: saved {:?}", config);
        Ok(())
    }

    fn clear_operation_mode(&self) -> Result<(), ConfigError> {
        match fs::remove_file(self.root.join(SPARK_MODE_FILE)) {
            Ok(()) => {
                info!("config: operation mode reset");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("config: removing {SPARK_MODE_FILE}: {e}");
                Err(ConfigError::IoError)
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
