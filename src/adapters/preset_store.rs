//! File-backed preset library.
//!
//! Implements [`PresetLibrary`] on a directory tree:
//!
//! ```text
//! <root>/
//!   1/1.json  1/2.json  1/3.json  1/4.json
//!   2/1.json  …
//! ```
//!
//! Each file is the JSON form of one [`Preset`].  The number of banks is
//! the highest numbered bank directory.  Storing never overwrites: an
//! occupied slot reports [`StoreOutcome::FileExists`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::app::ports::{DeleteOutcome, PresetLibrary, StorageError, StoreOutcome};
use crate::preset::Preset;

pub struct FilePresetLibrary {
    root: PathBuf,
    banks: u8,
}

impl FilePresetLibrary {
    /// Open the library under `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            warn!("presets: cannot open {}: {e}", root.display());
            StorageError::Unavailable
        })?;
        let banks = count_banks(&root)?;
        info!("FilePresetLibrary: {} banks under {}", banks, root.display());
        Ok(Self { root, banks })
    }

    fn path(&self, bank: u8, slot: u8) -> PathBuf {
        self.root.join(bank.to_string()).join(format!("{slot}.json"))
    }
}

fn count_banks(root: &Path) -> Result<u8, StorageError> {
    let entries = fs::read_dir(root).map_err(|_| StorageError::IoError)?;
    Ok(entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str()?.parse::<u8>().ok())
        .filter(|&b| b > 0)
        .max()
        .unwrap_or(0))
}

impl PresetLibrary for FilePresetLibrary {
    fn get_preset(&self, bank: u8, slot: u8) -> Preset {
        let path = self.path(bank, slot);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!("presets: reading {}: {e}", path.display());
                }
                return Preset::empty(bank, slot);
            }
        };
        match Preset::from_json(&text) {
            Ok(p) => p.at(bank, slot),
            Err(e) => {
                warn!("presets: {} unreadable: {e}", path.display());
                Preset::empty(bank, slot)
            }
        }
    }

    fn store_preset(&mut self, preset: &Preset, bank: u8, slot: u8) -> StoreOutcome {
        let path = self.path(bank, slot);
        if path.exists() {
            return StoreOutcome::FileExists;
        }
        let json = match preset.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("presets: serialising '{}': {e}", preset.name);
                return StoreOutcome::UnknownError;
            }
        };
        let written = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(&path, json));
        match written {
            Ok(()) => {
                self.banks = self.banks.max(bank);
                debug!("presets: stored {}", path.display());
                StoreOutcome::Ok
            }
            Err(e) => {
                warn!("presets: writing {}: {e}", path.display());
                StoreOutcome::ErrorOpen
            }
        }
    }

    fn delete_preset(&mut self, bank: u8, slot: u8) -> DeleteOutcome {
        let path = self.path(bank, slot);
        match fs::remove_file(&path) {
            Ok(()) => DeleteOutcome::Ok,
            Err(e) if e.kind() == ErrorKind::NotFound => DeleteOutcome::FileNotExist,
            Err(e) => {
                warn!("presets: deleting {}: {e}", path.display());
                DeleteOutcome::ErrorOpen
            }
        }
    }

    fn number_of_banks(&self) -> u8 {
        self.banks
    }
}

// ── Tests ────────────────────────────────────────────────────
