//! Port traits: the hexagonal boundary between the relay core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! The radio stack, the preset file store, the persisted mode files and
//! the HID keyboard all live behind these traits.  The
//! [`Controller`](super::service::Controller) consumes them via generics,
//! so the protocol core never touches ESP-IDF directly.
//!
//! No port returns a panic-worthy error: transport failures are `false`,
//! storage failures are enumerated outcomes.

extern crate alloc;
use alloc::vec::Vec;

use crate::config::DeviceConfig;
use crate::preset::Preset;
use crate::state::{BluetoothRole, OperationMode};

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain ↔ radio)
// ───────────────────────────────────────────────────────────────

/// Byte-level link to the peer (amp in bridge modes, app in emulated-amp
/// mode).  Inbound chunks do not come through here: the receive callback
/// pushes them onto the [`IngestQueue`](crate::queue::IngestQueue).
pub trait TransportPort {
    /// Write chunks to the amp.  `paced` spaces consecutive writes.
    fn send_chunks(&mut self, chunks: &[Vec<u8>], paced: bool) -> bool;

    /// Push chunks to the connected app as notifications.
    fn notify_clients(&mut self, chunks: &[Vec<u8>]) -> bool;

    /// Serial sub-mode: whether a raw byte is waiting.
    fn byte_available(&self) -> bool;

    /// Serial sub-mode: next raw byte.
    fn read_byte(&mut self) -> Option<u8>;

    fn is_peer_connected(&self) -> bool;

    /// Bring up the radio role for the selected mode.
    fn start_role(&mut self, mode: OperationMode, role: BluetoothRole);
}

// ───────────────────────────────────────────────────────────────
// Preset library (driven adapter: domain ↔ preset files)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Ok,
    FileExists,
    ErrorOpen,
    UnknownError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Ok,
    FileNotExist,
    ErrorOpen,
}

/// Custom presets, addressed by `(bank ≥ 1, slot 1..=4)`.
pub trait PresetLibrary {
    /// Never fails: a missing preset is [`Preset::empty`].
    fn get_preset(&self, bank: u8, slot: u8) -> Preset;

    fn store_preset(&mut self, preset: &Preset, bank: u8, slot: u8) -> StoreOutcome;

    fn delete_preset(&mut self, bank: u8, slot: u8) -> DeleteOutcome;

    fn number_of_banks(&self) -> u8;

    /// Parse a serialised preset.  Malformed text yields an empty preset.
    fn preset_from_serialized(&self, text: &str) -> Preset {
        Preset::from_json(text).unwrap_or_else(|e| {
            log::warn!("preset: unreadable serialised preset: {e}");
            Preset::empty(0, 0)
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persisted mode files)
// ───────────────────────────────────────────────────────────────

pub trait ConfigPort {
    /// Missing values fall back to [`DeviceConfig::default()`].
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;

    /// Forget the persisted operation mode so the next boot uses the default.
    fn clear_operation_mode(&self) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Keyboard port (driven adapter: domain → HID keyboard)
// ───────────────────────────────────────────────────────────────

pub trait KeyboardPort {
    fn start(&mut self);
    fn end(&mut self);
    fn is_connected(&self) -> bool;
    fn press(&mut self, key: u8);
    fn write(&mut self, key: u8);
    fn release(&mut self, key: u8);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → display / log)
// ───────────────────────────────────────────────────────────────

/// The controller emits [`AppEvent`](super::events::AppEvent)s through
/// this port.  Adapters decide where they go (display, serial log).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored value is not a known digit.
    Corrupted,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from preset storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Storage root is missing or could not be mounted.
    Unavailable,
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "storage unavailable"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
