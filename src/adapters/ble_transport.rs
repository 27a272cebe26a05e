//! Transport shim: implements [`TransportPort`] over a GATT link.
//!
//! The radio specifics (Bluedroid on target, a recorder in tests) sit
//! behind [`GattLink`].  This adapter adds what the controller expects
//! from the shim: per-chunk writes with optional pacing, client
//! notifications, and the serial byte stream.
//!
//! ## GATT Service Layout (Spark)
//!
//! | Characteristic | UUID     | Perms          |
//! |----------------|----------|----------------|
//! | Service        | `0xFFC0` |                |
//! | Write          | `0xFFC1` | Write          |
//! | Notify         | `0xFFC2` | Read + Notify  |
//!
//! Inbound notifications (bridge) and GATT writes (emulated amp) never go
//! through this type: the link's callback pushes them onto the
//! [`IngestQueue`](crate::queue::IngestQueue).

extern crate alloc;
use alloc::vec::Vec;
use core::time::Duration;

use log::{debug, info, warn};

use crate::app::ports::TransportPort;
use crate::state::{BluetoothRole, OperationMode};

// ── Constants ────────────────────────────────────────────────

pub const SPARK_SERVICE_UUID: u16 = 0xFFC0;
pub const SPARK_WRITE_CHAR_UUID: u16 = 0xFFC1;
pub const SPARK_NOTIFY_CHAR_UUID: u16 = 0xFFC2;

/// Gap between consecutive writes of a paced send.
pub const DEFAULT_PACING: Duration = Duration::from_millis(10);

// ── Error type ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleTransportError {
    NotConnected,
    StackInitFailed,
    Io,
}

impl core::fmt::Display for BleTransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "BLE: no peer connected"),
            Self::StackInitFailed => write!(f, "BLE: stack initialisation failed"),
            Self::Io => write!(f, "BLE: GATT I/O error"),
        }
    }
}

// ── Link abstraction ─────────────────────────────────────────

/// Raw radio operations.  One chunk per call.
pub trait GattLink {
    /// Write to the amp's write characteristic (central role).
    fn write(&mut self, chunk: &[u8]) -> Result<(), BleTransportError>;

    /// Notify subscribed clients (peripheral role), or write to the
    /// serial port in the serial sub-mode.
    fn notify(&mut self, chunk: &[u8]) -> Result<(), BleTransportError>;

    fn is_connected(&self) -> bool;

    /// Next byte of the serial stream, if any.
    fn read_serial_byte(&mut self) -> Option<u8> {
        None
    }

    fn serial_available(&self) -> bool {
        false
    }

    fn start(&mut self, mode: OperationMode, role: BluetoothRole) -> Result<(), BleTransportError>;
}

// ── BLE Transport ────────────────────────────────────────────

pub struct BleTransport<L> {
    link: L,
    pacing: Duration,
}

impl<L: GattLink> BleTransport<L> {
    pub fn new(link: L) -> Self {
        Self { link, pacing: DEFAULT_PACING }
    }

    /// Override the paced-send gap (zero in tests).
    #[must_use]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn pause(&self) {
        if !self.pacing.is_zero() {
            std::thread::sleep(self.pacing);
        }
    }
}

impl<L: GattLink> TransportPort for BleTransport<L> {
    fn send_chunks(&mut self, chunks: &[Vec<u8>], paced: bool) -> bool {
        if !self.link.is_connected() {
            debug!("BLE: send skipped, amp not connected");
            return false;
        }
        for (i, chunk) in chunks.iter().enumerate() {
            if paced && i > 0 {
                self.pause();
            }
            if let Err(e) = self.link.write(chunk) {
                warn!("BLE: write {}/{} failed: {e}", i + 1, chunks.len());
                return false;
            }
        }
        true
    }

    fn notify_clients(&mut self, chunks: &[Vec<u8>]) -> bool {
        for chunk in chunks {
            if let Err(e) = self.link.notify(chunk) {
                warn!("BLE: notify failed: {e}");
                return false;
            }
        }
        true
    }

    fn byte_available(&self) -> bool {
        self.link.serial_available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.link.read_serial_byte()
    }

    fn is_peer_connected(&self) -> bool {
        self.link.is_connected()
    }

    fn start_role(&mut self, mode: OperationMode, role: BluetoothRole) {
        info!("BLE: starting {:?} for {}", role, mode.label());
        if let Err(e) = self.link.start(mode, role) {
            warn!("BLE: {e}");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
