//! Device configuration
//!
//! The two values that survive a restart: which operation mode to boot
//! into and, for emulated-amp mode, which radio role to take.
//! Everything else is compiled in.

use serde::{Deserialize, Serialize};

use crate::state::{BluetoothRole, OperationMode};

/// File holding the operation-mode digit.
pub const SPARK_MODE_FILE: &str = "SparkMode.config";
/// File holding the bluetooth-role digit.
pub const BT_MODE_FILE: &str = "BTMode.config";

/// Preset slot selected at boot.
pub const DEFAULT_PRESET_SLOT: u8 = 1;
/// Bank selected at boot in emulated-amp mode.
pub const EMULATED_AMP_START_BANK: u8 = 1;

/// BLE device name shown while emulating a keyboard.
pub const KEYBOARD_DEVICE_NAME: &str = "Ignitron BLE";

/// Persisted configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub operation_mode: OperationMode,
    pub bt_role: BluetoothRole,
}

impl DeviceConfig {
    pub fn with_mode(mut self, operation_mode: OperationMode) -> Self {
        self.operation_mode = operation_mode;
        self
    }
}
