//! Operating modes of the relay.
//!
//! The controller's state is the product
//! `OperationMode × ButtonMode × BluetoothRole × PresetEditMode`:
//!
//! ```text
//! ┌───────────────┐ switch_operation_mode ┌───────────────┐
//! │ Bridge        │◀─────────────────────▶│ Looper        │
//! │ (ButtonMode)  │                       │ (ButtonMode)  │
//! └───────────────┘                       └───────────────┘
//!         ▲ persisted + restart                   ▲
//!         ▼                                       ▼
//! ┌───────────────┐                       ┌───────────────┐
//! │ EmulatedAmp   │                       │ KeyboardOnly  │
//! │ (BT role,     │                       └───────────────┘
//! │  PresetEdit)  │
//! └───────────────┘
//! ```
//!
//! Mode and role are persisted as single decimal digits.

pub mod context;

pub use context::ControlContext;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperationMode {
    /// Relay between app and amp (the device acts as the app).
    #[default]
    Bridge,
    /// Answer the app as if the device were the amp.
    EmulatedAmp,
    /// Bridge with four-presets-per-bank cycling.
    Looper,
    KeyboardOnly,
}

impl OperationMode {
    pub fn from_digit(d: u8) -> Option<Self> {
        match d {
            1 => Some(Self::Bridge),
            2 => Some(Self::EmulatedAmp),
            3 => Some(Self::Looper),
            4 => Some(Self::KeyboardOnly),
            _ => None,
        }
    }

    pub const fn digit(self) -> u8 {
        match self {
            Self::Bridge => 1,
            Self::EmulatedAmp => 2,
            Self::Looper => 3,
            Self::KeyboardOnly => 4,
        }
    }

    /// Modes in which the device talks to a real amp.
    pub const fn is_bridging(self) -> bool {
        matches!(self, Self::Bridge | Self::Looper)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Bridge => "APP",
            Self::EmulatedAmp => "AMP",
            Self::Looper => "LOOPER",
            Self::KeyboardOnly => "KEYBOARD",
        }
    }
}

/// Radio role.  Only meaningful in [`OperationMode::EmulatedAmp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BluetoothRole {
    #[default]
    PeripheralBle,
    PeripheralSerial,
    Central,
}

impl BluetoothRole {
    pub fn from_digit(d: u8) -> Option<Self> {
        match d {
            1 => Some(Self::PeripheralBle),
            2 => Some(Self::PeripheralSerial),
            3 => Some(Self::Central),
            _ => None,
        }
    }

    pub const fn digit(self) -> u8 {
        match self {
            Self::PeripheralBle => 1,
            Self::PeripheralSerial => 2,
            Self::Central => 3,
        }
    }

    /// BLE ↔ classic serial.  `Central` has no peripheral counterpart.
    pub const fn toggled(self) -> Self {
        match self {
            Self::PeripheralBle => Self::PeripheralSerial,
            Self::PeripheralSerial => Self::PeripheralBle,
            Self::Central => Self::Central,
        }
    }
}

/// How numbered buttons are interpreted outside emulated-amp mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonMode {
    #[default]
    PresetSelect,
    EffectToggle,
}

/// Short-lived store/delete workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresetEditMode {
    #[default]
    None,
    Store,
    Delete,
}
