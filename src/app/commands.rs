//! Inbound commands to the controller.
//!
//! These represent actions requested by the control surface (foot
//! switches, the display's menu) that the
//! [`Controller`](super::service::Controller) interprets and acts upon.

use crate::state::OperationMode;

/// One key of the keyboard-emulation layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardKey {
    /// Identifier shown back on the display.
    pub uid: u8,
    /// HID key code.
    pub key: u8,
    /// Modifier key code, `0` = none.
    pub modifier: u8,
    /// Extra repetitions after the first keystroke.
    pub repeat: u8,
    pub label: &'static str,
}

/// Commands that the control surface can send into the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Numbered foot switch `1..=6`; meaning depends on the button mode.
    NumberedButton(u8),

    /// Select preset slot `n` (emulated-amp: `0` = delete button).
    SelectPreset(u8),

    IncreaseBank,
    DecreaseBank,

    /// Jump straight to a bank.
    SetBank(u8),

    /// Toggle the pedal at this index of the active preset.
    ToggleEffect(usize),

    /// Preset-select ↔ effect-toggle.
    ToggleButtonMode,

    /// Bridge ↔ looper.
    ToggleLooperAppMode,

    SwitchOperationMode(OperationMode),

    /// BLE ↔ serial; persists the role and restarts.
    ToggleBluetoothRole,

    /// Delete button in emulated-amp mode.
    DeletePreset,

    LooperNext,
    LooperPrevious,

    /// Send a keystroke through the keyboard emulation.
    KeyPress(KeyboardKey),
    ResetLastKey,

    /// Clear the store/delete outcome text.
    ResetEditResponse,

    /// Ask the amp for its model name.
    RequestAmpName,

    Restart { reset_mode: bool },
}
