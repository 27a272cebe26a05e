//! Outbound application events.
//!
//! The [`Controller`](super::service::Controller) emits these through the
//! [`EventSink`](super::ports::EventSink) port whenever something a
//! display would show has changed.

extern crate alloc;
use alloc::string::String;

use crate::state::{BluetoothRole, ButtonMode, OperationMode, PresetEditMode};

/// Structured events emitted by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The controller has started.
    Started { mode: OperationMode, role: BluetoothRole },

    ModeChanged { mode: OperationMode, button_mode: ButtonMode },

    BankChanged { active: u8, pending: u8 },

    /// The active preset changed (slot, content or on/off state).
    PresetChanged { bank: u8, slot: u8, name: String, effects: u8 },

    /// Navigation selected a preset that is not active yet.
    PendingPresetChanged { bank: u8, name: String },

    EditModeChanged(PresetEditMode),

    /// Outcome text of a store/delete (`"SAVE OK"`, …).
    EditResponse(&'static str),

    AmpIdentified(String),

    KeyboardKeySent { uid: u8, label: &'static str },

    RestartRequested { reset_mode: bool },
}
