//! Shared mutable context threaded through every handler.
//!
//! `ControlContext` is the single struct the controller, the dispatch
//! handlers and the preset manager read from and write to: modes, the
//! active/pending preset pairs, the edit workflow and the outbound
//! sequence counter.  Only the main processing cycle touches it.

use super::{BluetoothRole, ButtonMode, OperationMode, PresetEditMode};
use crate::config::{DEFAULT_PRESET_SLOT, DeviceConfig};
use crate::preset::Preset;

/// Last key sent through the keyboard emulation, for the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPressed {
    pub uid: u8,
    pub label: &'static str,
}

pub struct ControlContext {
    // -- Modes --
    pub operation_mode: OperationMode,
    pub bt_role: BluetoothRole,
    pub button_mode: ButtonMode,
    pub preset_edit_mode: PresetEditMode,

    // -- Presets --
    /// What the amp currently plays.
    pub active_preset: Preset,
    /// Selection in progress.
    pub pending_preset: Preset,
    pub active_bank: u8,
    pub pending_bank: u8,
    /// Slot (1..=4) of the active preset.
    pub active_slot: u8,

    // -- Store / delete workflow --
    /// Preset uploaded by the app, waiting for a target slot.
    pub app_received_preset: Option<Preset>,
    /// Target recorded by the first slot selection, `0` = none.
    pub slot_to_edit: u8,
    pub bank_to_edit: u8,
    /// Outcome text for the display, cleared by the caller.
    pub response_msg: Option<&'static str>,

    // -- Protocol --
    /// Sequence number for the next outbound command.
    pub next_message_num: u8,
    /// A custom preset was uploaded; its ack must select slot 128.
    pub custom_preset_number_change_pending: bool,

    // -- Keyboard --
    pub last_key: Option<KeyPressed>,
}

impl ControlContext {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            operation_mode: config.operation_mode,
            bt_role: config.bt_role,
            button_mode: ButtonMode::PresetSelect,
            preset_edit_mode: PresetEditMode::None,
            active_preset: Preset::empty(0, DEFAULT_PRESET_SLOT),
            pending_preset: Preset::empty(0, DEFAULT_PRESET_SLOT),
            active_bank: 0,
            pending_bank: 0,
            active_slot: DEFAULT_PRESET_SLOT,
            app_received_preset: None,
            slot_to_edit: 0,
            bank_to_edit: 0,
            response_msg: None,
            next_message_num: 0x01,
            custom_preset_number_change_pending: false,
            last_key: None,
        }
    }

    /// Discard unconfirmed navigation.
    pub fn update_pending_with_active(&mut self) {
        self.pending_bank = self.active_bank;
        self.pending_preset = self.active_preset.clone();
    }

    /// Promote the pending preset after the amp confirmed it.
    pub fn commit_pending(&mut self) {
        self.active_preset = self.pending_preset.clone();
    }

    /// Sequence number used by the next outbound command.
    pub fn sequence(&self) -> u8 {
        self.next_message_num
    }

    pub fn advance_sequence(&mut self) {
        self.next_message_num = self.next_message_num.wrapping_add(1);
    }

    pub fn is_emulated_amp(&self) -> bool {
        self.operation_mode == OperationMode::EmulatedAmp
    }

    pub fn config(&self) -> DeviceConfig {
        DeviceConfig {
            operation_mode: self.operation_mode,
            bt_role: self.bt_role,
        }
    }
}
