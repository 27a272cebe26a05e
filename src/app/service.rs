//! Mode & role controller, the hexagonal core.
//!
//! [`Controller`] owns the shared [`ControlContext`], the reassembler and
//! the encoder, plus the driven ports it needs on every cycle.  The event
//! sink is injected at call sites.
//!
//! ```text
//!  IngestQueue ──▶ ┌────────────────────────────┐ ──▶ EventSink
//!                  │        Controller          │
//!  TransportPort ◀─│ reassembler · dispatch ·   │──▶ PresetLibrary
//!                  │ preset manager · encoder   │──▶ ConfigPort
//!                  └────────────────────────────┘──▶ KeyboardPort
//! ```
//!
//! Everything runs on the main loop.  The radio callback only touches
//! the [`IngestQueue`].

extern crate alloc;
use alloc::string::String;

use log::{debug, info, warn};

use crate::config::EMULATED_AMP_START_BANK;
use crate::preset::{DRIVE_PEDAL_INDEX, SLOTS_PER_BANK, manager};
use crate::protocol::command::MSG_END;
use crate::protocol::{ChunkReassembler, Direction, FramingProfile, MessageEncoder};
use crate::queue::IngestQueue;
use crate::state::context::KeyPressed;
use crate::state::{
    BluetoothRole, ButtonMode, ControlContext, OperationMode, PresetEditMode,
};

use super::commands::{AppCommand, KeyboardKey};
use super::events::AppEvent;
use super::ports::{ConfigPort, EventSink, KeyboardPort, PresetLibrary, TransportPort};

/// Pedal index toggled by each numbered button in effect-toggle mode:
/// noise gate, compressor, drive, modulation, delay, reverb.
const EFFECT_BUTTONS: [usize; 6] = [0, 1, 2, 4, 5, 6];

/// Longest serial message kept while waiting for its end marker.
pub const SERIAL_MSG_MAX: usize = 512;

// ───────────────────────────────────────────────────────────────
// Display snapshot
// ───────────────────────────────────────────────────────────────

/// What a display shows.  Diffed before/after each entry point to derive
/// [`AppEvent`]s.
#[derive(Debug, Clone, PartialEq)]
struct DisplaySnapshot {
    mode: OperationMode,
    button_mode: ButtonMode,
    edit_mode: PresetEditMode,
    active_bank: u8,
    pending_bank: u8,
    active_slot: u8,
    active_name: String,
    effects: u8,
    pending_name: String,
    response: Option<&'static str>,
    last_key: Option<KeyPressed>,
    amp_name: String,
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

pub struct Controller<T, L, C, K> {
    pub(super) ctx: ControlContext,
    pub(super) reassembler: ChunkReassembler,
    pub(super) encoder: MessageEncoder,
    pub(super) transport: T,
    pub(super) library: L,
    pub(super) config_store: C,
    pub(super) keyboard: K,
    /// Serial sub-mode bytes up to the next end-of-message marker.
    serial_buf: heapless::Vec<u8, SERIAL_MSG_MAX>,
    restart_requested: bool,
}

impl<T, L, C, K> Controller<T, L, C, K>
where
    T: TransportPort,
    L: PresetLibrary,
    C: ConfigPort,
    K: KeyboardPort,
{
    /// Build the controller from the persisted configuration.
    ///
    /// Does **not** bring up the radio; call [`start`](Self::start) next.
    pub fn new(transport: T, library: L, config_store: C, keyboard: K) -> Self {
        let config = config_store.load().unwrap_or_else(|e| {
            warn!("config: {e}, using defaults");
            Default::default()
        });
        Self {
            ctx: ControlContext::new(config),
            reassembler: ChunkReassembler::new(),
            encoder: MessageEncoder::new(FramingProfile::default()),
            transport,
            library,
            config_store,
            keyboard,
            serial_buf: heapless::Vec::new(),
            restart_requested: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Bring up the radio role and initial presets for the configured mode.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        let mode = self.ctx.operation_mode;
        let role = self.ctx.bt_role;
        match mode {
            OperationMode::Bridge => self.transport.start_role(mode, role),
            OperationMode::Looper => {
                self.keyboard.start();
                self.transport.start_role(mode, role);
            }
            OperationMode::EmulatedAmp => {
                self.ctx.active_bank = EMULATED_AMP_START_BANK;
                self.ctx.pending_bank = EMULATED_AMP_START_BANK;
                self.transport.start_role(mode, role);
                self.ctx.active_preset =
                    self.library.get_preset(self.ctx.active_bank, self.ctx.active_slot);
                self.ctx.pending_preset =
                    self.library.get_preset(self.ctx.pending_bank, self.ctx.active_slot);
            }
            OperationMode::KeyboardOnly => self.keyboard.start(),
        }
        info!("Controller started in {:?} ({:?})", mode, role);
        sink.emit(&AppEvent::Started { mode, role });
    }

    /// A connection to the amp was just established: identify it and
    /// re-send the active slot.
    pub fn on_peer_connected(&mut self, sink: &mut impl EventSink) {
        let before = self.snapshot();
        if self.ctx.operation_mode.is_bridging() {
            self.reassembler.clear();
            self.get_amp_name();
            self.switch_preset(self.ctx.active_slot, true);
        }
        self.emit_changes(&before, sink);
    }

    // ── Per-cycle processing ──────────────────────────────────

    /// One main-loop cycle: drain the queue, then the polled flags, then
    /// the serial byte stream.
    pub fn process(&mut self, queue: &IngestQueue, sink: &mut impl EventSink) {
        let before = self.snapshot();

        queue.drain(|chunk| self.process_chunk(&chunk));

        let bridging = self.ctx.operation_mode.is_bridging();
        if bridging && self.reassembler.is_preset_number_updated() {
            if self.ctx.pending_bank == 0 {
                debug!("preset number changed, fetching current preset");
                self.get_current_preset_from_amp();
            }
            self.reassembler.reset_preset_number_updated();
        }

        if bridging && self.reassembler.is_preset_updated() {
            if let Some(preset) = self.reassembler.current_setting().cloned() {
                self.ctx.pending_preset = preset.at(self.ctx.active_bank, self.ctx.active_slot);
                self.ctx.commit_pending();
            }
            self.reassembler.reset_preset_updated();
        }

        if self.ctx.is_emulated_amp() {
            self.poll_serial();
        }

        self.emit_changes(&before, sink);
    }

    /// Feed one raw chunk and dispatch whatever it completes.
    pub fn process_chunk(&mut self, chunk: &[u8]) {
        self.reassembler.feed(chunk);
        while let Some(cmd) = self.reassembler.next_command() {
            self.dispatch(&cmd);
        }
    }

    fn poll_serial(&mut self) {
        while self.transport.byte_available() {
            let Some(byte) = self.transport.read_byte() else {
                break;
            };
            if self.serial_buf.push(byte).is_err() {
                warn!("serial: no end marker within {SERIAL_MSG_MAX} bytes, discarding");
                self.serial_buf.clear();
                continue;
            }
            if byte == MSG_END {
                let msg = core::mem::take(&mut self.serial_buf);
                debug!("serial: message of {} bytes", msg.len());
                self.process_chunk(&msg);
            }
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process a control-surface command.  Returns whether it was acted on.
    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink) -> bool {
        let before = self.snapshot();
        let done = match cmd {
            AppCommand::NumberedButton(n) => self.numbered_button(n),
            AppCommand::SelectPreset(n) => self.process_preset_select(n),
            AppCommand::IncreaseBank => self.navigate_bank(true),
            AppCommand::DecreaseBank => self.navigate_bank(false),
            AppCommand::SetBank(bank) => {
                manager::set_bank(&mut self.ctx, &self.library, bank);
                true
            }
            AppCommand::ToggleEffect(index) => self.toggle_effect(index),
            AppCommand::ToggleButtonMode => self.toggle_button_mode(),
            AppCommand::ToggleLooperAppMode => self.toggle_looper_app_mode(),
            AppCommand::SwitchOperationMode(mode) => {
                self.switch_operation_mode(mode);
                true
            }
            AppCommand::ToggleBluetoothRole => self.toggle_bluetooth_role(sink),
            AppCommand::DeletePreset => {
                manager::handle_delete_button(&mut self.ctx, &mut self.library)
            }
            AppCommand::LooperNext => self.looper_step(true),
            AppCommand::LooperPrevious => self.looper_step(false),
            AppCommand::KeyPress(key) => self.send_button_press_as_keyboard(key),
            AppCommand::ResetLastKey => {
                self.ctx.last_key = None;
                true
            }
            AppCommand::ResetEditResponse => {
                self.ctx.response_msg = None;
                true
            }
            AppCommand::RequestAmpName => self.get_amp_name(),
            AppCommand::Restart { reset_mode } => {
                self.restart(reset_mode, sink);
                true
            }
        };
        self.emit_changes(&before, sink);
        done
    }

    /// Bridge and looper need a connected amp; emulated-amp mode always
    /// acts.
    pub fn action_allowed(&self) -> bool {
        self.ctx.is_emulated_amp() || self.transport.is_peer_connected()
    }

    fn numbered_button(&mut self, n: u8) -> bool {
        if self.ctx.is_emulated_amp() || self.ctx.button_mode == ButtonMode::PresetSelect {
            return self.process_preset_select(n);
        }
        match n.checked_sub(1).and_then(|i| EFFECT_BUTTONS.get(i as usize)) {
            Some(&index) => self.toggle_effect(index),
            None => false,
        }
    }

    /// Slots run `1..=4`; slot 0 is the delete button in emulated-amp
    /// mode.  Anything else is ignored.
    pub fn process_preset_select(&mut self, slot: u8) -> bool {
        let lowest = if self.ctx.is_emulated_amp() { 0 } else { 1 };
        if !(lowest..=SLOTS_PER_BANK).contains(&slot) {
            warn!("preset select ignored: no slot {slot}");
            return false;
        }
        if !self.action_allowed() {
            info!("preset select ignored: amp not connected");
            return false;
        }
        match self.ctx.operation_mode {
            OperationMode::Bridge | OperationMode::Looper => {
                self.switch_preset(slot, false);
            }
            OperationMode::EmulatedAmp => {
                manager::process_preset_edit(&mut self.ctx, &mut self.library, slot);
            }
            OperationMode::KeyboardOnly => {}
        }
        true
    }

    /// Select `slot` in the pending bank.  Re-selecting the active preset
    /// toggles its drive pedal instead.
    pub fn switch_preset(&mut self, slot: u8, initial: bool) -> bool {
        if !self.ctx.operation_mode.is_bridging() || !(1..=SLOTS_PER_BANK).contains(&slot) {
            return false;
        }
        let bank = self.ctx.pending_bank;
        let ok = if slot == self.ctx.active_slot
            && self.ctx.active_bank == bank
            && !self.ctx.active_preset.is_empty
            && !initial
        {
            self.toggle_effect(DRIVE_PEDAL_INDEX)
        } else if bank == 0 {
            info!("Changing to HW preset {slot}");
            let chunks = self.encoder.change_hardware_preset(self.ctx.sequence(), slot);
            self.send_message(&chunks)
        } else {
            self.ctx.pending_preset = self.library.get_preset(bank, slot);
            if self.ctx.pending_preset.is_empty {
                info!("Preset {bank:02}-{slot} is empty, skipping");
                return false;
            }
            info!("Changing to preset {bank:02}-{slot}");
            let chunks = self.encoder.create_preset(
                &self.ctx.pending_preset,
                Direction::ToAmp,
                self.ctx.sequence(),
            );
            let sent = self.send_message(&chunks);
            if sent {
                self.ctx.custom_preset_number_change_pending = true;
            }
            sent
        };
        if ok {
            self.ctx.active_bank = bank;
            self.ctx.active_slot = slot;
        }
        ok
    }

    /// Flip the pedal at `index` of the active preset.
    pub fn toggle_effect(&mut self, index: usize) -> bool {
        if !self.action_allowed() || self.ctx.is_emulated_amp() {
            info!("effect toggle ignored: amp not connected or AMP mode");
            return false;
        }
        if self.ctx.active_preset.is_empty {
            return false;
        }
        let Some(pedal) = self.ctx.active_preset.pedal(index) else {
            return false;
        };
        let (name, on) = (pedal.name.clone(), pedal.is_on);
        self.switch_effect_on_off(&name, !on)
    }

    fn switch_effect_on_off(&mut self, name: &str, enable: bool) -> bool {
        info!("Switching {name} {}", if enable { "on" } else { "off" });
        self.ctx.pending_preset.set_pedal_on(name, enable);
        let chunks = self.encoder.turn_effect_onoff(self.ctx.sequence(), name, enable);
        self.send_message(&chunks)
    }

    fn navigate_bank(&mut self, up: bool) -> bool {
        if !self.action_allowed() {
            return false;
        }
        if up {
            manager::increase_bank(&mut self.ctx, &self.library);
        } else {
            manager::decrease_bank(&mut self.ctx, &self.library);
        }
        true
    }

    pub fn toggle_button_mode(&mut self) -> bool {
        if !self.action_allowed() || self.ctx.is_emulated_amp() {
            info!("button mode unchanged: amp not connected or AMP mode");
            return false;
        }
        self.ctx.button_mode = match self.ctx.button_mode {
            ButtonMode::PresetSelect => {
                self.ctx.update_pending_with_active();
                ButtonMode::EffectToggle
            }
            ButtonMode::EffectToggle => ButtonMode::PresetSelect,
        };
        info!("Button mode: {:?}", self.ctx.button_mode);
        true
    }

    pub fn toggle_looper_app_mode(&mut self) -> bool {
        if self.ctx.is_emulated_amp() || !self.action_allowed() {
            info!("looper toggle ignored: amp not connected or AMP mode");
            return false;
        }
        let next = match self.ctx.operation_mode {
            OperationMode::Bridge => OperationMode::Looper,
            _ => OperationMode::Bridge,
        };
        self.switch_operation_mode(next);
        true
    }

    /// Change mode at runtime.  Drops unconfirmed navigation and persists
    /// the new mode.
    pub fn switch_operation_mode(&mut self, mode: OperationMode) {
        info!("Operation mode: {:?} -> {:?}", self.ctx.operation_mode, mode);
        self.ctx.operation_mode = mode;
        self.ctx.button_mode = ButtonMode::PresetSelect;
        match mode {
            OperationMode::Bridge => self.keyboard.end(),
            OperationMode::Looper => self.keyboard.start(),
            _ => {}
        }
        self.ctx.update_pending_with_active();
        if let Err(e) = self.config_store.save(&self.ctx.config()) {
            warn!("config: saving mode failed: {e}");
        }
    }

    fn toggle_bluetooth_role(&mut self, sink: &mut impl EventSink) -> bool {
        if !self.ctx.is_emulated_amp() {
            return false;
        }
        self.ctx.bt_role = self.ctx.bt_role.toggled();
        info!("Bluetooth role: {:?}, restarting", self.ctx.bt_role);
        if let Err(e) = self.config_store.save(&self.ctx.config()) {
            warn!("config: saving role failed: {e}");
        }
        self.restart(false, sink);
        true
    }

    fn looper_step(&mut self, forward: bool) -> bool {
        if !self.action_allowed() || self.ctx.operation_mode != OperationMode::Looper {
            info!("looper step ignored: amp not connected or not in LOOPER mode");
            return false;
        }
        let slot = manager::looper_step(&mut self.ctx, self.library.number_of_banks(), forward);
        self.switch_preset(slot, false)
    }

    fn send_button_press_as_keyboard(&mut self, key: KeyboardKey) -> bool {
        if !self.keyboard.is_connected() {
            info!("keyboard not connected");
            return false;
        }
        debug!("key {} mod {} repeat {}", key.key, key.modifier, key.repeat);
        if key.modifier != 0 {
            self.keyboard.press(key.modifier);
        }
        for _ in 0..=key.repeat {
            self.keyboard.write(key.key);
        }
        if key.modifier != 0 {
            self.keyboard.release(key.modifier);
        }
        self.ctx.last_key = Some(KeyPressed { uid: key.uid, label: key.label });
        true
    }

    /// Ask the binary to reboot, optionally forgetting the persisted mode.
    pub fn restart(&mut self, reset_mode: bool, sink: &mut impl EventSink) {
        if reset_mode {
            if let Err(e) = self.config_store.clear_operation_mode() {
                warn!("config: clearing mode failed: {e}");
            }
        }
        warn!("Restart requested (reset mode: {reset_mode})");
        self.restart_requested = true;
        sink.emit(&AppEvent::RestartRequested { reset_mode });
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn context(&self) -> &ControlContext {
        &self.ctx
    }

    pub fn reassembler(&self) -> &ChunkReassembler {
        &self.reassembler
    }

    pub fn encoder(&self) -> &MessageEncoder {
        &self.encoder
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Serial bytes held while waiting for an end marker.
    pub fn serial_backlog(&self) -> usize {
        self.serial_buf.len()
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    pub fn config_store(&self) -> &C {
        &self.config_store
    }

    pub fn keyboard(&self) -> &K {
        &self.keyboard
    }

    pub fn bluetooth_role(&self) -> BluetoothRole {
        self.ctx.bt_role
    }

    /// Whether a restart was requested since the last call.
    pub fn take_restart_request(&mut self) -> bool {
        core::mem::take(&mut self.restart_requested)
    }

    // ── Internal ──────────────────────────────────────────────

    fn snapshot(&self) -> DisplaySnapshot {
        let ctx = &self.ctx;
        DisplaySnapshot {
            mode: ctx.operation_mode,
            button_mode: ctx.button_mode,
            edit_mode: ctx.preset_edit_mode,
            active_bank: ctx.active_bank,
            pending_bank: ctx.pending_bank,
            active_slot: ctx.active_slot,
            active_name: ctx.active_preset.name.clone(),
            effects: effect_mask(&ctx.active_preset),
            pending_name: ctx.pending_preset.name.clone(),
            response: ctx.response_msg,
            last_key: ctx.last_key.clone(),
            amp_name: self.reassembler.amp_name().into(),
        }
    }

    fn emit_changes(&self, before: &DisplaySnapshot, sink: &mut impl EventSink) {
        let now = self.snapshot();
        if now == *before {
            return;
        }
        if (now.mode, now.button_mode) != (before.mode, before.button_mode) {
            sink.emit(&AppEvent::ModeChanged { mode: now.mode, button_mode: now.button_mode });
        }
        if (now.active_bank, now.pending_bank) != (before.active_bank, before.pending_bank) {
            sink.emit(&AppEvent::BankChanged { active: now.active_bank, pending: now.pending_bank });
        }
        if (now.active_bank, now.active_slot, &now.active_name, now.effects)
            != (before.active_bank, before.active_slot, &before.active_name, before.effects)
        {
            sink.emit(&AppEvent::PresetChanged {
                bank: now.active_bank,
                slot: now.active_slot,
                name: now.active_name.clone(),
                effects: now.effects,
            });
        }
        if now.pending_name != before.pending_name || now.pending_bank != before.pending_bank {
            sink.emit(&AppEvent::PendingPresetChanged {
                bank: now.pending_bank,
                name: now.pending_name.clone(),
            });
        }
        if now.edit_mode != before.edit_mode {
            sink.emit(&AppEvent::EditModeChanged(now.edit_mode));
        }
        if let Some(msg) = now.response.filter(|_| now.response != before.response) {
            sink.emit(&AppEvent::EditResponse(msg));
        }
        if let Some(key) = now.last_key.as_ref().filter(|_| now.last_key != before.last_key) {
            sink.emit(&AppEvent::KeyboardKeySent { uid: key.uid, label: key.label });
        }
        if now.amp_name != before.amp_name {
            sink.emit(&AppEvent::AmpIdentified(now.amp_name.clone()));
        }
    }
}

/// On/off state of the first eight pedals, bit `i` = pedal `i`.
fn effect_mask(preset: &crate::preset::Preset) -> u8 {
    preset
        .pedals
        .iter()
        .take(8)
        .enumerate()
        .fold(0, |m, (i, p)| m | (u8::from(p.is_on) << i))
}
