//! Protocol-side handlers of the [`Controller`].
//!
//! Every reassembled command goes through [`Controller::dispatch`]:
//!
//! ```text
//!  ReassembledCommand
//!        │
//!        ├─▶ owed ack?            ─▶ handle_sending_ack
//!        ├─▶ Request   (AMP mode) ─▶ handle_amp_mode_request
//!        ├─▶ Response  (APP mode) ─▶ handle_app_mode_response
//!        └─▶ inbound ack          ─▶ handle_incoming_ack
//! ```

extern crate alloc;
use alloc::vec::Vec;

use log::{debug, info, warn};

use crate::preset::manager;
use crate::protocol::message::CUSTOM_SLOT;
use crate::protocol::{
    AmpRequest, Command, Content, Direction, MessageKind, ReassembledCommand, SubCommand,
};
use crate::state::OperationMode;

use super::ports::{ConfigPort, KeyboardPort, PresetLibrary, TransportPort};
use super::service::Controller;

impl<T, L, C, K> Controller<T, L, C, K>
where
    T: TransportPort,
    L: PresetLibrary,
    C: ConfigPort,
    K: KeyboardPort,
{
    pub(super) fn dispatch(&mut self, cmd: &ReassembledCommand) {
        debug!(
            "dispatch: seq {:02X} cmd {:02X}/{:02X} {:?}",
            cmd.sequence, cmd.command, cmd.sub_command, cmd.kind
        );
        self.handle_sending_ack(cmd);

        match (cmd.kind, self.ctx.operation_mode) {
            (MessageKind::Request, OperationMode::EmulatedAmp) => {
                self.handle_amp_mode_request(cmd);
            }
            (MessageKind::CompleteResponse, mode) if mode.is_bridging() => {
                self.handle_app_mode_response(cmd);
            }
            (MessageKind::Unrecognized, _) => {
                debug!("dropping unrecognized {:02X}/{:02X}", cmd.command, cmd.sub_command);
            }
            _ => {}
        }

        self.handle_incoming_ack();
    }

    // ── Outbound acks ─────────────────────────────────────────

    /// Answer the ack `cmd` is owed.  Direction follows the role: the
    /// emulated amp acks from-amp, the bridge acks to-amp.
    fn handle_sending_ack(&mut self, cmd: &ReassembledCommand) {
        let Some(owed) = cmd.ack else {
            return;
        };
        match self.ctx.operation_mode {
            OperationMode::EmulatedAmp => {
                debug!("ack -> app seq {:02X} sub {:02X}", owed.sequence, owed.sub_command);
                let chunks = self.encoder.ack(owed.sequence, owed.sub_command, Direction::FromAmp);
                if !self.transport.notify_clients(&chunks) {
                    warn!("ack to app not delivered");
                }
            }
            OperationMode::Bridge | OperationMode::Looper => {
                debug!("ack -> amp seq {:02X} sub {:02X}", owed.sequence, owed.sub_command);
                let chunks = self.encoder.ack(owed.sequence, owed.sub_command, Direction::ToAmp);
                if !self.send_message(&chunks) {
                    warn!("ack to amp not delivered");
                }
            }
            OperationMode::KeyboardOnly => {}
        }
    }

    // ── Emulated amp ──────────────────────────────────────────

    fn handle_amp_mode_request(&mut self, cmd: &ReassembledCommand) {
        match (Command::from_u8(cmd.command), &cmd.content) {
            (Some(Command::Write), Content::Preset(preset)) => {
                info!("Preset '{}' received from app", preset.name);
                manager::receive_app_preset(&mut self.ctx, preset.clone());
                self.reassembler.reset_preset_updated();
                self.reassembler.reset_preset_number_updated();
            }
            (Some(Command::Read), _) => match AmpRequest::from_sub_command(cmd.sub_command) {
                Some(request) => {
                    debug!("answering {request:?} seq {:02X}", cmd.sequence);
                    let chunks = self.encoder.amp_response(
                        cmd.sequence,
                        request,
                        &self.ctx.active_preset,
                        self.ctx.active_slot,
                    );
                    if !self.transport.notify_clients(&chunks) {
                        warn!("response to {request:?} not delivered");
                    }
                }
                None => info!("no emulated response for sub {:02X}", cmd.sub_command),
            },
            _ => debug!("request {:02X}/{:02X} ignored", cmd.command, cmd.sub_command),
        }
        self.reassembler.reset_last_kind();
    }

    // ── Bridge / looper ───────────────────────────────────────

    fn handle_app_mode_response(&mut self, cmd: &ReassembledCommand) {
        match &cmd.content {
            Content::HwPresetNumber(n @ 1..=4) => {
                info!("Amp reports HW preset {n}");
                self.ctx.active_bank = 0;
                self.ctx.pending_bank = 0;
                self.ctx.active_slot = *n;
            }
            Content::HwPresetNumber(n) => debug!("custom preset echo {n}, numbering unchanged"),
            Content::AmpName(name) => {
                if self.encoder.configure_for_amp(name) {
                    info!("Amp identified as '{name}'");
                } else {
                    warn!("Unknown amp '{name}', keeping framing");
                }
            }
            _ => {}
        }
        self.reassembler.reset_last_kind();
    }

    // ── Inbound acks ──────────────────────────────────────────

    fn handle_incoming_ack(&mut self) {
        let Some(ack) = self.reassembler.take_last_ack() else {
            return;
        };
        debug!("ack <- seq {:02X} sub {:02X}", ack.sequence, ack.sub_command);
        match SubCommand::from_u8(ack.sub_command) {
            Some(SubCommand::Preset) => {
                if self.ctx.custom_preset_number_change_pending {
                    let chunks =
                        self.encoder.change_hardware_preset(self.ctx.sequence(), CUSTOM_SLOT);
                    if !self.send_message(&chunks) {
                        warn!("select custom slot not delivered");
                    }
                    self.ctx.custom_preset_number_change_pending = false;
                    self.ctx.commit_pending();
                }
            }
            Some(SubCommand::ChangeHwPreset) => {
                self.get_current_preset_from_amp();
                self.ctx.commit_pending();
            }
            Some(SubCommand::EffectOnOff) => self.ctx.commit_pending(),
            _ => {}
        }
    }

    // ── Sending ───────────────────────────────────────────────

    /// Write `chunks` to the amp.  The sequence number advances even when
    /// the write fails.
    pub(super) fn send_message(&mut self, chunks: &[Vec<u8>]) -> bool {
        self.ctx.advance_sequence();
        self.transport.send_chunks(chunks, self.encoder.profile().paced)
    }

    /// Fetch the current preset, or hardware slot `n` while on bank 0.
    pub(super) fn get_current_preset_from_amp(&mut self) -> bool {
        let hw_slot = (self.ctx.pending_bank == 0).then_some(self.ctx.active_slot);
        let chunks = self.encoder.get_current_preset(self.ctx.sequence(), hw_slot);
        self.send_message(&chunks)
    }

    pub(super) fn get_amp_name(&mut self) -> bool {
        let chunks = self.encoder.get_amp_name(self.ctx.sequence());
        self.send_message(&chunks)
    }
}
