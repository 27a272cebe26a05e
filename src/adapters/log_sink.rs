//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one structured line per
//! [`AppEvent`] to the logger (UART / USB-CDC on the board).  A display
//! adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { mode, role } => {
                info!("START | mode={} role={:?}", mode.label(), role);
            }
            AppEvent::ModeChanged { mode, button_mode } => {
                info!("MODE | {} buttons={:?}", mode.label(), button_mode);
            }
            AppEvent::BankChanged { active, pending } => {
                info!("BANK | active={:02} pending={:02}", active, pending);
            }
            AppEvent::PresetChanged { bank, slot, name, effects } => {
                info!(
                    "PRESET | {:02}-{} '{}' fx=0b{:08b}",
                    bank, slot, name, effects
                );
            }
            AppEvent::PendingPresetChanged { bank, name } => {
                info!("PENDING | bank={:02} '{}'", bank, name);
            }
            AppEvent::EditModeChanged(mode) => {
                info!("EDIT | {:?}", mode);
            }
            AppEvent::EditResponse(msg) => {
                info!("EDIT | {}", msg);
            }
            AppEvent::AmpIdentified(name) => {
                info!("AMP | '{}'", name);
            }
            AppEvent::KeyboardKeySent { uid, label } => {
                info!("KEY | #{} {}", uid, label);
            }
            AppEvent::RestartRequested { reset_mode } => {
                warn!("RESTART | reset_mode={}", reset_mode);
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
