//! Keyboard placeholder.
//!
//! The HID keyboard stack is not part of this firmware yet.  This
//! [`KeyboardPort`] tracks whether emulation was started and reports
//! itself as never connected, so key presses are skipped and logged.

use log::{debug, info};

use crate::app::ports::KeyboardPort;
use crate::config::KEYBOARD_DEVICE_NAME;

#[derive(Debug, Default)]
pub struct NullKeyboard {
    started: bool,
}

impl NullKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl KeyboardPort for NullKeyboard {
    fn start(&mut self) {
        if !self.started {
            info!("Keyboard: '{KEYBOARD_DEVICE_NAME}' not available on this build");
        }
        self.started = true;
    }

    fn end(&mut self) {
        self.started = false;
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn press(&mut self, key: u8) {
        debug!("Keyboard: press {key:#04x} dropped");
    }

    fn write(&mut self, key: u8) {
        debug!("Keyboard: write {key:#04x} dropped");
    }

    fn release(&mut self, key: u8) {
        debug!("Keyboard: release {key:#04x} dropped");
    }
}
