//! Ignitron firmware library.
//!
//! The Spark amp/app relay core: chunk reassembly, message encoding, the
//! preset and bank state, and the mode controller, plus the adapters that
//! connect them to the radio and flash.  ESP-IDF specific code is guarded
//! by `#[cfg(target_os = "espidf")]` so everything else runs on the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod preset;
pub mod protocol;
pub mod queue;
pub mod state;
