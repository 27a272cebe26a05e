//! Application core: the relay's domain logic, no I/O.
//!
//! The [`service::Controller`] owns the mode state machine and routes
//! every reassembled command by operation mode.  Radio, preset files,
//! persisted modes and the HID keyboard are reached only through the
//! **port traits** in [`ports`], so the whole core runs on the host
//! against mocks.

pub mod commands;
mod dispatch;
pub mod events;
pub mod ports;
pub mod service;
