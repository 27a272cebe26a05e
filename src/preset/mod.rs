//! Preset and pedal data model.
//!
//! A [`Preset`] is identified by `(bank, slot)`.  Bank 0 is the amplifier's
//! own hardware bank; banks `1..=N` map to presets stored in the local
//! library.  Pedal order is significant and survives every round-trip
//! (wire payload and JSON).
//!
//! Presets are replaced wholesale on bank/preset changes.  The only
//! field-level mutation is a pedal's on/off flag during effect toggling.

pub mod manager;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Index of the drive pedal in the fixed seven-pedal chain.
pub const DRIVE_PEDAL_INDEX: usize = 2;

/// Number of preset slots per bank.
pub const SLOTS_PER_BANK: u8 = 4;

/// One effect in the signal chain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Pedal {
    /// Stable identifier of the effect model, e.g. `"Booster"`.
    pub name: String,
    pub is_on: bool,
    /// Parameter values in amplifier order.  Opaque to the relay.
    pub parameters: Vec<f32>,
}

/// A complete tone configuration.
///
/// The serialised text form is not stored alongside the fields; it is
/// rendered from them by [`to_json`](Self::to_json) whenever needed, so it
/// can never go stale after a pedal toggle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Preset {
    #[serde(skip)]
    pub bank: u8,
    #[serde(skip)]
    pub slot: u8,
    #[serde(rename = "UUID")]
    pub uuid: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub icon: String,
    #[serde(rename = "BPM")]
    pub bpm: f32,
    pub pedals: Vec<Pedal>,
    pub filler: u8,
    /// Sentinel for "no such preset".  Never serialised.
    #[serde(skip)]
    pub is_empty: bool,
}

impl Preset {
    /// The "no such preset" sentinel for a given location.
    pub fn empty(bank: u8, slot: u8) -> Self {
        Self {
            bank,
            slot,
            is_empty: true,
            ..Self::default()
        }
    }

    /// Parse the JSON representation used by the preset library.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialise to the JSON representation used by the preset library.
    /// Derived from the current fields on every call.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Return a copy placed at another library location.
    pub fn at(mut self, bank: u8, slot: u8) -> Self {
        self.bank = bank;
        self.slot = slot;
        self
    }

    /// Two presets are interchangeable only if their pedal chains are deeply equal.
    pub fn same_configuration(&self, other: &Self) -> bool {
        self.pedals == other.pedals
    }

    pub fn pedal(&self, index: usize) -> Option<&Pedal> {
        self.pedals.get(index)
    }

    /// Set the on/off flag of the first pedal called `name`.
    /// Returns `false` if the preset has no such pedal.
    pub fn set_pedal_on(&mut self, name: &str, on: bool) -> bool {
        match self.pedals.iter_mut().find(|p| p.name == name) {
            Some(pedal) => {
                pedal.is_on = on;
                true
            }
            None => false,
        }
    }
}
