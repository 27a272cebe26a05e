//! Typed payloads for the command families the relay understands.

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

use super::codec::{PayloadReader, PayloadWriter};
use super::command::{Command, SubCommand};
use crate::error::DecodeError;
use crate::preset::{Pedal, Preset};

/// Serial number reported by the emulated amp.
pub const EMULATED_SERIAL: &str = "S999C999B999";
/// Firmware version reported by the emulated amp (1.10.8.27).
pub const EMULATED_FIRMWARE: u32 = 0x010A_081B;
/// Hardware preset checksums reported by the emulated amp.
pub const EMULATED_CHECKSUMS: [u8; 4] = [0x9A, 0xD6, 0xB6, 0x8B];

/// Zero-based wire value of the amp's temporary "custom" slot.
pub const CUSTOM_SLOT_WIRE: u8 = 0x7F;
/// Reported number of the custom slot (`0x7F + 1`).
pub const CUSTOM_SLOT: u8 = 128;

const PRESET_REQUEST_PADDING: usize = 30;

/// Structured content extracted from a reassembled payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Nothing the relay needs to look at.
    Opaque,
    Preset(Preset),
    /// One-based preset number (`128` = custom slot).
    HwPresetNumber(u8),
    AmpName(heapless::String<32>),
    EffectOnOff { name: String, on: bool },
}

/// Decode the content of a complete message.
pub fn decode_content(cmd: u8, sub: u8, payload: &[u8]) -> Result<Content, DecodeError> {
    let Some(command) = Command::from_u8(cmd) else {
        return Ok(Content::Opaque);
    };
    let mut r = PayloadReader::new(payload);
    match (command, SubCommand::from_u8(sub)) {
        (Command::Write | Command::Response, Some(SubCommand::Preset)) => {
            decode_preset(&mut r).map(Content::Preset)
        }
        (Command::Response, Some(SubCommand::HwPresetNumber | SubCommand::ChangeHwPreset)) => {
            let _bank = r.byte()?;
            let wire = r.byte()?;
            Ok(Content::HwPresetNumber(wire.saturating_add(1)))
        }
        (Command::Response, Some(SubCommand::AmpName)) => {
            let name = heapless::String::try_from(r.string()?).map_err(|_| DecodeError::TooLong)?;
            Ok(Content::AmpName(name))
        }
        (Command::Write | Command::Response, Some(SubCommand::EffectOnOff)) => {
            let name = String::from(r.prefixed_string()?);
            let on = r.on_off()?;
            Ok(Content::EffectOnOff { name, on })
        }
        _ => Ok(Content::Opaque),
    }
}

fn decode_preset(r: &mut PayloadReader<'_>) -> Result<Preset, DecodeError> {
    let _bank = r.byte()?;
    let _number = r.byte()?;
    let mut preset = Preset {
        uuid: r.string()?.into(),
        name: r.string()?.into(),
        version: r.string()?.into(),
        description: r.string()?.into(),
        icon: r.string()?.into(),
        bpm: r.float()?,
        ..Preset::default()
    };
    let pedal_count = r.array_header()?;
    preset.pedals.reserve(pedal_count.min(r.remaining()));
    for _ in 0..pedal_count {
        let name = r.string()?.into();
        let is_on = r.on_off()?;
        let param_count = r.array_header()?;
        let mut parameters = Vec::with_capacity(param_count.min(r.remaining()));
        for _ in 0..param_count {
            let _index = r.byte()?;
            r.expect(0x91)?;
            parameters.push(r.float()?);
        }
        preset.pedals.push(Pedal { name, is_on, parameters });
    }
    if r.remaining() > 0 {
        preset.filler = r.byte()?;
    }
    Ok(preset)
}

// ---------------------------------------------------------------------------
// Payload builders
// ---------------------------------------------------------------------------

pub fn preset_payload(preset: &Preset) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.bytes(&[0x00, CUSTOM_SLOT_WIRE])
        .string(&preset.uuid)
        .string(&preset.name)
        .string(&preset.version)
        .string(&preset.description)
        .string(&preset.icon)
        .float(preset.bpm)
        .array_header(preset.pedals.len());
    for pedal in &preset.pedals {
        w.string(&pedal.name)
            .on_off(pedal.is_on)
            .array_header(pedal.parameters.len());
        for (i, value) in pedal.parameters.iter().enumerate() {
            w.byte(i as u8).byte(0x91).float(*value);
        }
    }
    w.byte(preset.filler).finish()
}

/// `[0x00, n-1]`; slot 128 encodes as the custom slot `0x7F`.
pub fn hw_preset_payload(number: u8) -> Vec<u8> {
    alloc::vec![0x00, number.saturating_sub(1)]
}

/// Request for the preset currently loaded (`None`) or stored in a
/// hardware slot.
pub fn current_preset_request(hw_slot: Option<u8>) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    match hw_slot {
        Some(n) => w.bytes(&[0x00, n.saturating_sub(1)]),
        None => w.bytes(&[0x01, 0x00]),
    };
    w.bytes(&[0u8; PRESET_REQUEST_PADDING]).finish()
}

pub fn effect_payload(name: &str, on: bool) -> Vec<u8> {
    PayloadWriter::new().prefixed_string(name).on_off(on).finish()
}

// ---------------------------------------------------------------------------
// Emulated amp
// ---------------------------------------------------------------------------

/// Requests the emulated amp answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmpRequest {
    SerialNumber,
    FirmwareVersion,
    HwChecksum,
    HwPresetNumber,
    CurrentPreset,
    Diagnostic71,
    Diagnostic72,
}

impl AmpRequest {
    pub fn from_sub_command(sub: u8) -> Option<Self> {
        Some(match SubCommand::from_u8(sub)? {
            SubCommand::SerialNumber => Self::SerialNumber,
            SubCommand::FirmwareVersion => Self::FirmwareVersion,
            SubCommand::HwChecksum => Self::HwChecksum,
            SubCommand::HwPresetNumber => Self::HwPresetNumber,
            SubCommand::Preset => Self::CurrentPreset,
            SubCommand::Diagnostic71 => Self::Diagnostic71,
            SubCommand::Diagnostic72 => Self::Diagnostic72,
            _ => return None,
        })
    }

    pub const fn sub_command(self) -> SubCommand {
        match self {
            Self::SerialNumber => SubCommand::SerialNumber,
            Self::FirmwareVersion => SubCommand::FirmwareVersion,
            Self::HwChecksum => SubCommand::HwChecksum,
            Self::HwPresetNumber => SubCommand::HwPresetNumber,
            Self::CurrentPreset => SubCommand::Preset,
            Self::Diagnostic71 => SubCommand::Diagnostic71,
            Self::Diagnostic72 => SubCommand::Diagnostic72,
        }
    }

    /// Response payload for this request.
    pub fn response_payload(self, active: &Preset, active_slot: u8) -> Vec<u8> {
        let mut w = PayloadWriter::new();
        match self {
            Self::SerialNumber => w.string(EMULATED_SERIAL),
            Self::FirmwareVersion => w.uint32(EMULATED_FIRMWARE),
            Self::HwChecksum => {
                w.array_header(EMULATED_CHECKSUMS.len());
                for c in EMULATED_CHECKSUMS {
                    w.byte(0xCC).byte(c);
                }
                &mut w
            }
            Self::HwPresetNumber => return hw_preset_payload(active_slot),
            Self::CurrentPreset => return preset_payload(active),
            Self::Diagnostic71 => w.bytes(&[0x00, 0x00, 0x00]),
            Self::Diagnostic72 => w.bytes(&[0x00, 0x00]),
        };
        w.finish()
    }
}
