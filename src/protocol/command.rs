//! Command numbering and framing constants.

/// Start-of-frame marker.
pub const MSG_START: u8 = 0xF0;
/// End-of-message marker.  Never appears inside 7-bit data.
pub const MSG_END: u8 = 0xF7;
/// Second byte of every frame.
pub const FRAME_VERSION: u8 = 0x01;
/// Bytes before the packed data: `F0 01 seq chk cmd sub`.
pub const FRAME_HEADER_LEN: usize = 6;

/// First two bytes of a block header.
pub const BLOCK_MAGIC: [u8; 2] = [0x01, 0xFE];
pub const BLOCK_HEADER_LEN: usize = 16;

/// Which way a block travels.  Encoded in header bytes 4..6 and chosen
/// by the sender's role, not by the physical direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToAmp,
    FromAmp,
}

impl Direction {
    pub const fn bytes(self) -> [u8; 2] {
        match self {
            Self::ToAmp => [0x53, 0xFE],
            Self::FromAmp => [0x41, 0xFF],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Write = 0x01,
    Read = 0x02,
    Response = 0x03,
    Ack = 0x04,
}

impl Command {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::Write),
            0x02 => Some(Self::Read),
            0x03 => Some(Self::Response),
            0x04 => Some(Self::Ack),
            _ => None,
        }
    }
}

/// Subcommands the relay branches on.  Everything else travels as an
/// opaque number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubCommand {
    Preset = 0x01,
    AmpModel = 0x06,
    HwPresetNumber = 0x10,
    AmpName = 0x11,
    EffectOnOff = 0x15,
    SerialNumber = 0x23,
    HwChecksum = 0x2A,
    FirmwareVersion = 0x2F,
    ParamChange = 0x37,
    ChangeHwPreset = 0x38,
    Diagnostic71 = 0x71,
    Diagnostic72 = 0x72,
}

impl SubCommand {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x01 => Self::Preset,
            0x06 => Self::AmpModel,
            0x10 => Self::HwPresetNumber,
            0x11 => Self::AmpName,
            0x15 => Self::EffectOnOff,
            0x23 => Self::SerialNumber,
            0x2A => Self::HwChecksum,
            0x2F => Self::FirmwareVersion,
            0x37 => Self::ParamChange,
            0x38 => Self::ChangeHwPreset,
            0x71 => Self::Diagnostic71,
            0x72 => Self::Diagnostic72,
            _ => return None,
        })
    }
}

/// Whether the receiver of `(cmd, sub)` owes the sender an ack.
///
/// Every write is acked.  Of the amp's responses only the unsolicited
/// change notifications are.
pub fn requires_ack(cmd: u8, sub: u8) -> bool {
    match Command::from_u8(cmd) {
        Some(Command::Write) => true,
        Some(Command::Response) => matches!(
            SubCommand::from_u8(sub),
            Some(
                SubCommand::AmpModel
                    | SubCommand::EffectOnOff
                    | SubCommand::ParamChange
                    | SubCommand::ChangeHwPreset
            )
        ),
        _ => false,
    }
}

/// Preset transfers carry a `[count, index, len]` sub-header in every
/// frame so they can span several chunks.
pub fn carries_sub_header(cmd: u8, sub: u8) -> bool {
    sub == SubCommand::Preset as u8
        && matches!(Command::from_u8(cmd), Some(Command::Write | Command::Response))
}
