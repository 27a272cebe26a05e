//! Outbound message construction and fragmentation.
//!
//! Frames are built from an 8-bit payload, then framed for transport
//! according to the active [`FramingProfile`]:
//!
//! ```text
//! with header:     [hdr][frame][frame]…  ≤ block size, one chunk per block
//! without header:  frame frame frame …   cut every `max_block` bytes
//! ```

extern crate alloc;
use alloc::vec::Vec;

use log::debug;

use super::codec::{checksum, pack_7bit};
use super::command::{
    BLOCK_HEADER_LEN, BLOCK_MAGIC, Command, Direction, FRAME_VERSION, MSG_END, MSG_START,
    SubCommand, carries_sub_header,
};
use super::message::{self, AmpRequest};
use crate::preset::Preset;

/// Payload bytes per frame when answering as the amp.
const FROM_AMP_CHUNK: usize = 0x19;
/// Block size when answering as the amp.
const FROM_AMP_BLOCK: usize = 0x6A;

/// Chunking parameters for messages sent toward the amp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingProfile {
    /// 8-bit payload bytes per frame.
    pub max_chunk: usize,
    /// Bytes per block (header on) or per transport chunk (header off).
    pub max_block: usize,
    pub with_header: bool,
    /// Sends must be spaced out by the transport.
    pub paced: bool,
}

impl FramingProfile {
    pub const SPARK_40: Self = Self {
        max_chunk: 0x80,
        max_block: 0xAD,
        with_header: true,
        paced: false,
    };

    pub const SPARK_MINI: Self = Self {
        max_chunk: 0x27,
        max_block: 0x14,
        with_header: false,
        paced: true,
    };

    /// Profile used by the emulated amp toward the app.
    pub const FROM_AMP: Self = Self {
        max_chunk: FROM_AMP_CHUNK,
        max_block: FROM_AMP_BLOCK,
        with_header: true,
        paced: false,
    };

    /// Known amp models.  `None` for anything else.
    pub fn for_amp_name(name: &str) -> Option<Self> {
        match name {
            "Spark 40" => Some(Self::SPARK_40),
            "Spark MINI" | "Spark GO" => Some(Self::SPARK_MINI),
            _ => None,
        }
    }
}

impl Default for FramingProfile {
    fn default() -> Self {
        Self::SPARK_40
    }
}

/// Builds framed, chunked messages.  Sequence numbers are supplied by
/// the caller.
#[derive(Debug, Clone, Default)]
pub struct MessageEncoder {
    profile: FramingProfile,
}

impl MessageEncoder {
    pub fn new(profile: FramingProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> FramingProfile {
        self.profile
    }

    /// Reconfigure for the named amp.  Unknown names keep the current
    /// profile and return `false`.
    pub fn configure_for_amp(&mut self, name: &str) -> bool {
        match FramingProfile::for_amp_name(name) {
            Some(profile) => {
                debug!("encoder: profile for {name}: {profile:?}");
                self.profile = profile;
                true
            }
            None => false,
        }
    }

    fn profile_for(&self, dir: Direction) -> FramingProfile {
        match dir {
            Direction::ToAmp => self.profile,
            Direction::FromAmp => FramingProfile::FROM_AMP,
        }
    }

    /// Encode one logical message into transport chunks.
    pub fn encode(
        &self,
        sequence: u8,
        cmd: Command,
        sub: u8,
        payload: &[u8],
        dir: Direction,
    ) -> Vec<Vec<u8>> {
        let profile = self.profile_for(dir);
        let frames: Vec<Vec<u8>> = if carries_sub_header(cmd as u8, sub) {
            let parts: Vec<&[u8]> = if payload.is_empty() {
                alloc::vec![payload]
            } else {
                payload.chunks(profile.max_chunk).collect()
            };
            let count = parts.len() as u8;
            parts
                .iter()
                .enumerate()
                .map(|(i, part)| {
                    let mut data = Vec::with_capacity(part.len() + 3);
                    data.extend_from_slice(&[count, i as u8, part.len() as u8]);
                    data.extend_from_slice(part);
                    frame(sequence, cmd as u8, sub, &data)
                })
                .collect()
        } else {
            alloc::vec![frame(sequence, cmd as u8, sub, payload)]
        };

        if profile.with_header {
            into_blocks(&frames, dir, profile.max_block)
        } else {
            frames
                .concat()
                .chunks(profile.max_block)
                .map(<[u8]>::to_vec)
                .collect()
        }
    }

    // ── Builders ─────────────────────────────────────────────

    pub fn ack(&self, sequence: u8, sub: u8, dir: Direction) -> Vec<Vec<u8>> {
        self.encode(sequence, Command::Ack, sub, &[], dir)
    }

    pub fn change_hardware_preset(&self, sequence: u8, number: u8) -> Vec<Vec<u8>> {
        self.encode(
            sequence,
            Command::Write,
            SubCommand::ChangeHwPreset as u8,
            &message::hw_preset_payload(number),
            Direction::ToAmp,
        )
    }

    /// `hw_slot = None` asks for the preset currently loaded.
    pub fn get_current_preset(&self, sequence: u8, hw_slot: Option<u8>) -> Vec<Vec<u8>> {
        self.encode(
            sequence,
            Command::Read,
            SubCommand::Preset as u8,
            &message::current_preset_request(hw_slot),
            Direction::ToAmp,
        )
    }

    pub fn turn_effect_onoff(&self, sequence: u8, name: &str, on: bool) -> Vec<Vec<u8>> {
        self.encode(
            sequence,
            Command::Write,
            SubCommand::EffectOnOff as u8,
            &message::effect_payload(name, on),
            Direction::ToAmp,
        )
    }

    /// Upload a preset to the amp, or send it to the app as the amp.
    pub fn create_preset(&self, preset: &Preset, dir: Direction, sequence: u8) -> Vec<Vec<u8>> {
        let cmd = match dir {
            Direction::ToAmp => Command::Write,
            Direction::FromAmp => Command::Response,
        };
        self.encode(sequence, cmd, SubCommand::Preset as u8, &message::preset_payload(preset), dir)
    }

    pub fn get_amp_name(&self, sequence: u8) -> Vec<Vec<u8>> {
        self.encode(sequence, Command::Read, SubCommand::AmpName as u8, &[], Direction::ToAmp)
    }

    /// Emulated-amp answer to `request`, echoing the request's sequence.
    pub fn amp_response(
        &self,
        sequence: u8,
        request: AmpRequest,
        active: &Preset,
        active_slot: u8,
    ) -> Vec<Vec<u8>> {
        self.encode(
            sequence,
            Command::Response,
            request.sub_command() as u8,
            &request.response_payload(active, active_slot),
            Direction::FromAmp,
        )
    }
}

/// `F0 01 seq chk cmd sub <packed> F7`
fn frame(sequence: u8, cmd: u8, sub: u8, data: &[u8]) -> Vec<u8> {
    let packed = pack_7bit(data);
    let mut out = Vec::with_capacity(packed.len() + 7);
    out.extend_from_slice(&[MSG_START, FRAME_VERSION, sequence, checksum(&packed), cmd, sub]);
    out.extend_from_slice(&packed);
    out.push(MSG_END);
    out
}

fn block_header(dir: Direction, len: usize) -> [u8; BLOCK_HEADER_LEN] {
    let mut hdr = [0u8; BLOCK_HEADER_LEN];
    hdr[..2].copy_from_slice(&BLOCK_MAGIC);
    hdr[4..6].copy_from_slice(&dir.bytes());
    hdr[6] = len as u8;
    hdr
}

/// Pack whole frames into blocks of at most `max_block` bytes.
fn into_blocks(frames: &[Vec<u8>], dir: Direction, max_block: usize) -> Vec<Vec<u8>> {
    let mut blocks = Vec::new();
    let mut body: Vec<u8> = Vec::new();
    for f in frames {
        if !body.is_empty() && BLOCK_HEADER_LEN + body.len() + f.len() > max_block {
            blocks.push(seal_block(&body, dir));
            body.clear();
        }
        body.extend_from_slice(f);
    }
    if !body.is_empty() {
        blocks.push(seal_block(&body, dir));
    }
    blocks
}

fn seal_block(body: &[u8], dir: Direction) -> Vec<u8> {
    let total = BLOCK_HEADER_LEN + body.len();
    let mut block = Vec::with_capacity(total);
    block.extend_from_slice(&block_header(dir, total));
    block.extend_from_slice(body);
    block
}
