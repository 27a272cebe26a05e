//! Reassembly of transport chunks into logical commands.
//!
//! Chunks are buffered until one ends with the end-of-message marker.
//! Block headers are then dropped and the remaining stream is split into
//! frames.  A frame may straddle a block edge:
//!
//! ```text
//! chunk 1: [01 FE .. 16B header][F0 01 seq chk cmd sub data…
//! chunk 2: …data F7][F0 01 seq chk cmd sub data… F7]
//!                  ^ frame end              ^ chunk terminal
//! ```
//!
//! Preset transfers span several frames sharing one sequence number;
//! each frame carries `[count, index, len]` ahead of its data.  Any
//! incomplete tail stays buffered for the next chunk.
//!
//! Decode failures never escape: the command is classified
//! [`MessageKind::Unrecognized`] and still carries its ack obligation.

extern crate alloc;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

use log::{debug, warn};

use super::codec::{checksum, unpack_7bit};
use super::command::{
    BLOCK_HEADER_LEN, BLOCK_MAGIC, Command, Direction, FRAME_HEADER_LEN, MSG_END, MSG_START,
    carries_sub_header, requires_ack,
};
use super::message::{Content, decode_content};
use crate::error::DecodeError;
use crate::preset::Preset;

/// Upper bound on buffered bytes without a complete frame.
const MAX_PENDING_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `0x01` write or `0x02` read from the app.
    Request,
    /// `0x03` response or notification from the amp.
    CompleteResponse,
    Ack,
    Unrecognized,
}

impl MessageKind {
    fn classify(cmd: u8) -> Self {
        match Command::from_u8(cmd) {
            Some(Command::Write | Command::Read) => Self::Request,
            Some(Command::Response) => Self::CompleteResponse,
            Some(Command::Ack) => Self::Ack,
            None => Self::Unrecognized,
        }
    }
}

/// An ack the device owes the sender of an inbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckObligation {
    pub sequence: u8,
    pub command: u8,
    pub sub_command: u8,
}

/// An ack received from the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundAck {
    pub sequence: u8,
    pub sub_command: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReassembledCommand {
    pub sequence: u8,
    pub command: u8,
    pub sub_command: u8,
    /// Unpacked 8-bit payload, sub-headers stripped.
    pub payload: Vec<u8>,
    /// All frames of the command arrived in order.
    pub complete: bool,
    pub kind: MessageKind,
    pub content: Content,
    pub ack: Option<AckObligation>,
}

/// A multi-frame command in flight.
struct Partial {
    sequence: u8,
    command: u8,
    sub_command: u8,
    count: u8,
    next_index: u8,
    payload: Vec<u8>,
    failed: Option<DecodeError>,
}

impl Partial {
    fn new(sequence: u8, command: u8, sub_command: u8, count: u8) -> Self {
        Self {
            sequence,
            command,
            sub_command,
            count,
            next_index: 0,
            payload: Vec::new(),
            failed: None,
        }
    }

    fn matches(&self, sequence: u8, command: u8, sub_command: u8) -> bool {
        self.sequence == sequence && self.command == command && self.sub_command == sub_command
    }
}

/// Turns raw chunks into [`ReassembledCommand`]s and tracks the state the
/// controller polls: last message kind, last inbound ack and the
/// preset-changed flags.
pub struct ChunkReassembler {
    buffer: Vec<u8>,
    partial: Option<Partial>,
    ready: VecDeque<ReassembledCommand>,

    last_kind: Option<MessageKind>,
    last_sequence: u8,
    last_ack: Option<InboundAck>,

    preset_number_updated: bool,
    preset_updated: bool,
    current_preset_number: u8,
    current_setting: Option<Preset>,
    amp_name: heapless::String<32>,
}

impl ChunkReassembler {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            partial: None,
            ready: VecDeque::new(),
            last_kind: None,
            last_sequence: 0,
            last_ack: None,
            preset_number_updated: false,
            preset_updated: false,
            current_preset_number: 0,
            current_setting: None,
            amp_name: heapless::String::new(),
        }
    }

    /// Feed one transport chunk.  Returns the number of commands that
    /// became available through [`next_command`](Self::next_command).
    pub fn feed(&mut self, chunk: &[u8]) -> usize {
        self.buffer.extend_from_slice(chunk);
        if chunk.last() != Some(&MSG_END) {
            if self.buffer.len() > MAX_PENDING_BYTES {
                warn!("reassembler: {} bytes without terminator, discarding", self.buffer.len());
                self.buffer.clear();
            }
            return 0;
        }
        let before = self.ready.len();
        self.parse_buffer();
        self.ready.len() - before
    }

    /// Split the buffer into frames; keep an incomplete tail.
    fn parse_buffer(&mut self) {
        let buf = strip_block_headers(&core::mem::take(&mut self.buffer));
        let mut pos = 0;
        while pos < buf.len() {
            let rest = &buf[pos..];
            if rest[0] == MSG_START {
                let Some(end) = rest
                    .iter()
                    .skip(FRAME_HEADER_LEN)
                    .position(|b| *b == MSG_END)
                    .map(|i| i + FRAME_HEADER_LEN)
                else {
                    break;
                };
                self.accept_frame(&rest[..=end]);
                pos += end + 1;
            } else {
                debug!("reassembler: skipping stray byte {:02X}", rest[0]);
                pos += 1;
            }
        }
        if pos < buf.len() {
            self.buffer.extend_from_slice(&buf[pos..]);
        }
    }

    /// Handle one `F0 … F7` frame.
    fn accept_frame(&mut self, frame: &[u8]) {
        let (sequence, expected, cmd, sub) = (frame[2], frame[3], frame[4], frame[5]);
        let packed = &frame[FRAME_HEADER_LEN..frame.len() - 1];
        let actual = checksum(packed);
        let checksum_error =
            (actual != expected).then_some(DecodeError::Checksum { expected, actual });

        let data = match unpack_7bit(packed) {
            Ok(data) => data,
            Err(e) => {
                if self.partial.as_ref().is_some_and(|p| p.matches(sequence, cmd, sub)) {
                    self.partial = None;
                }
                self.complete(Partial::new(sequence, cmd, sub, 1), Some(e));
                return;
            }
        };

        if !carries_sub_header(cmd, sub) {
            let mut single = Partial::new(sequence, cmd, sub, 1);
            single.payload = data;
            self.complete(single, checksum_error);
            return;
        }

        let &[count, index, len, ..] = data.as_slice() else {
            self.complete(Partial::new(sequence, cmd, sub, 1), Some(DecodeError::Truncated));
            return;
        };
        let body = &data[3..];
        let mut error = checksum_error;
        if body.len() != len as usize {
            error.get_or_insert(DecodeError::Truncated);
        }

        let same_message = self.partial.as_ref().is_some_and(|p| p.matches(sequence, cmd, sub));
        if index == 0 || !same_message {
            self.abandon_partial();
            self.partial = Some(Partial::new(sequence, cmd, sub, count));
        }
        let Some(partial) = self.partial.as_mut() else {
            return;
        };
        if partial.next_index != index {
            // Keep collecting under a failed partial so the last chunk
            // still produces exactly one command.
            partial.failed.get_or_insert(DecodeError::ChunkOrder);
        }

        partial.payload.extend_from_slice(body);
        if let Some(e) = error {
            partial.failed.get_or_insert(e);
        }
        partial.next_index = index.saturating_add(1);

        debug!(
            "reassembler: seq {:02X} chunk {}/{} ({} bytes)",
            sequence,
            u16::from(index) + 1,
            count,
            body.len()
        );
        if partial.next_index >= partial.count {
            if let Some(done) = self.partial.take() {
                let failed = done.failed;
                self.complete(done, failed);
            }
        }
    }

    /// Flush a half-received command as unrecognized.
    fn abandon_partial(&mut self) {
        if let Some(stale) = self.partial.take() {
            warn!(
                "reassembler: abandoning seq {:02X} after {}/{} chunks",
                stale.sequence, stale.next_index, stale.count
            );
            self.complete(stale, Some(DecodeError::ChunkOrder));
        }
    }

    /// Classify, decode and queue a finished command.
    fn complete(&mut self, partial: Partial, failed: Option<DecodeError>) {
        let Partial { sequence, command, sub_command, payload, .. } = partial;
        let ack = requires_ack(command, sub_command).then_some(AckObligation {
            sequence,
            command,
            sub_command,
        });

        let decoded = match failed {
            Some(e) => Err(e),
            None => decode_content(command, sub_command, &payload),
        };
        let (kind, content) = match (MessageKind::classify(command), decoded) {
            (MessageKind::Unrecognized, _) => {
                warn!("reassembler: unknown command {command:02X}/{sub_command:02X}");
                (MessageKind::Unrecognized, Content::Opaque)
            }
            (kind, Ok(content)) => (kind, content),
            (_, Err(e)) => {
                warn!("reassembler: {command:02X}/{sub_command:02X} seq {sequence:02X}: {e}");
                (MessageKind::Unrecognized, Content::Opaque)
            }
        };

        if kind == MessageKind::CompleteResponse {
            match &content {
                Content::HwPresetNumber(n) => {
                    self.current_preset_number = *n;
                    self.preset_number_updated = true;
                }
                Content::Preset(p) => {
                    self.current_setting = Some(p.clone());
                    self.preset_updated = true;
                }
                Content::AmpName(name) => self.amp_name = name.clone(),
                _ => {}
            }
        }

        self.ready.push_back(ReassembledCommand {
            sequence,
            command,
            sub_command,
            payload,
            complete: failed.is_none(),
            kind,
            content,
            ack,
        });
    }

    /// Pop the next command and make it the "last message".
    pub fn next_command(&mut self) -> Option<ReassembledCommand> {
        let cmd = self.ready.pop_front()?;
        self.last_kind = Some(cmd.kind);
        self.last_sequence = cmd.sequence;
        if cmd.kind == MessageKind::Ack {
            self.last_ack = Some(InboundAck {
                sequence: cmd.sequence,
                sub_command: cmd.sub_command,
            });
        }
        Some(cmd)
    }

    pub fn last_kind(&self) -> Option<MessageKind> {
        self.last_kind
    }

    pub fn last_sequence(&self) -> u8 {
        self.last_sequence
    }

    pub fn reset_last_kind(&mut self) {
        self.last_kind = None;
    }

    /// Return the last inbound ack and forget it.
    pub fn take_last_ack(&mut self) -> Option<InboundAck> {
        self.last_ack.take()
    }

    pub fn is_preset_number_updated(&self) -> bool {
        self.preset_number_updated
    }

    pub fn reset_preset_number_updated(&mut self) {
        self.preset_number_updated = false;
    }

    pub fn is_preset_updated(&self) -> bool {
        self.preset_updated
    }

    pub fn reset_preset_updated(&mut self) {
        self.preset_updated = false;
    }

    pub fn current_preset_number(&self) -> u8 {
        self.current_preset_number
    }

    /// Last preset reported by the amp.
    pub fn current_setting(&self) -> Option<&Preset> {
        self.current_setting.as_ref()
    }

    pub fn amp_name(&self) -> &str {
        &self.amp_name
    }

    /// Discard buffered bytes and any half-received command.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.partial = None;
    }

    pub fn is_active(&self) -> bool {
        !self.buffer.is_empty() || self.partial.is_some()
    }
}

/// Length of the block whose header starts `bytes`, if one does.
fn block_len(bytes: &[u8]) -> Option<usize> {
    let header = bytes.get(..BLOCK_HEADER_LEN)?;
    let known_direction = [Direction::ToAmp, Direction::FromAmp]
        .iter()
        .any(|d| header[4..6] == d.bytes());
    let len = usize::from(header[6]);
    let is_header = header.starts_with(&BLOCK_MAGIC)
        && header[2..4] == [0, 0]
        && known_direction
        && len >= BLOCK_HEADER_LEN;
    is_header.then_some(len)
}

/// Drop every block header, leaving the frame stream.  Frames may run
/// across block edges, so a header can sit in the middle of a frame.
/// The header's length byte bounds the body that follows it; a body cut
/// short by the end of the buffer continues in the next chunk.
fn strip_block_headers(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut pos = 0;
    while pos < raw.len() {
        match block_len(&raw[pos..]) {
            Some(len) => {
                let end = (pos + len).min(raw.len());
                out.extend_from_slice(&raw[pos + BLOCK_HEADER_LEN..end]);
                pos = end;
            }
            None => {
                out.push(raw[pos]);
                pos += 1;
            }
        }
    }
    out
}

impl Default for ChunkReassembler {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────
