//! 7-bit packing, frame checksum and payload field primitives.
//!
//! Packed layout, repeated per group of up to seven data bytes:
//! ```text
//! ┌──────┬────┬────┬─────┬────┐
//! │ mask │ d0 │ d1 │ ... │ d6 │   mask bit i = bit 7 of d_i
//! └──────┴────┴────┴─────┴────┘
//! ```
//! Every transmitted byte has bit 7 clear, so `0xF0`/`0xF7` can only
//! appear as frame markers.

extern crate alloc;
use alloc::vec::Vec;

use crate::error::DecodeError;

const GROUP: usize = 7;

// ── Field markers ─────────────────────────────────────────────
const SHORT_STRING: u8 = 0xA0;
const LONG_STRING: u8 = 0xD9;
const STRING16: u8 = 0xDA;
const FLOAT32: u8 = 0xCA;
const UINT32: u8 = 0xCE;
const ARRAY: u8 = 0x90;
const ARRAY16: u8 = 0xDC;
const ON: u8 = 0xC3;
const OFF: u8 = 0xC2;

/// Longest string a `0xA0 + len` marker can describe.
const SHORT_STRING_MAX: usize = 0x1F;
/// Longest array a `0x90 + len` marker can describe.
const SHORT_ARRAY_MAX: usize = 0x0F;

/// Pack 8-bit data into masked 7-bit groups.
pub fn pack_7bit(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len().div_ceil(GROUP));
    for group in data.chunks(GROUP) {
        let mask = group
            .iter()
            .enumerate()
            .fold(0u8, |m, (i, b)| m | ((b >> 7) << i));
        out.push(mask);
        out.extend(group.iter().map(|b| b & 0x7F));
    }
    out
}

/// Reverse of [`pack_7bit`].
pub fn unpack_7bit(packed: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if packed.iter().any(|b| b & 0x80 != 0) {
        return Err(DecodeError::InvalidSevenBit);
    }
    let mut out = Vec::with_capacity(packed.len());
    for group in packed.chunks(GROUP + 1) {
        let (mask, data) = (group[0], &group[1..]);
        if data.is_empty() && mask != 0 {
            return Err(DecodeError::Truncated);
        }
        out.extend(
            data.iter()
                .enumerate()
                .map(|(i, b)| b | (((mask >> i) & 1) << 7)),
        );
    }
    Ok(out)
}

/// XOR over the packed data bytes of one frame.
pub fn checksum(packed: &[u8]) -> u8 {
    packed.iter().fold(0, |acc, b| acc ^ b)
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Builds an unpacked 8-bit payload field by field.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: Vec<u8>,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn byte(&mut self, b: u8) -> &mut Self {
        self.buf.push(b);
        self
    }

    pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(b);
        self
    }

    /// `0xA0+len` up to 31 bytes, `0xD9 len` up to 255, then
    /// `0xDA len16`.  Strings longer than `u16::MAX` are cut there.
    pub fn string(&mut self, s: &str) -> &mut Self {
        let raw = &s.as_bytes()[..s.len().min(u16::MAX as usize)];
        match u8::try_from(raw.len()) {
            Ok(len) if raw.len() <= SHORT_STRING_MAX => self.buf.push(SHORT_STRING + len),
            Ok(len) => self.buf.extend_from_slice(&[LONG_STRING, len]),
            Err(_) => {
                self.buf.push(STRING16);
                self.buf.extend_from_slice(&(raw.len() as u16).to_be_bytes());
            }
        }
        self.buf.extend_from_slice(raw);
        self
    }

    /// A length byte ahead of a [`string`](Self::string).  The byte
    /// saturates at `0xFF`; the string marker carries the real length.
    pub fn prefixed_string(&mut self, s: &str) -> &mut Self {
        self.buf.push(s.len().min(u8::MAX as usize) as u8);
        self.string(s)
    }

    pub fn float(&mut self, v: f32) -> &mut Self {
        self.buf.push(FLOAT32);
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn uint32(&mut self, v: u32) -> &mut Self {
        self.buf.push(UINT32);
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn on_off(&mut self, on: bool) -> &mut Self {
        self.buf.push(if on { ON } else { OFF });
        self
    }

    /// `0x90+len` up to 15 elements, `0xDC len16` beyond.
    pub fn array_header(&mut self, len: usize) -> &mut Self {
        if len <= SHORT_ARRAY_MAX {
            self.buf.push(ARRAY + len as u8);
        } else {
            self.buf.push(ARRAY16);
            self.buf.extend_from_slice(&(len.min(u16::MAX as usize) as u16).to_be_bytes());
        }
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.buf)
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Cursor over an unpacked payload.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn byte(&mut self) -> Result<u8, DecodeError> {
        let b = *self.data.get(self.pos).ok_or(DecodeError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).ok_or(DecodeError::Truncated)?;
        let slice = self.data.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn expect(&mut self, marker: u8) -> Result<(), DecodeError> {
        match self.byte()? {
            b if b == marker => Ok(()),
            b => Err(DecodeError::UnexpectedMarker(b)),
        }
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        let raw = self.take(2)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    pub fn string(&mut self) -> Result<&'a str, DecodeError> {
        let len = match self.byte()? {
            LONG_STRING => self.byte()? as usize,
            STRING16 => self.u16()? as usize,
            m @ SHORT_STRING..=0xBF => (m - SHORT_STRING) as usize,
            m => return Err(DecodeError::UnexpectedMarker(m)),
        };
        core::str::from_utf8(self.take(len)?).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Reads a length byte then a string; the two lengths must agree.
    pub fn prefixed_string(&mut self) -> Result<&'a str, DecodeError> {
        let prefix = self.byte()?;
        let marker_at = self.pos;
        let s = self.string()?;
        if usize::from(prefix) != s.len().min(u8::MAX as usize) {
            return Err(DecodeError::UnexpectedMarker(self.data[marker_at]));
        }
        Ok(s)
    }

    pub fn float(&mut self) -> Result<f32, DecodeError> {
        self.expect(FLOAT32)?;
        let raw = self.take(4)?;
        Ok(f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn on_off(&mut self) -> Result<bool, DecodeError> {
        match self.byte()? {
            ON => Ok(true),
            OFF => Ok(false),
            b => Err(DecodeError::UnexpectedMarker(b)),
        }
    }

    pub fn array_header(&mut self) -> Result<usize, DecodeError> {
        match self.byte()? {
            m @ ARRAY..=0x9F => Ok((m - ARRAY) as usize),
            ARRAY16 => Ok(self.u16()? as usize),
            m => Err(DecodeError::UnexpectedMarker(m)),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
