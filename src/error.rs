//! Unified error types for the Ignitron firmware.
//!
//! The protocol core never lets an error cross a component boundary: decode
//! failures become an `Unrecognized` classification, transport failures are
//! reported as `false`, storage failures as enumerated outcomes.  The types
//! below are what those components use internally, and what adapters return
//! to the binary.  All variants are `Copy` so they can be logged and stored
//! without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A protocol message could not be decoded.
    Decode(DecodeError),
    /// A preset or configuration value could not be (de)serialised.
    Serialization,
    /// Filesystem access failed.
    Io,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Serialization => write!(f, "serialization failed"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(_: serde_json::Error) -> Self {
        Self::Serialization
    }
}

impl From<std::io::Error> for Error {
    fn from(_: std::io::Error) -> Self {
        Self::Io
    }
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// Why a reassembled message was classified as unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload ended before the field being read was complete.
    Truncated,
    /// A data byte or mask byte had bit 7 set inside 7-bit packed data.
    InvalidSevenBit,
    /// Frame checksum did not match the XOR of its data bytes.
    Checksum { expected: u8, actual: u8 },
    /// A chunk of a multi-chunk message arrived out of order.
    ChunkOrder,
    /// A type marker byte did not match what the field grammar allows.
    UnexpectedMarker(u8),
    /// A string field was not valid UTF-8.
    InvalidUtf8,
    /// The value does not fit the fixed-capacity container it is decoded into.
    TooLong,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "payload truncated"),
            Self::InvalidSevenBit => write!(f, "invalid 7-bit data"),
            Self::Checksum { expected, actual } => {
                write!(f, "checksum mismatch (expected {expected:02X}, got {actual:02X})")
            }
            Self::ChunkOrder => write!(f, "chunk out of order"),
            Self::UnexpectedMarker(b) => write!(f, "unexpected marker 0x{b:02X}"),
            Self::InvalidUtf8 => write!(f, "invalid UTF-8 string"),
            Self::TooLong => write!(f, "value too long"),
        }
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
