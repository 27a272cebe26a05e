//! Spark amp/app wire protocol.
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────┐   ┌────────────┐
//! │ BLE chunk │──▶│ Reassembler  │──▶│  codec   │──▶│  message   │
//! │ (≤ MTU)   │   │ block/frame  │   │ 7-bit +  │   │ typed      │
//! └───────────┘   │ splitting    │   │ checksum │   │ content    │
//!       ▲         └──────────────┘   └──────────┘   └────────────┘
//!       │                                                 │
//!       │         ┌──────────────┐                        │
//!       └─────────│   Encoder    │◀───────────────────────┘
//!                 │ framing      │   (payload builders)
//!                 │ profiles     │
//!                 └──────────────┘
//! ```
//!
//! A logical message is one or more frames `F0 01 seq chk cmd sub … F7`,
//! optionally wrapped in 16-byte blocks, cut into transport chunks.

pub mod codec;
pub mod command;
pub mod encoder;
pub mod message;
pub mod reassembler;

pub use command::{Command, Direction, SubCommand};
pub use encoder::{FramingProfile, MessageEncoder};
pub use message::{AmpRequest, Content};
pub use reassembler::{AckObligation, ChunkReassembler, InboundAck, MessageKind, ReassembledCommand};
