//! Fuzz target: `decode_content`
//!
//! Decodes arbitrary unpacked payloads under every command/sub-command
//! pair.  Decode failures must come back as errors, never panics.
//!
//! cargo fuzz run fuzz_payload_decode

#![no_main]

use ignitron::protocol::message::decode_content;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&[cmd, sub], payload)) = data.split_first_chunk::<2>() else {
        return;
    };
    let _ = decode_content(cmd, sub, payload);
});
