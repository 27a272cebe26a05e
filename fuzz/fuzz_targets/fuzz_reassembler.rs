//! Fuzz target: `ChunkReassembler::feed`
//!
//! Splits arbitrary bytes into chunks at every `F7` and feeds them to the
//! reassembler.  It must never panic, and every command it yields must
//! carry an ack obligation exactly when its kind requires one.
//!
//! cargo fuzz run fuzz_reassembler

#![no_main]

use ignitron::protocol::ChunkReassembler;
use ignitron::protocol::command::requires_ack;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut r = ChunkReassembler::new();

    for chunk in data.split_inclusive(|b| *b == 0xF7) {
        r.feed(chunk);
        while let Some(cmd) = r.next_command() {
            assert_eq!(
                cmd.ack.is_some(),
                requires_ack(cmd.command, cmd.sub_command),
                "ack obligation must follow the command type"
            );
        }
    }

    // After a clear the reassembler must accept bytes cleanly again.
    r.clear();
    r.feed(data);
    while r.next_command().is_some() {}
});
