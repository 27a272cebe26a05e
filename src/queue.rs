//! Ingestion queue between the radio callback and the main loop.
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ BLE notification │────▶│              │     │              │
//! │ GATT write       │────▶│ IngestQueue  │────▶│  Main loop   │
//! │ (radio task)     │     │   (FIFO)     │     │  (consumer)  │
//! └──────────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! The producer only copies the chunk in; all protocol work happens on
//! the consumer side.  The lock is held just long enough to push or pop
//! one chunk.  The queue is unbounded: running out of heap is a process
//! level failure, not something the relay handles.

extern crate alloc;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// FIFO of raw transport chunks.  Usable from a `static`.
pub struct IngestQueue {
    inner: Mutex<CriticalSectionRawMutex, RefCell<VecDeque<Vec<u8>>>>,
}

impl IngestQueue {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Copy a chunk in.  Safe to call from the radio callback.
    pub fn push(&self, chunk: &[u8]) {
        self.inner.lock(|q| q.borrow_mut().push_back(chunk.to_vec()));
    }

    /// Oldest chunk, if any.
    pub fn pop(&self) -> Option<Vec<u8>> {
        self.inner.lock(|q| q.borrow_mut().pop_front())
    }

    /// Pop chunks one at a time into `handler` until the queue is empty.
    /// Chunks pushed while draining are processed in the same call.
    pub fn drain(&self, mut handler: impl FnMut(Vec<u8>)) {
        while let Some(chunk) = self.pop() {
            handler(chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock(|q| q.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock(|q| q.borrow_mut().clear());
    }
}

impl Default for IngestQueue {
    fn default() -> Self {
        Self::new()
    }
}
