// Copyright 2022 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Per-thread storage: write-once result slots and private memory slices,
// both addressed by LogicalThreadId.

use brg_tile_interface::{BrgError, LogicalThreadId, ThreadResult};
use core::slice::ChunksExactMut;
use spin::Once;

/// Fixed-capacity table of result slots. Each slot is written at most once,
/// by the thread that owns it; readers see either nothing or the complete
/// result.
pub struct ResultArena<const N: usize> {
    slots: [Once<ThreadResult>; N],
}
impl<const N: usize> ResultArena<N> {
    pub const fn new() -> Self {
        // NB: The repeat operand requires a const item.
        const INIT: Once<ThreadResult> = Once::new();
        Self { slots: [INIT; N] }
    }

    pub const fn capacity(&self) -> usize { N }

    /// Stores |result| in slot `result.thread_id`.
    pub fn publish(&self, result: ThreadResult) -> Result<(), BrgError> {
        let id = result.thread_id;
        let slot = self.slots.get(id).ok_or(BrgError::InvalidThreadId(id))?;
        let mut stored = false;
        slot.call_once(|| {
            stored = true;
            result
        });
        if stored {
            Ok(())
        } else {
            Err(BrgError::SlotAlreadyWritten(id))
        }
    }

    pub fn get(&self, id: LogicalThreadId) -> Option<&ThreadResult> { self.slots.get(id)?.get() }

    /// Number of slots written so far.
    pub fn populated(&self) -> usize { self.slots.iter().filter(|s| s.is_completed()).count() }

    /// Written slots in thread id order.
    pub fn iter(&self) -> impl Iterator<Item = &ThreadResult> { self.slots.iter().filter_map(Once::get) }
}
impl<const N: usize> Default for ResultArena<N> {
    fn default() -> Self { Self::new() }
}

/// A shared block split into equal, disjoint per-thread slices.
pub struct MemoryArena<'m> {
    block: &'m mut [u8],
    slice_len: usize,
}
impl<'m> MemoryArena<'m> {
    /// Trailing bytes that do not fill a whole slice are never handed out.
    pub fn new(block: &'m mut [u8], slice_len: usize) -> Self { Self { block, slice_len } }

    pub fn slice_len(&self) -> usize { self.slice_len }

    pub fn num_slices(&self) -> usize {
        match self.slice_len {
            0 => 0,
            len => self.block.len() / len,
        }
    }

    /// Borrows the private slice of thread |id|.
    pub fn slice_mut(&mut self, id: LogicalThreadId) -> Result<&mut [u8], BrgError> {
        if id >= self.num_slices() {
            return Err(BrgError::InvalidThreadId(id));
        }
        let start = id * self.slice_len;
        Ok(&mut self.block[start..start + self.slice_len])
    }

    /// Splits the block into every thread's slice at once, in thread id
    /// order, for handing to concurrently running threads.
    pub fn split(&mut self) -> ChunksExactMut<'_, u8> {
        // chunks_exact_mut panics on a zero length.
        let len = self.slice_len.max(1);
        let usable = if self.slice_len == 0 { 0 } else { self.block.len() };
        self.block[..usable].chunks_exact_mut(len)
    }
}
