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

// Wakeup interrupt encoding and delivery.

use brg_reg_constants::wakeup::*;
use brg_tile_interface::{RegisterAccess, TileCoordinate};
use log::trace;
use modular_bitfield::prelude::*;
use spin::Mutex;

/// Layout of the word written to the wakeup mailbox, before byte swapping.
#[bitfield(bits = 64)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WakeupWord {
    pub trigger: bool,
    #[skip]
    _reserved0: B14,
    pub opcode: B3,
    pub tile_x: B8,
    pub tile_y: B8,
    #[skip]
    _reserved1: B29,
    pub valid: bool,
}
impl WakeupWord {
    /// The "wake" interrupt addressed to |tile|.
    pub fn wake(tile: TileCoordinate) -> Self {
        WakeupWord::new()
            .with_valid(true)
            .with_tile_y(tile.y)
            .with_tile_x(tile.x)
            .with_opcode(BRG_WAKEUP_OPCODE_WAKE)
            .with_trigger(true)
    }

    pub fn to_u64(self) -> u64 { u64::from_le_bytes(self.into_bytes()) }
    pub fn from_u64(word: u64) -> Self { WakeupWord::from_bytes(word.to_le_bytes()) }

    /// The value as it must appear on the mailbox bus.
    pub fn to_mailbox(self) -> u64 { self.to_u64().swap_bytes() }
    pub fn from_mailbox(word: u64) -> Self { WakeupWord::from_u64(word.swap_bytes()) }

    /// Returns the addressed tile if this is a valid, triggered wake request.
    pub fn wake_target(&self) -> Option<TileCoordinate> {
        if self.valid() && self.trigger() && self.opcode() == BRG_WAKEUP_OPCODE_WAKE {
            Some(TileCoordinate::new(self.tile_x(), self.tile_y()))
        } else {
            None
        }
    }
}

/// The fabric-wide inbound interrupt mailbox. At most one mailbox write is
/// ever in flight; the lock is held across the write.
pub struct WakeupMailbox {
    addr: u64,
    lock: Mutex<()>,
}
impl WakeupMailbox {
    pub const fn new() -> Self { Self::at(BRG_WAKEUP_MAILBOX_ADDR) }
    pub const fn at(addr: u64) -> Self {
        Self {
            addr,
            lock: Mutex::new(()),
        }
    }

    pub fn addr(&self) -> u64 { self.addr }

    /// Delivers the wake interrupt to |tile|. Fire and forget: exactly one
    /// mailbox write, no acknowledgement.
    pub fn send_wakeup<R: RegisterAccess + ?Sized>(&self, regs: &R, tile: TileCoordinate) {
        let word = WakeupWord::wake(tile).to_mailbox();
        let _guard = self.lock.lock();
        trace!("WAKE {} {:#018x} -> {:#x}", tile, word, self.addr);
        regs.write_register64(self.addr, word);
    }
}
impl Default for WakeupMailbox {
    fn default() -> Self { Self::new() }
}
