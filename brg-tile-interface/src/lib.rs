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

#![cfg_attr(not(test), no_std)]

//! Data structures and capability traits shared by the BRG host
//! (initiator) code, the tile-core code, and the fake fabric.

use core::fmt;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

mod error;
mod workload;

pub use error::*;
pub use workload::*;

/// Index of a core within a tile; only the low 4 bits reach the hardware.
pub type CoreSlot = u8;

/// Position of an execution context in the shared results table.
pub type LogicalThreadId = usize;

/// Cycle counter value.
pub type Ticks = u64;

/// A tile in the 2-D fabric grid. Each coordinate is 4 bits wide in the
/// control-register address; wider values are masked, not rejected.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TileCoordinate {
    pub x: u8,
    pub y: u8,
}
impl TileCoordinate {
    pub const fn new(x: u8, y: u8) -> Self { Self { x, y } }
}
impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "({}, {})", self.x, self.y) }
}
impl From<(u8, u8)> for TileCoordinate {
    fn from((x, y): (u8, u8)) -> Self { Self::new(x, y) }
}

/// Control registers in each core's bank. Discriminants are the byte
/// offsets placed in the low 16 bits of the register address.
#[repr(u16)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
pub enum RegisterId {
    GoBit = 0x00,
    ResetPc = 0x04,
    ProcToHost = 0x08,
    HostToProc = 0x0c,
    AddrSextEn = 0x10,
    GoIfc = 0x14,
    DoneIfc = 0x18,
}
impl RegisterId {
    pub const ALL: [RegisterId; 7] = [
        RegisterId::GoBit,
        RegisterId::ResetPc,
        RegisterId::ProcToHost,
        RegisterId::HostToProc,
        RegisterId::AddrSextEn,
        RegisterId::GoIfc,
        RegisterId::DoneIfc,
    ];

    pub const fn offset(self) -> u16 { self as u16 }
}

/// Completion state latched in a tile's DONE_IFC register. Any value other
/// than RUNNING or SUCCESS reads as a failure.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
pub enum TileStatus {
    Running = 0,
    Success = 1,
    #[num_enum(default)]
    Failure = 2,
}
impl TileStatus {
    pub fn is_terminal(self) -> bool { self != TileStatus::Running }
}

/// Per-tile progress through the wake/poll protocol, as tracked by the
/// initiator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TilePhase {
    Idle,
    Armed,
    Awakened,
    Running,
    Success,
    Failure,
}
impl TilePhase {
    /// Returns true if moving from |self| to |next| is a legal step.
    pub fn can_advance_to(self, next: TilePhase) -> bool {
        use TilePhase::*;
        matches!(
            (self, next),
            (Idle, Armed)
                | (Armed, Awakened)
                | (Awakened, Running)
                | (Awakened, Success)
                | (Awakened, Failure)
                | (Running, Success)
                | (Running, Failure)
        )
    }

    pub fn is_terminal(self) -> bool { matches!(self, TilePhase::Success | TilePhase::Failure) }
}
impl From<TileStatus> for TilePhase {
    fn from(status: TileStatus) -> Self {
        match status {
            TileStatus::Running => TilePhase::Running,
            TileStatus::Success => TilePhase::Success,
            TileStatus::Failure => TilePhase::Failure,
        }
    }
}

/// Capability to access fabric registers. This is the only seam through
/// which software touches the hardware; implementations own any raw
/// pointer access.
pub trait RegisterAccess {
    fn read_register(&self, addr: u64) -> u32;
    fn write_register(&self, addr: u64, value: u32);
    // The wakeup mailbox is 64 bits wide.
    fn write_register64(&self, addr: u64, value: u64);
}

/// Busy-wait capability used between completion polls.
pub trait Delay {
    fn delay(&self, iterations: u32);
}

/// Free-running cycle counter.
pub trait Clock {
    fn now(&self) -> Ticks;
}

/// Exponential back-off parameters for completion polling.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BackoffConfig {
    pub initial: u32,
    pub max: u32,
}
impl BackoffConfig {
    pub const DEFAULT: BackoffConfig = BackoffConfig {
        initial: 2,
        max: 256,
    };
}
impl Default for BackoffConfig {
    fn default() -> Self { Self::DEFAULT }
}

/// Which side of the fabric this image runs on.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ArchVariant {
    /// Host (Ariane) core; thread 0 drives the tiles.
    #[default]
    Rv64,
    /// BRG tile core.
    Rv32,
}

/// What the initiator does once a tile reports something other than SUCCESS.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CompletionPolicy {
    /// Stop awaiting at the first failing tile.
    #[default]
    FailFast,
    /// Await every woken tile, then report the first failure.
    Drain,
}
