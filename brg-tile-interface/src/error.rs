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

use crate::{CoreSlot, LogicalThreadId, TileCoordinate, TilePhase};
use core::fmt;
use num_enum::{FromPrimitive, IntoPrimitive};

/// Terminal outcomes of a bring-up run. None of these are retried; they
/// are surfaced through the process exit code and a diagnostic line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BrgError {
    /// The coordinate is not in the fabric's tile table.
    InvalidTopology(TileCoordinate),
    /// The core slot is beyond the tile's core count.
    InvalidCoreSlot { tile: TileCoordinate, core: CoreSlot },
    /// DONE_IFC settled on something other than SUCCESS.
    TileFailure { tile: TileCoordinate, status: u32 },
    /// The tile was still RUNNING when the poll budget ran out.
    Timeout { tile: TileCoordinate, polls: u32 },
    InvalidThreadId(LogicalThreadId),
    SlotAlreadyWritten(LogicalThreadId),
    /// A tile was driven out of protocol order.
    ProtocolViolation { tile: TileCoordinate, phase: TilePhase },
}
impl fmt::Display for BrgError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BrgError::InvalidTopology(tile) => write!(f, "tile {} is not part of the fabric", tile),
            BrgError::InvalidCoreSlot { tile, core } => {
                write!(f, "core {} does not exist on tile {}", core, tile)
            }
            BrgError::TileFailure { tile, status } => {
                write!(f, "tile {} failed with status {}", tile, status)
            }
            BrgError::Timeout { tile, polls } => {
                write!(f, "tile {} still running after {} polls", tile, polls)
            }
            BrgError::InvalidThreadId(id) => write!(f, "thread id {} out of range", id),
            BrgError::SlotAlreadyWritten(id) => write!(f, "result slot {} already written", id),
            BrgError::ProtocolViolation { tile, phase } => {
                write!(f, "tile {} driven out of order while {:?}", tile, phase)
            }
        }
    }
}

/// Process exit status of the initiator.
#[repr(u8)]
#[derive(Debug, Default, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
pub enum BrgExitCode {
    Success = 0,
    TileFailure = 1,
    InvalidTopology = 2,
    Timeout = 3,
    #[default]
    UnknownError,
}

impl From<&BrgError> for BrgExitCode {
    fn from(err: &BrgError) -> BrgExitCode {
        match err {
            BrgError::TileFailure { .. } => BrgExitCode::TileFailure,
            BrgError::InvalidTopology(_)
            | BrgError::InvalidCoreSlot { .. }
            | BrgError::InvalidThreadId(_) => BrgExitCode::InvalidTopology,
            BrgError::Timeout { .. } => BrgExitCode::Timeout,
            BrgError::SlotAlreadyWritten(_) | BrgError::ProtocolViolation { .. } => {
                BrgExitCode::UnknownError
            }
        }
    }
}

impl<T> From<&Result<T, BrgError>> for BrgExitCode {
    fn from(result: &Result<T, BrgError>) -> BrgExitCode {
        match result {
            Ok(_) => BrgExitCode::Success,
            Err(e) => BrgExitCode::from(e),
        }
    }
}

impl From<BrgExitCode> for Result<(), BrgExitCode> {
    fn from(code: BrgExitCode) -> Result<(), BrgExitCode> {
        if code == BrgExitCode::Success {
            Ok(())
        } else {
            Err(code)
        }
    }
}
