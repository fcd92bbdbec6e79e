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

// Topology/identity mapping: which tiles take part in a run, and which
// logical thread (and so which result slot) each tile core owns.

use crate::MAX_TILES;
use brg_reg_constants::platform::*;
use brg_tile_interface::{BrgError, CoreSlot, LogicalThreadId, TileCoordinate};

const BRG_TILES: [TileCoordinate; NUM_BRG_TILES] = {
    let mut tiles = [TileCoordinate::new(0, 0); NUM_BRG_TILES];
    let mut i = 0;
    while i < NUM_BRG_TILES {
        let (x, y) = BRG_TILE_COORDS[i];
        tiles[i] = TileCoordinate::new(x, y);
        i += 1;
    }
    tiles
};

// Core slots are 4 bits wide in the control-register address.
const MAX_CORES_PER_TILE: u8 = 16;

/// Ordered table of participating tiles. A tile's position in the table
/// is its tile index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Topology {
    tiles: &'static [TileCoordinate],
    cores_per_tile: u8,
}
impl Topology {
    pub const BRG: Topology = Topology {
        tiles: &BRG_TILES,
        cores_per_tile: BRG_CORES_PER_TILE as u8,
    };

    pub const fn new(tiles: &'static [TileCoordinate], cores_per_tile: u8) -> Self {
        Self {
            tiles,
            cores_per_tile,
        }
    }

    pub fn tiles(&self) -> &'static [TileCoordinate] { self.tiles }
    pub fn cores_per_tile(&self) -> u8 { self.cores_per_tile }
    pub fn num_threads(&self) -> usize { self.tiles.len() * self.cores_per_tile as usize }

    /// Checks the table can be used to partition result slots: every tile
    /// is listed once and fits the address fields, and the core count is
    /// addressable.
    pub fn validate(&self) -> Result<(), BrgError> {
        if let Some(tile) = self.tiles.get(MAX_TILES) {
            return Err(BrgError::InvalidTopology(*tile));
        }
        if self.cores_per_tile == 0 || self.cores_per_tile > MAX_CORES_PER_TILE {
            return Err(BrgError::InvalidCoreSlot {
                tile: self.tiles.first().copied().unwrap_or_default(),
                core: self.cores_per_tile,
            });
        }
        for (i, tile) in self.tiles.iter().enumerate() {
            if tile.x > 0xf || tile.y > 0xf || self.tiles[..i].contains(tile) {
                return Err(BrgError::InvalidTopology(*tile));
            }
        }
        Ok(())
    }

    pub fn tile_index(&self, tile: TileCoordinate) -> Result<usize, BrgError> {
        self.tiles
            .iter()
            .position(|t| *t == tile)
            .ok_or(BrgError::InvalidTopology(tile))
    }

    /// `tile_index * cores_per_tile + core`.
    pub fn thread_id(&self, tile: TileCoordinate, core: CoreSlot) -> Result<LogicalThreadId, BrgError> {
        let index = self.tile_index(tile)?;
        if core >= self.cores_per_tile {
            return Err(BrgError::InvalidCoreSlot { tile, core });
        }
        Ok(index * self.cores_per_tile as usize + core as usize)
    }

    /// Inverse of `thread_id`.
    pub fn locate(&self, thread_id: LogicalThreadId) -> Result<(TileCoordinate, CoreSlot), BrgError> {
        let cores = self.cores_per_tile as usize;
        if cores == 0 {
            return Err(BrgError::InvalidThreadId(thread_id));
        }
        let tile = self
            .tiles
            .get(thread_id / cores)
            .ok_or(BrgError::InvalidThreadId(thread_id))?;
        Ok((*tile, (thread_id % cores) as CoreSlot))
    }
}
impl Default for Topology {
    fn default() -> Self { Self::BRG }
}

/// Who is asking: a host hart, or a core on a tile.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Identity {
    Host { thread: usize },
    Tile { tile: TileCoordinate, core: CoreSlot },
}

/// What an execution context does in a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// Wakes and awaits the tiles.
    Initiator,
    /// A host thread with nothing to do; exits with success.
    Bystander,
    /// A tile core that runs the payload into its own result slot.
    Worker {
        tile: TileCoordinate,
        core: CoreSlot,
        thread_id: LogicalThreadId,
    },
}
