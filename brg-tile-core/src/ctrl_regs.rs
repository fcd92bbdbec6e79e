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

// Control-register address resolution for BRG tile cores.

use brg_reg_constants::ctrl_regs::*;
use brg_tile_interface::{CoreSlot, RegisterId, TileCoordinate};
use core::fmt;
use modular_bitfield::prelude::*;

/// Physical address of one control register of one tile core.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CtrlRegAddr(pub u64);
impl fmt::Display for CtrlRegAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{:#x}", self.0) }
}
impl From<CtrlRegAddr> for u64 {
    fn from(addr: CtrlRegAddr) -> u64 { addr.0 }
}

// Field layout of a control-register address. The skipped ranges hold the
// set bits of BRG_CTRL_REGS_BASE_ADDR.
#[bitfield(bits = 64)]
pub struct CtrlRegFields {
    pub reg: B16,
    pub core: B4,
    #[skip]
    _base_lo: B4,
    pub tile_y: B4,
    pub tile_x: B4,
    #[skip]
    _base_hi: B32,
}

const FIELDS_MASK: u64 = (BRG_CTRL_REGS_REG_MASK << BRG_CTRL_REGS_REG_OFFSET)
    | (BRG_CTRL_REGS_CORE_MASK << BRG_CTRL_REGS_CORE_OFFSET)
    | (BRG_CTRL_REGS_TILE_Y_MASK << BRG_CTRL_REGS_TILE_Y_OFFSET)
    | (BRG_CTRL_REGS_TILE_X_MASK << BRG_CTRL_REGS_TILE_X_OFFSET);

/// Packs raw field values onto the fabric base. Out-of-range values are
/// truncated to their field width; nothing is rejected.
pub const fn ctrl_reg_addr_raw(x: u64, y: u64, core: u64, regnum: u64) -> u64 {
    BRG_CTRL_REGS_BASE_ADDR
        | ((x & BRG_CTRL_REGS_TILE_X_MASK) << BRG_CTRL_REGS_TILE_X_OFFSET)
        | ((y & BRG_CTRL_REGS_TILE_Y_MASK) << BRG_CTRL_REGS_TILE_Y_OFFSET)
        | ((core & BRG_CTRL_REGS_CORE_MASK) << BRG_CTRL_REGS_CORE_OFFSET)
        | ((regnum & BRG_CTRL_REGS_REG_MASK) << BRG_CTRL_REGS_REG_OFFSET)
}

/// Resolves the address of |reg| in the bank of |core| on |tile|.
pub const fn ctrl_reg_addr(tile: TileCoordinate, core: CoreSlot, reg: RegisterId) -> CtrlRegAddr {
    CtrlRegAddr(ctrl_reg_addr_raw(
        tile.x as u64,
        tile.y as u64,
        core as u64,
        reg.offset() as u64,
    ))
}

/// Splits a control-register address back into (tile, core, offset).
/// Returns None if |addr| is outside the control-register window.
pub fn decode_ctrl_reg_addr(addr: u64) -> Option<(TileCoordinate, CoreSlot, u16)> {
    if addr & !FIELDS_MASK != BRG_CTRL_REGS_BASE_ADDR {
        return None;
    }
    let fields = CtrlRegFields::from_bytes(addr.to_le_bytes());
    Some((
        TileCoordinate::new(fields.tile_x(), fields.tile_y()),
        fields.core(),
        fields.reg(),
    ))
}
