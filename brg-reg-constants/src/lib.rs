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

#![no_std]

//! Register definitions for the BRG tile fabric as seen from the host core.
//! These are the addressing ABI between software and the on-chip network;
//! every value here must match the hardware bit for bit.

/// Per-core control register bank of a BRG tile.
pub mod ctrl_regs {
    // Fabric-wide base of the control register window. Tile and core fields
    // are OR'ed onto this; none of its set bits overlap a field below.
    pub const BRG_CTRL_REGS_BASE_ADDR: u64 = 0xe1_00a0_0000;

    pub const BRG_CTRL_REGS_REG_OFFSET: u32 = 0;
    pub const BRG_CTRL_REGS_REG_MASK: u64 = 0xffff;
    pub const BRG_CTRL_REGS_CORE_OFFSET: u32 = 16;
    pub const BRG_CTRL_REGS_CORE_MASK: u64 = 0xf;
    pub const BRG_CTRL_REGS_TILE_Y_OFFSET: u32 = 24;
    pub const BRG_CTRL_REGS_TILE_Y_MASK: u64 = 0xf;
    pub const BRG_CTRL_REGS_TILE_X_OFFSET: u32 = 28;
    pub const BRG_CTRL_REGS_TILE_X_MASK: u64 = 0xf;

    // Register offsets within a core's bank.
    pub const CTRL_REG_GOBIT_REG_OFFSET: u16 = 0b000000;
    pub const CTRL_REG_RESET_PC_REG_OFFSET: u16 = 0b000100;
    pub const CTRL_REG_PROC2MNGR_REG_OFFSET: u16 = 0b001000;
    pub const CTRL_REG_MNGR2PROC_REG_OFFSET: u16 = 0b001100;
    pub const CTRL_REG_ADDR_SEXT_EN_REG_OFFSET: u16 = 0b010000;
    pub const CTRL_REG_GO_IFC_REG_OFFSET: u16 = 0b010100;
    pub const CTRL_REG_DONE_IFC_REG_OFFSET: u16 = 0b011000;

    // GO_IFC value selecting normal (non-test) run mode.
    pub const CTRL_REG_GO_IFC_MODE_NORMAL: u32 = 0x0;
    pub const CTRL_REG_ADDR_SEXT_EN_DISABLE: u32 = 0x0;
    pub const CTRL_REG_GOBIT_ENABLE: u32 = 0x1;
}

/// Inbound interrupt mailbox shared by the whole fabric.
pub mod wakeup {
    pub const BRG_WAKEUP_MAILBOX_ADDR: u64 = 0x98_0000_0800;

    pub const BRG_WAKEUP_TRIGGER_BIT: u32 = 0;
    pub const BRG_WAKEUP_OPCODE_OFFSET: u32 = 15;
    pub const BRG_WAKEUP_OPCODE_MASK: u64 = 0x7;
    pub const BRG_WAKEUP_TILE_X_OFFSET: u32 = 18;
    pub const BRG_WAKEUP_TILE_X_MASK: u64 = 0xff;
    pub const BRG_WAKEUP_TILE_Y_OFFSET: u32 = 26;
    pub const BRG_WAKEUP_TILE_Y_MASK: u64 = 0xff;
    pub const BRG_WAKEUP_VALID_BIT: u32 = 63;

    // Interrupt type that wakes a sleeping tile.
    pub const BRG_WAKEUP_OPCODE_WAKE: u8 = 0b010;
}

/// Values latched in a tile's DONE_IFC register.
pub mod status {
    pub const BRG_STATUS_RUNNING: u32 = 0;
    pub const BRG_STATUS_SUCCESS: u32 = 1;
    pub const BRG_STATUS_FAILURE: u32 = 2;
}

/// Platform definitions for the one supported fabric generation.
pub mod platform {
    pub const NUM_BRG_TILES: usize = 3;
    pub const BRG_CORES_PER_TILE: usize = 6;
    pub const BRG_MAX_THREADS: usize = NUM_BRG_TILES * BRG_CORES_PER_TILE;

    // Tile coordinates in logical tile-index order.
    pub const BRG_TILE_COORDS: [(u8, u8); NUM_BRG_TILES] = [(0, 2), (0, 3), (1, 3)];

    // Where tile cores start fetching; also the base of the tile code image.
    pub const BRG_TEST_RESETPC: u32 = 0x4000_0000;

    // Host-side tiles (Ariane); only thread 0 drives the BRG tiles.
    pub const PITON_RV64_TILES: usize = 4;

    // Host cycle counter frequency.
    pub const EE_TICKS_PER_SEC: u64 = 1_000_000_000;

    // Bytes of private workload memory per logical thread.
    pub const TOTAL_DATA_SIZE: usize = 2000;
}
