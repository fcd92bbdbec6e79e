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

// Arm/wake/poll protocol driven by the initiator against one tile.

use crate::backoff::Backoff;
use crate::ctrl_regs::ctrl_reg_addr;
use crate::wakeup::WakeupMailbox;
use brg_reg_constants::ctrl_regs::*;
use brg_tile_interface::{
    BackoffConfig, BrgError, CoreSlot, Delay, RegisterAccess, RegisterId, TileCoordinate,
    TileStatus,
};
use log::{trace, warn};

// Mode and done registers are shared per tile and live in core 0's bank.
const TILE_CTRL_CORE: CoreSlot = 0;

/// Outcome of waiting on one tile.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollReport {
    pub tile: TileCoordinate,
    pub status: TileStatus,
    /// DONE_IFC as read; differs from `status` for unrecognized values.
    pub raw: u32,
    pub polls: u32,
    /// Delay iterations spent between polls.
    pub waited: u64,
    pub backoff_capped: bool,
}
impl PollReport {
    pub fn succeeded(&self) -> bool { self.status == TileStatus::Success }

    /// The poll budget ran out with the tile still RUNNING.
    pub fn timed_out(&self) -> bool { !self.status.is_terminal() }

    /// Maps a spent poll budget to `BrgError::Timeout` and any other
    /// non-SUCCESS status to `BrgError::TileFailure`.
    pub fn check(&self) -> Result<(), BrgError> {
        match self.status {
            TileStatus::Success => Ok(()),
            TileStatus::Running => Err(BrgError::Timeout {
                tile: self.tile,
                polls: self.polls,
            }),
            TileStatus::Failure => Err(BrgError::TileFailure {
                tile: self.tile,
                status: self.raw,
            }),
        }
    }
}

/// Drives the control protocol for tiles with |cores_per_tile| cores.
pub struct TileController<'a, R: RegisterAccess + ?Sized, D: Delay + ?Sized> {
    regs: &'a R,
    mailbox: &'a WakeupMailbox,
    delay: &'a D,
    cores_per_tile: u8,
    backoff: BackoffConfig,
    max_polls: Option<u32>,
}
impl<'a, R: RegisterAccess + ?Sized, D: Delay + ?Sized> TileController<'a, R, D> {
    pub fn new(regs: &'a R, mailbox: &'a WakeupMailbox, delay: &'a D, cores_per_tile: u8) -> Self {
        Self {
            regs,
            mailbox,
            delay,
            cores_per_tile,
            backoff: BackoffConfig::DEFAULT,
            max_polls: None,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Bounds `await_completion` to |max_polls| reads; None waits forever.
    /// The budget always covers at least one read, so `Some(0)` reads once.
    pub fn with_max_polls(mut self, max_polls: Option<u32>) -> Self {
        self.max_polls = max_polls.map(|max| max.max(1));
        self
    }

    pub fn cores_per_tile(&self) -> u8 { self.cores_per_tile }

    pub fn write_reg(&self, tile: TileCoordinate, core: CoreSlot, reg: RegisterId, value: u32) {
        let addr = ctrl_reg_addr(tile, core, reg);
        trace!("WRITE {} core {} {:?} @ {} = {:#x}", tile, core, reg, addr, value);
        self.regs.write_register(addr.0, value);
    }

    pub fn read_reg(&self, tile: TileCoordinate, core: CoreSlot, reg: RegisterId) -> u32 {
        let addr = ctrl_reg_addr(tile, core, reg);
        let value = self.regs.read_register(addr.0);
        trace!("READ {} core {} {:?} @ {} -> {:#x}", tile, core, reg, addr, value);
        value
    }

    /// Latches normal run mode, disables address sign extension and raises
    /// the go bit on every core. Must complete before the tile is woken.
    pub fn arm(&self, tile: TileCoordinate) {
        self.write_reg(tile, TILE_CTRL_CORE, RegisterId::GoIfc, CTRL_REG_GO_IFC_MODE_NORMAL);
        self.write_reg(tile, TILE_CTRL_CORE, RegisterId::AddrSextEn, CTRL_REG_ADDR_SEXT_EN_DISABLE);
        for core in 0..self.cores_per_tile {
            self.write_reg(tile, core, RegisterId::GoBit, CTRL_REG_GOBIT_ENABLE);
        }
    }

    pub fn wake(&self, tile: TileCoordinate) { self.mailbox.send_wakeup(self.regs, tile); }

    pub fn arm_and_wake(&self, tile: TileCoordinate) {
        self.arm(tile);
        self.wake(tile);
    }

    /// One read of the tile's done interface.
    pub fn poll_status(&self, tile: TileCoordinate) -> (TileStatus, u32) {
        let raw = self.read_reg(tile, TILE_CTRL_CORE, RegisterId::DoneIfc);
        (TileStatus::from(raw), raw)
    }

    /// Polls until the tile leaves RUNNING, backing off between reads.
    /// If a poll budget is set and spent the report still reads RUNNING
    /// (see `PollReport::timed_out`); polls, wait time and cap state are
    /// kept either way.
    pub fn await_completion(&self, tile: TileCoordinate) -> PollReport {
        let mut backoff = Backoff::new(&self.backoff);
        let mut polls = 0u32;
        let mut waited = 0u64;
        let mut backoff_capped = false;
        loop {
            let (status, raw) = self.poll_status(tile);
            polls = polls.saturating_add(1);
            let spent = self.max_polls.map_or(false, |max| polls >= max);
            if status.is_terminal() || spent {
                return PollReport {
                    tile,
                    status,
                    raw,
                    polls,
                    waited,
                    backoff_capped,
                };
            }
            if !backoff_capped && backoff.is_capped() {
                warn!("tile {} still running after {} polls; back-off at cap", tile, polls);
                backoff_capped = true;
            }
            let n = backoff.next().unwrap_or(self.backoff.max);
            self.delay.delay(n);
            waited += n as u64;
        }
    }
}
