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

//! BRG bring-up coordinator. The initiator arms and wakes every tile in
//! the topology, then awaits each tile in table order; tile cores run the
//! payload into their own result slot.

use arrayvec::ArrayVec;
use brg_reg_constants::platform::*;
use brg_tile_core::{TileController, WakeupMailbox};
use brg_tile_interface::*;
use log::{error, info, warn};
use static_assertions::const_assert;

pub mod arena;
pub mod config;
pub mod report;
pub mod topology;

pub use arena::{MemoryArena, ResultArena};
pub use config::FabricConfig;
pub use report::{BenchmarkReport, KnownRun, Validation};
pub use topology::{Identity, Role, Topology};

/// Upper bound on tiles in one run; x and y are 4 bits wide each but only
/// a handful of tiles are ever populated.
pub const MAX_TILES: usize = 16;

const_assert!(NUM_BRG_TILES <= MAX_TILES);
const_assert!(BRG_CORES_PER_TILE <= 16);
const_assert!(BRG_MAX_THREADS == NUM_BRG_TILES * BRG_CORES_PER_TILE);

/// Result table sized for the BRG fabric.
pub type BrgResults = ResultArena<BRG_MAX_THREADS>;

/// Initiator-side record of one tile's progress.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TileRun {
    pub tile: TileCoordinate,
    pub phase: TilePhase,
    pub polls: u32,
    pub waited: u64,
    /// Last DONE_IFC value read, if any poll completed.
    pub raw_status: Option<u32>,
}
impl TileRun {
    pub fn new(tile: TileCoordinate) -> Self {
        Self {
            tile,
            phase: TilePhase::Idle,
            polls: 0,
            waited: 0,
            raw_status: None,
        }
    }

    /// Moves to |next|, rejecting steps the protocol does not allow.
    pub fn advance(&mut self, next: TilePhase) -> Result<(), BrgError> {
        if !self.phase.can_advance_to(next) {
            return Err(BrgError::ProtocolViolation {
                tile: self.tile,
                phase: self.phase,
            });
        }
        self.phase = next;
        Ok(())
    }
}

/// Statistics on a run, including non-happy-path events.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Statistics {
    pub tiles_woken: u32,
    pub tiles_succeeded: u32,
    pub tiles_failed: u32,
    pub timeouts: u32,
    pub total_polls: u32,
    pub backoff_cap_hits: u32,
}

/// Everything the initiator learned from one run.
#[derive(Debug)]
pub struct RunSummary {
    pub tiles: ArrayVec<TileRun, MAX_TILES>,
    pub statistics: Statistics,
    /// Clock ticks from before the first wakeup to the last completion.
    pub total_ticks: Ticks,
    pub outcome: Result<(), BrgError>,
}
impl RunSummary {
    pub fn exit_code(&self) -> BrgExitCode { BrgExitCode::from(&self.outcome) }

    /// The tile named by the outcome, if the run failed on one.
    pub fn failed_tile(&self) -> Option<TileCoordinate> {
        match self.outcome {
            Err(BrgError::TileFailure { tile, .. })
            | Err(BrgError::Timeout { tile, .. })
            | Err(BrgError::InvalidTopology(tile))
            | Err(BrgError::InvalidCoreSlot { tile, .. })
            | Err(BrgError::ProtocolViolation { tile, .. }) => Some(tile),
            _ => None,
        }
    }

    pub fn run(&self, tile: TileCoordinate) -> Option<&TileRun> {
        self.tiles.iter().find(|run| run.tile == tile)
    }
}

/// Host-side driver for a whole-fabric run.
pub struct BrgCoordinator<'a, R, D, C>
where
    R: RegisterAccess + ?Sized,
    D: Delay + ?Sized,
    C: Clock + ?Sized,
{
    config: FabricConfig,
    controller: TileController<'a, R, D>,
    clock: &'a C,
}
impl<'a, R, D, C> BrgCoordinator<'a, R, D, C>
where
    R: RegisterAccess + ?Sized,
    D: Delay + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(
        config: &FabricConfig,
        regs: &'a R,
        mailbox: &'a WakeupMailbox,
        delay: &'a D,
        clock: &'a C,
    ) -> Self {
        let controller = TileController::new(regs, mailbox, delay, config.topology.cores_per_tile())
            .with_backoff(config.backoff)
            .with_max_polls(config.max_polls);
        Self {
            config: *config,
            controller,
            clock,
        }
    }

    pub fn config(&self) -> &FabricConfig { &self.config }

    /// Wakes every tile in table order, then awaits each in the same order.
    /// Under `FailFast` the first non-SUCCESS tile ends the run and later
    /// tiles are never polled; under `Drain` every tile is awaited and the
    /// first failure is reported.
    pub fn run(&self) -> RunSummary {
        let mut tiles = ArrayVec::new();
        let mut statistics = Statistics::default();
        let start = self.clock.now();
        let outcome = self.drive(&mut tiles, &mut statistics);
        let total_ticks = self.clock.now().wrapping_sub(start);
        match &outcome {
            Ok(()) => info!(target: "BRG", "all {} tiles finished in {} ticks", tiles.len(), total_ticks),
            Err(e) => error!(target: "BRG", "run failed: {}", e),
        }
        RunSummary {
            tiles,
            statistics,
            total_ticks,
            outcome,
        }
    }

    fn drive(
        &self,
        tiles: &mut ArrayVec<TileRun, MAX_TILES>,
        statistics: &mut Statistics,
    ) -> Result<(), BrgError> {
        self.config.validate()?;
        for tile in self.config.topology.tiles() {
            tiles
                .try_push(TileRun::new(*tile))
                .map_err(|_| BrgError::InvalidTopology(*tile))?;
        }

        // Fire every wakeup before waiting on any tile.
        for run in tiles.iter_mut() {
            run.advance(TilePhase::Armed)?;
            self.controller.arm(run.tile);
            info!(target: "BRG", "Starting BRG tile {} ...", run.tile);
            run.advance(TilePhase::Awakened)?;
            self.controller.wake(run.tile);
            statistics.tiles_woken += 1;
        }

        let mut first_error = None;
        for run in tiles.iter_mut() {
            info!(target: "BRG", "Waiting BRG tile {} ...", run.tile);
            let result = self.await_tile(run, statistics);
            if let Err(e) = result {
                error!(target: "BRG", "[FAILED] tile {}", run.tile);
                match self.config.policy {
                    CompletionPolicy::FailFast => return Err(e),
                    CompletionPolicy::Drain => {
                        warn!(target: "BRG", "draining remaining tiles after {}", e);
                        first_error.get_or_insert(e);
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn await_tile(&self, run: &mut TileRun, statistics: &mut Statistics) -> Result<(), BrgError> {
        let report = self.controller.await_completion(run.tile);
        run.polls = report.polls;
        run.waited = report.waited;
        run.raw_status = Some(report.raw);
        statistics.total_polls += report.polls;
        if report.backoff_capped {
            statistics.backoff_cap_hits += 1;
        }
        if report.polls > 1 || report.timed_out() {
            run.advance(TilePhase::Running)?;
        }
        if report.timed_out() {
            statistics.timeouts += 1;
            return report.check();
        }
        run.advance(TilePhase::from(report.status))?;
        match report.check() {
            Ok(()) => {
                statistics.tiles_succeeded += 1;
                info!(target: "BRG", "tile {} done after {} polls", run.tile, report.polls);
                Ok(())
            }
            Err(e) => {
                statistics.tiles_failed += 1;
                error!(target: "BRG", "brg_status={}", report.raw);
                Err(e)
            }
        }
    }
}

/// Tile-core entry point. Looks up the core's logical thread, runs the
/// payload on the thread's private |memory| and publishes the result into
/// the thread's slot. Returns the status the tile reports on DONE_IFC: an
/// unknown tile or core, or a slot that cannot be written, is a FAILURE.
pub fn run_core<W: Workload + ?Sized, const N: usize>(
    topology: &Topology,
    tile: TileCoordinate,
    core: CoreSlot,
    args: &WorkloadArgs,
    workload: &W,
    memory: &mut [u8],
    results: &ResultArena<N>,
) -> TileStatus {
    let thread_id = match topology.thread_id(tile, core) {
        Ok(id) => id,
        Err(e) => {
            error!(target: "BRG", "{}", e);
            return TileStatus::Failure;
        }
    };
    let args = args.with_defaults();
    let mut workspace = workload.init(thread_id, &args, memory);
    let crcs = workload.run(&mut workspace);
    let result = ThreadResult {
        thread_id,
        tile,
        core,
        args,
        size: args.size_per_algorithm(),
        crcs,
    };
    match results.publish(result) {
        Ok(()) => TileStatus::Success,
        Err(e) => {
            error!(target: "BRG", "tile {} core {}: {}", tile, core, e);
            TileStatus::Failure
        }
    }
}
