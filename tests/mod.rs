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

// End-to-end runs of the coordinator against the fake fabric.

#![cfg(test)]

use brg_coordinator::*;
use brg_reg_constants::ctrl_regs::*;
use brg_reg_constants::platform::*;
use brg_reg_constants::status::*;
use brg_tile_core::WakeupMailbox;
use brg_tile_interface::*;
use fake_brg_fabric::{FabricOp, FakeFabric, FakeWorkload, RecordingDelay, StepClock};

const T02: TileCoordinate = TileCoordinate::new(0, 2);
const T03: TileCoordinate = TileCoordinate::new(0, 3);
const T13: TileCoordinate = TileCoordinate::new(1, 3);

// One clock step per read; start and end are one read apart.
const TWENTY_SECS: Ticks = 20 * EE_TICKS_PER_SEC;

fn new_fabric(results: &BrgResults) -> Fabric<'_> {
    FakeFabric::new(
        Topology::BRG,
        WorkloadArgs::default(),
        FakeWorkload::default(),
        results,
    )
}

type Fabric<'a> = FakeFabric<'a, FakeWorkload, BRG_MAX_THREADS>;

fn run(config: &FabricConfig, fabric: &Fabric<'_>) -> (RunSummary, RecordingDelay) {
    let mailbox = WakeupMailbox::new();
    let delay = RecordingDelay::new();
    let clock = StepClock::new(TWENTY_SECS);
    let summary = BrgCoordinator::new(config, fabric, &mailbox, &delay, &clock).run();
    (summary, delay)
}

fn first_done_read(ops: &[FabricOp]) -> Option<usize> {
    ops.iter().position(|op| {
        matches!(op, FabricOp::Read { reg, .. } if *reg == CTRL_REG_DONE_IFC_REG_OFFSET)
    })
}

/// All three tiles are woken in table order, every slot is written, and
/// the reference CRCs validate.
#[test]
fn all_tiles_succeed() {
    let results = BrgResults::new();
    let fabric = new_fabric(&results);
    let (summary, _) = run(&FabricConfig::BRG, &fabric);

    assert_eq!(summary.outcome, Ok(()));
    assert_eq!(summary.exit_code(), BrgExitCode::Success);
    assert_eq!(fabric.wake_order(), [T02, T03, T13]);
    for tile in [T02, T03, T13] {
        assert_eq!(fabric.wakeups(tile), 1);
        assert_eq!(summary.run(tile).map(|r| r.phase), Some(TilePhase::Success));
    }
    assert_eq!(results.populated(), BRG_MAX_THREADS);
    for id in 0..BRG_MAX_THREADS {
        let result = results.get(id).unwrap();
        assert_eq!(result.thread_id, id);
        assert_eq!(Topology::BRG.thread_id(result.tile, result.core), Ok(id));
        assert_eq!(fabric.thread_memory(id).unwrap()[0], id as u8);
    }
    assert_eq!(summary.statistics.tiles_woken, 3);
    assert_eq!(summary.statistics.tiles_succeeded, 3);
    assert_eq!(summary.statistics.backoff_cap_hits, 0);
    assert_eq!(summary.total_ticks, TWENTY_SECS);

    let report = BenchmarkReport::new(&results, BRG_MAX_THREADS, summary.total_ticks).unwrap();
    assert_eq!(report.known(), Some(KnownRun::Performance2k));
    assert_eq!(report.validation(), Validation::Validated);
    assert_eq!(report.score(), Some(0.9));
}

/// Every tile is armed then woken before any tile is polled.
#[test]
fn wake_all_before_polling() {
    let results = BrgResults::new();
    let fabric = new_fabric(&results).with_poll_latency(1);
    let (summary, _) = run(&FabricConfig::BRG, &fabric);
    assert!(summary.outcome.is_ok());

    let ops = fabric.ops();
    let wakes: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| matches!(op, FabricOp::Wake(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(wakes.len(), 3);
    assert!(wakes[2] < first_done_read(&ops).unwrap());

    // Each tile's arm sequence: mode, sign extension, six go bits, wake.
    for (n, tile) in [T02, T03, T13].into_iter().enumerate() {
        let start = wakes[n] - 8;
        assert_eq!(
            ops[start],
            FabricOp::Write {
                tile,
                core: 0,
                reg: CTRL_REG_GO_IFC_REG_OFFSET,
                value: CTRL_REG_GO_IFC_MODE_NORMAL,
            }
        );
        assert_eq!(
            ops[start + 1],
            FabricOp::Write {
                tile,
                core: 0,
                reg: CTRL_REG_ADDR_SEXT_EN_REG_OFFSET,
                value: CTRL_REG_ADDR_SEXT_EN_DISABLE,
            }
        );
        for core in 0..6u8 {
            assert_eq!(
                ops[start + 2 + core as usize],
                FabricOp::Write {
                    tile,
                    core,
                    reg: CTRL_REG_GOBIT_REG_OFFSET,
                    value: CTRL_REG_GOBIT_ENABLE,
                }
            );
        }
    }
}

/// RUNNING, RUNNING, SUCCESS: three polls with waits of 2 then 4.
#[test]
fn running_then_success() {
    let results = BrgResults::new();
    let fabric = new_fabric(&results).script_done(
        T02,
        &[BRG_STATUS_RUNNING, BRG_STATUS_RUNNING, BRG_STATUS_SUCCESS],
    );
    let (summary, delay) = run(&FabricConfig::BRG, &fabric);
    assert_eq!(summary.outcome, Ok(()));
    assert_eq!(fabric.done_reads(T02), 3);
    assert_eq!(summary.run(T02).map(|r| r.polls), Some(3));
    assert_eq!(delay.waits(), [2, 4]);
    assert_eq!(summary.statistics.total_polls, 5);
}

/// A failing tile stops the run; later tiles are never polled.
#[test]
fn fail_fast() {
    let results = BrgResults::new();
    let fabric = new_fabric(&results).script_done(T03, &[BRG_STATUS_RUNNING, BRG_STATUS_FAILURE]);
    let (summary, _) = run(&FabricConfig::BRG, &fabric);

    assert_eq!(
        summary.outcome,
        Err(BrgError::TileFailure {
            tile: T03,
            status: BRG_STATUS_FAILURE
        })
    );
    assert_eq!(summary.exit_code(), BrgExitCode::TileFailure);
    assert_eq!(u8::from(summary.exit_code()), 1);
    assert_eq!(summary.failed_tile(), Some(T03));
    // Woken, but never awaited.
    assert_eq!(fabric.wakeups(T13), 1);
    assert_eq!(fabric.done_reads(T13), 0);
    assert_eq!(summary.run(T13).map(|r| r.phase), Some(TilePhase::Awakened));
    assert_eq!(summary.run(T03).map(|r| r.phase), Some(TilePhase::Failure));
}

/// Unrecognized DONE_IFC values are failures carrying the raw value.
#[test]
fn unknown_status() {
    let results = BrgResults::new();
    let fabric = new_fabric(&results).script_done(T02, &[5]);
    let (summary, _) = run(&FabricConfig::BRG, &fabric);
    assert_eq!(summary.outcome, Err(BrgError::TileFailure { tile: T02, status: 5 }));
    assert_eq!(fabric.done_reads(T03), 0);
}

#[test]
fn drain_awaits_every_tile() {
    let results = BrgResults::new();
    let fabric = new_fabric(&results).fail_tile(T02);
    let config = FabricConfig {
        policy: CompletionPolicy::Drain,
        ..FabricConfig::BRG
    };
    let (summary, _) = run(&config, &fabric);

    assert_eq!(
        summary.outcome,
        Err(BrgError::TileFailure {
            tile: T02,
            status: BRG_STATUS_FAILURE
        })
    );
    assert_eq!(fabric.done_reads(T03), 1);
    assert_eq!(fabric.done_reads(T13), 1);
    assert_eq!(summary.statistics.tiles_failed, 1);
    assert_eq!(summary.statistics.tiles_succeeded, 2);
}

/// A stuck tile hits the poll budget with back-off held at its cap.
#[test]
fn timeout() {
    let results = BrgResults::new();
    let fabric = new_fabric(&results).hang_tile(T02);
    let config = FabricConfig {
        max_polls: Some(10),
        ..FabricConfig::BRG
    };
    let (summary, delay) = run(&config, &fabric);

    assert_eq!(summary.outcome, Err(BrgError::Timeout { tile: T02, polls: 10 }));
    assert_eq!(summary.exit_code(), BrgExitCode::Timeout);
    assert_eq!(summary.statistics.timeouts, 1);
    assert_eq!(fabric.done_reads(T02), 10);
    assert_eq!(delay.waits(), [2, 4, 8, 16, 32, 64, 128, 256, 256]);
    let stuck = summary.run(T02).copied();
    assert_eq!(stuck.map(|r| (r.phase, r.polls)), Some((TilePhase::Running, 10)));
    // 2 + 4 + ... + 128, then twice at the cap.
    assert_eq!(stuck.map(|r| r.waited), Some(254 + 256 + 256));
    assert_eq!(summary.statistics.total_polls, 10);
    assert_eq!(summary.statistics.backoff_cap_hits, 1);
}

/// Draining past a stuck tile keeps its poll record alongside the others.
#[test]
fn drain_past_stuck_tile() {
    let results = BrgResults::new();
    let fabric = new_fabric(&results).hang_tile(T03);
    let config = FabricConfig {
        max_polls: Some(4),
        policy: CompletionPolicy::Drain,
        ..FabricConfig::BRG
    };
    let (summary, _) = run(&config, &fabric);

    assert_eq!(summary.outcome, Err(BrgError::Timeout { tile: T03, polls: 4 }));
    assert_eq!(summary.run(T03).map(|r| r.waited), Some(2 + 4 + 8));
    assert_eq!(summary.run(T13).map(|r| r.phase), Some(TilePhase::Success));
    assert_eq!(summary.statistics.timeouts, 1);
    assert_eq!(summary.statistics.tiles_succeeded, 2);
    assert_eq!(summary.statistics.total_polls, 1 + 4 + 1);
    assert_eq!(summary.statistics.backoff_cap_hits, 0);
}

/// Bad topology tables are rejected before touching the bus.
#[test]
fn invalid_topology() {
    static TILES: [TileCoordinate; 2] = [T02, T02];
    let results = BrgResults::new();
    let fabric = new_fabric(&results);
    let config = FabricConfig {
        topology: Topology::new(&TILES, 6),
        ..FabricConfig::BRG
    };
    let (summary, _) = run(&config, &fabric);
    assert_eq!(summary.outcome, Err(BrgError::InvalidTopology(T02)));
    assert_eq!(summary.exit_code(), BrgExitCode::InvalidTopology);
    assert!(fabric.ops().is_empty());
}

/// A wrong CRC is reported but does not change the exit code.
#[test]
fn crc_mismatch_is_diagnostic() {
    let results = BrgResults::new();
    let fabric = FakeFabric::new(
        Topology::BRG,
        WorkloadArgs::default(),
        FakeWorkload {
            corrupt_thread: Some(4),
        },
        &results,
    );
    let (summary, _) = run(&FabricConfig::BRG, &fabric);
    assert_eq!(summary.exit_code(), BrgExitCode::Success);

    let report = BenchmarkReport::new(&results, BRG_MAX_THREADS, summary.total_ticks).unwrap();
    let mismatches: Vec<_> = report.mismatches().collect();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].thread_id, 4);
    assert_eq!(mismatches[0].algorithm, Algorithms::LIST);
    assert_eq!(report.validation(), Validation::Errors(1));
}

/// Host threads other than 0 have nothing to do.
#[test]
fn host_identity() {
    let config = FabricConfig::BRG;
    assert_eq!(config.role(Identity::Host { thread: 0 }), Ok(Role::Initiator));
    for thread in 1..PITON_RV64_TILES {
        assert_eq!(config.role(Identity::Host { thread }), Ok(Role::Bystander));
    }
}

/// Tile cores running concurrently each fill only their own slot and
/// memory slice.
#[test]
fn concurrent_tile_cores() {
    let results = BrgResults::new();
    let args = WorkloadArgs::default();
    let workload = FakeWorkload::default();
    let topology = Topology::BRG;
    let mut block = vec![0u8; BRG_MAX_THREADS * TOTAL_DATA_SIZE];
    let mut memory = MemoryArena::new(&mut block, TOTAL_DATA_SIZE);

    std::thread::scope(|s| {
        let handles: Vec<_> = memory
            .split()
            .enumerate()
            .map(|(id, slice)| {
                let (results, args, workload) = (&results, &args, &workload);
                s.spawn(move || {
                    let (tile, core) = topology.locate(id).unwrap();
                    run_core(&topology, tile, core, args, workload, slice, results)
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), TileStatus::Success);
        }
    });

    assert_eq!(results.populated(), BRG_MAX_THREADS);
    for (id, chunk) in block.chunks_exact(TOTAL_DATA_SIZE).enumerate() {
        assert_eq!(chunk[0], id as u8);
        assert_eq!(chunk[1], id as u8 + 1);
    }
}
