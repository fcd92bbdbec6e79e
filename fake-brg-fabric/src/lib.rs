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

//! Software stand-in for the BRG tile fabric. Decodes control-register
//! writes and wakeup words the way the hardware does, runs the payload on
//! every core of a woken tile, and answers DONE_IFC polls from a per-tile
//! status sequence.

extern crate alloc;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec;
use alloc::vec::Vec;
use brg_coordinator::{run_core, MemoryArena, ResultArena, Topology};
use brg_reg_constants::ctrl_regs::*;
use brg_reg_constants::status::*;
use brg_tile_core::{ctrl_reg_addr, decode_ctrl_reg_addr, WakeupWord};
use brg_tile_interface::*;
use core::sync::atomic::{AtomicU64, Ordering};
use log::{trace, warn};
use spin::Mutex;

mod workload;
pub use workload::{FakeWorkload, FakeWorkspace};

/// One observed bus transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FabricOp {
    Write {
        tile: TileCoordinate,
        core: CoreSlot,
        reg: u16,
        value: u32,
    },
    Read {
        tile: TileCoordinate,
        core: CoreSlot,
        reg: u16,
    },
    Wake(TileCoordinate),
    /// A write that decodes to neither a control register nor a wake.
    Stray { addr: u64, value: u64 },
}

// How a tile's DONE_IFC answers once woken.
#[derive(Clone, Debug)]
enum DoneBehavior {
    /// RUNNING for `poll_latency` reads, then the cores' verdict.
    Computed,
    /// Fixed sequence; the last value latches.
    Scripted(Vec<u32>),
    Fail,
    Hang,
}

#[derive(Debug, Default)]
struct TileModel {
    done: VecDeque<u32>,
    latched: u32,
    wakeups: u32,
    done_reads: u32,
}

struct FabricState {
    regs: BTreeMap<u64, u32>,
    ops: Vec<FabricOp>,
    tiles: BTreeMap<TileCoordinate, TileModel>,
    behavior: BTreeMap<TileCoordinate, DoneBehavior>,
}

/// A fabric of |topology| tiles running |workload| into |results|.
pub struct FakeFabric<'a, W: Workload, const N: usize> {
    topology: Topology,
    args: WorkloadArgs,
    workload: W,
    results: &'a ResultArena<N>,
    poll_latency: u32,
    memory: Mutex<Vec<u8>>,
    state: Mutex<FabricState>,
}
impl<'a, W: Workload, const N: usize> FakeFabric<'a, W, N> {
    pub fn new(
        topology: Topology,
        args: WorkloadArgs,
        workload: W,
        results: &'a ResultArena<N>,
    ) -> Self {
        let memory = vec![0u8; topology.num_threads() * args.total_data_size as usize];
        Self {
            topology,
            args,
            workload,
            results,
            poll_latency: 0,
            memory: Mutex::new(memory),
            state: Mutex::new(FabricState {
                regs: BTreeMap::new(),
                ops: Vec::new(),
                tiles: BTreeMap::new(),
                behavior: BTreeMap::new(),
            }),
        }
    }

    /// Number of RUNNING reads a tile answers before its verdict.
    pub fn with_poll_latency(mut self, poll_latency: u32) -> Self {
        self.poll_latency = poll_latency;
        self
    }

    /// |tile| reports FAILURE whatever its cores return.
    pub fn fail_tile(self, tile: TileCoordinate) -> Self { self.set_behavior(tile, DoneBehavior::Fail) }

    /// |tile| never leaves RUNNING.
    pub fn hang_tile(self, tile: TileCoordinate) -> Self { self.set_behavior(tile, DoneBehavior::Hang) }

    /// |tile| answers DONE_IFC reads with |sequence| after waking.
    pub fn script_done(self, tile: TileCoordinate, sequence: &[u32]) -> Self {
        self.set_behavior(tile, DoneBehavior::Scripted(sequence.to_vec()))
    }

    fn set_behavior(self, tile: TileCoordinate, behavior: DoneBehavior) -> Self {
        self.state.lock().behavior.insert(tile, behavior);
        self
    }

    pub fn results(&self) -> &'a ResultArena<N> { self.results }

    /// Every transaction seen so far, in bus order.
    pub fn ops(&self) -> Vec<FabricOp> { self.state.lock().ops.clone() }

    /// Tiles woken, in wake order.
    pub fn wake_order(&self) -> Vec<TileCoordinate> {
        self.state
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                FabricOp::Wake(tile) => Some(*tile),
                _ => None,
            })
            .collect()
    }

    pub fn wakeups(&self, tile: TileCoordinate) -> u32 {
        self.state.lock().tiles.get(&tile).map_or(0, |t| t.wakeups)
    }

    pub fn done_reads(&self, tile: TileCoordinate) -> u32 {
        self.state.lock().tiles.get(&tile).map_or(0, |t| t.done_reads)
    }

    /// Copy of thread |id|'s private memory.
    pub fn thread_memory(&self, id: LogicalThreadId) -> Option<Vec<u8>> {
        let mut memory = self.memory.lock();
        let mut arena = MemoryArena::new(&mut memory, self.args.total_data_size as usize);
        arena.slice_mut(id).ok().map(|slice| slice.to_vec())
    }

    // A tile may only be woken with normal mode, no sign extension and
    // every core's go bit latched.
    fn is_armed(&self, regs: &BTreeMap<u64, u32>, tile: TileCoordinate) -> bool {
        let reg = |core, id| regs.get(&ctrl_reg_addr(tile, core, id).0).copied();
        reg(0, RegisterId::GoIfc) == Some(CTRL_REG_GO_IFC_MODE_NORMAL)
            && reg(0, RegisterId::AddrSextEn) == Some(CTRL_REG_ADDR_SEXT_EN_DISABLE)
            && (0..self.topology.cores_per_tile())
                .all(|core| reg(core, RegisterId::GoBit) == Some(CTRL_REG_GOBIT_ENABLE))
    }

    // Runs the payload on every core of |tile|; SUCCESS only if all cores
    // succeed.
    fn run_tile(&self, tile: TileCoordinate) -> u32 {
        let slice_len = self.args.total_data_size as usize;
        let mut memory = self.memory.lock();
        let mut arena = MemoryArena::new(&mut memory, slice_len);
        let mut verdict = BRG_STATUS_SUCCESS;
        for core in 0..self.topology.cores_per_tile() {
            let slice = match self.topology.thread_id(tile, core) {
                Ok(id) => arena.slice_mut(id).unwrap_or_default(),
                Err(_) => Default::default(),
            };
            let status = run_core(
                &self.topology,
                tile,
                core,
                &self.args,
                &self.workload,
                slice,
                self.results,
            );
            if status != TileStatus::Success {
                verdict = BRG_STATUS_FAILURE;
            }
        }
        verdict
    }

    fn wake(&self, state: &mut FabricState, tile: TileCoordinate) {
        let armed = self.is_armed(&state.regs, tile);
        let behavior = state.behavior.get(&tile).cloned().unwrap_or(DoneBehavior::Computed);
        let verdict = if armed {
            self.run_tile(tile)
        } else {
            warn!("wakeup to unarmed tile {}", tile);
            BRG_STATUS_FAILURE
        };
        let mut done = VecDeque::new();
        match behavior {
            DoneBehavior::Computed => {
                done.extend(core::iter::repeat(BRG_STATUS_RUNNING).take(self.poll_latency as usize));
                done.push_back(verdict);
            }
            DoneBehavior::Scripted(sequence) => done.extend(sequence),
            DoneBehavior::Fail => {
                done.extend(core::iter::repeat(BRG_STATUS_RUNNING).take(self.poll_latency as usize));
                done.push_back(BRG_STATUS_FAILURE);
            }
            DoneBehavior::Hang => {}
        }
        let model = state.tiles.entry(tile).or_default();
        model.wakeups += 1;
        model.latched = BRG_STATUS_RUNNING;
        model.done = done;
    }

    fn read_done(state: &mut FabricState, tile: TileCoordinate) -> u32 {
        let model = state.tiles.entry(tile).or_default();
        model.done_reads += 1;
        if let Some(value) = model.done.pop_front() {
            model.latched = value;
        }
        model.latched
    }
}

impl<W: Workload, const N: usize> RegisterAccess for FakeFabric<'_, W, N> {
    fn read_register(&self, addr: u64) -> u32 {
        let mut state = self.state.lock();
        let Some((tile, core, reg)) = decode_ctrl_reg_addr(addr) else {
            warn!("read of unmapped address {:#x}", addr);
            return 0;
        };
        state.ops.push(FabricOp::Read { tile, core, reg });
        let value = if core == 0 && reg == CTRL_REG_DONE_IFC_REG_OFFSET {
            Self::read_done(&mut state, tile)
        } else {
            state.regs.get(&addr).copied().unwrap_or(0)
        };
        trace!("fabric READ {:#x} -> {:#x}", addr, value);
        value
    }

    fn write_register(&self, addr: u64, value: u32) {
        let mut state = self.state.lock();
        match decode_ctrl_reg_addr(addr) {
            Some((tile, core, reg)) => {
                state.ops.push(FabricOp::Write {
                    tile,
                    core,
                    reg,
                    value,
                });
                state.regs.insert(addr, value);
            }
            None => state.ops.push(FabricOp::Stray {
                addr,
                value: value as u64,
            }),
        }
    }

    fn write_register64(&self, addr: u64, value: u64) {
        let mut state = self.state.lock();
        let target = if addr == brg_reg_constants::wakeup::BRG_WAKEUP_MAILBOX_ADDR {
            WakeupWord::from_mailbox(value).wake_target()
        } else {
            None
        };
        match target {
            Some(tile) => {
                state.ops.push(FabricOp::Wake(tile));
                self.wake(&mut state, tile);
            }
            None => state.ops.push(FabricOp::Stray { addr, value }),
        }
    }
}

/// Delay that only records the requested waits.
#[derive(Default)]
pub struct RecordingDelay {
    waits: Mutex<Vec<u32>>,
}
impl RecordingDelay {
    pub fn new() -> Self { Self::default() }
    pub fn waits(&self) -> Vec<u32> { self.waits.lock().clone() }
}
impl Delay for RecordingDelay {
    fn delay(&self, iterations: u32) { self.waits.lock().push(iterations); }
}

/// Clock that advances by a fixed step on every read.
pub struct StepClock {
    now: AtomicU64,
    step: Ticks,
}
impl StepClock {
    pub const fn new(step: Ticks) -> Self {
        Self {
            now: AtomicU64::new(0),
            step,
        }
    }
}
impl Clock for StepClock {
    fn now(&self) -> Ticks { self.now.fetch_add(self.step, Ordering::Relaxed) }
}
