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

// Interface to the benchmark payload run by each tile core. The control
// plane treats the payload as opaque: it hands over a thread id and a
// private memory slice and passes the returned CRCs through to the report.

use crate::{CoreSlot, LogicalThreadId, TileCoordinate};
use brg_reg_constants::platform::TOTAL_DATA_SIZE;

bitflags::bitflags! {
    /// Benchmark kernels selected for a run.
    #[derive(Default)]
    pub struct Algorithms: u32 {
        const LIST   = 0b001;
        const MATRIX = 0b010;
        const STATE  = 0b100;
    }
}

// Seeds substituted for the shorthand (0,0,0) and (1,0,0) seed sets.
pub const PERFORMANCE_SEEDS: [i16; 3] = [0, 0, 0x66];
pub const VALIDATION_SEEDS: [i16; 3] = [0x3415, 0x3415, 0x66];

/// Arguments every thread's payload is initialized with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WorkloadArgs {
    pub seeds: [i16; 3],
    pub iterations: u32,
    pub execs: Algorithms,
    pub total_data_size: u32,
}
impl WorkloadArgs {
    pub const fn new(seeds: [i16; 3], iterations: u32) -> Self {
        Self {
            seeds,
            iterations,
            execs: Algorithms::empty(),
            total_data_size: TOTAL_DATA_SIZE as u32,
        }
    }

    /// Applies the payload's defaults: shorthand seed sets are expanded and
    /// an empty algorithm set selects every algorithm.
    pub fn with_defaults(mut self) -> Self {
        if self.execs.is_empty() {
            self.execs = Algorithms::all();
        }
        match self.seeds {
            [0, 0, 0] => self.seeds = PERFORMANCE_SEEDS,
            [1, 0, 0] => self.seeds = VALIDATION_SEEDS,
            _ => {}
        }
        self
    }

    /// Bytes of the thread's memory slice given to each enabled algorithm.
    pub fn size_per_algorithm(&self) -> u32 {
        match self.execs.bits().count_ones() {
            0 => self.total_data_size,
            n => self.total_data_size / n,
        }
    }
}
impl Default for WorkloadArgs {
    fn default() -> Self { Self::new([0, 0, 0], 1) }
}

/// CRCs produced by one payload run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WorkloadCrcs {
    pub crc: u16,
    pub crc_list: u16,
    pub crc_matrix: u16,
    pub crc_state: u16,
}

/// What a logical thread publishes into its result slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ThreadResult {
    pub thread_id: LogicalThreadId,
    pub tile: TileCoordinate,
    pub core: CoreSlot,
    pub args: WorkloadArgs,
    pub size: u32,
    pub crcs: WorkloadCrcs,
}

/// The benchmark payload.
pub trait Workload {
    type Workspace<'m>;

    fn init<'m>(
        &self,
        thread_id: LogicalThreadId,
        args: &WorkloadArgs,
        memory: &'m mut [u8],
    ) -> Self::Workspace<'m>;

    fn run(&self, workspace: &mut Self::Workspace<'_>) -> WorkloadCrcs;
}
