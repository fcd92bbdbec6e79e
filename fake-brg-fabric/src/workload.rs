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

// Stand-in benchmark payload. Produces the reference CRCs for parameter
// sets that have them, so verification can be exercised end to end.

use brg_coordinator::report::{crcu16, crcu32, seedcrc, KnownRun};
use brg_tile_interface::*;

#[derive(Clone, Copy, Debug, Default)]
pub struct FakeWorkload {
    /// Thread whose list CRC comes out wrong.
    pub corrupt_thread: Option<LogicalThreadId>,
}

pub struct FakeWorkspace<'m> {
    thread_id: LogicalThreadId,
    args: WorkloadArgs,
    memory: &'m mut [u8],
}
impl FakeWorkspace<'_> {
    pub fn memory(&self) -> &[u8] { &*self.memory }
}

impl Workload for FakeWorkload {
    type Workspace<'m> = FakeWorkspace<'m>;

    fn init<'m>(
        &self,
        thread_id: LogicalThreadId,
        args: &WorkloadArgs,
        memory: &'m mut [u8],
    ) -> FakeWorkspace<'m> {
        // Stamp the slice so ownership mixups show up in memory dumps.
        for (i, byte) in memory.iter_mut().enumerate() {
            *byte = (thread_id as u8).wrapping_add(i as u8);
        }
        FakeWorkspace {
            thread_id,
            args: *args,
            memory,
        }
    }

    fn run(&self, workspace: &mut FakeWorkspace<'_>) -> WorkloadCrcs {
        let args = &workspace.args;
        let known = KnownRun::from_seedcrc(seedcrc(&args.seeds, args.size_per_algorithm()));
        let fallback = workspace
            .memory
            .chunks(4)
            .fold(0, |crc, word| {
                let mut bytes = [0u8; 4];
                bytes[..word.len()].copy_from_slice(word);
                crcu32(u32::from_le_bytes(bytes), crc)
            });
        let pick = |algorithm: Algorithms| {
            if !args.execs.contains(algorithm) {
                return 0;
            }
            known.and_then(|k| k.expected(algorithm)).unwrap_or(fallback)
        };
        let mut crcs = WorkloadCrcs {
            crc: 0,
            crc_list: pick(Algorithms::LIST),
            crc_matrix: pick(Algorithms::MATRIX),
            crc_state: pick(Algorithms::STATE),
        };
        if self.corrupt_thread == Some(workspace.thread_id) {
            crcs.crc_list = !crcs.crc_list;
        }
        for _ in 0..args.iterations {
            crcs.crc = crcu16(crcs.crc_list, crcs.crc);
            crcs.crc = crcu16(crcs.crc_matrix, crcs.crc);
            crcs.crc = crcu16(crcs.crc_state, crcs.crc);
        }
        crcs
    }
}
