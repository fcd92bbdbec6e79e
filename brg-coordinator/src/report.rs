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

//! Result verification and the benchmark report printed by the initiator
//! once every tile has succeeded. Verification is informational; it does
//! not change the run's exit code.

use crate::arena::ResultArena;
use brg_reg_constants::platform::EE_TICKS_PER_SEC;
use brg_tile_interface::{Algorithms, LogicalThreadId, ThreadResult, Ticks, WorkloadArgs};
use core::fmt;
use log::{error, info};

// Shortest run that counts as a valid result.
const MIN_VALID_SECS: f64 = 10.0;

pub fn crcu8(data: u8, mut crc: u16) -> u16 {
    let mut data = data;
    for _ in 0..8 {
        let x16 = (data & 1) as u16 ^ (crc & 1);
        data >>= 1;
        let carry = x16 == 1;
        if carry {
            crc ^= 0x4002;
        }
        crc >>= 1;
        if carry {
            crc |= 0x8000;
        } else {
            crc &= 0x7fff;
        }
    }
    crc
}

pub fn crcu16(newval: u16, crc: u16) -> u16 {
    let crc = crcu8(newval as u8, crc);
    crcu8((newval >> 8) as u8, crc)
}

pub fn crcu32(newval: u32, crc: u16) -> u16 {
    let crc = crc16(newval as i16, crc);
    crc16((newval >> 16) as i16, crc)
}

pub fn crc16(newval: i16, crc: u16) -> u16 { crcu16(newval as u16, crc) }

/// CRC identifying the run parameters: seeds then per-algorithm size.
pub fn seedcrc(seeds: &[i16; 3], size: u32) -> u16 {
    let crc = seeds.iter().fold(0, |crc, seed| crc16(*seed, crc));
    crc16(size as i16, crc)
}

/// Parameter sets with published reference CRCs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KnownRun {
    Performance6k = 0,
    Validation6k = 1,
    ProfileGeneration = 2,
    Performance2k = 3,
    Validation2k = 4,
}
impl KnownRun {
    const LIST_CRC: [u16; 5] = [0xd4b0, 0x3340, 0x6a79, 0xe714, 0xe3c1];
    const MATRIX_CRC: [u16; 5] = [0xbe52, 0x1199, 0x5608, 0x1fd7, 0x0747];
    const STATE_CRC: [u16; 5] = [0x5e47, 0x39bf, 0xe5a4, 0x8e3a, 0x8d84];

    pub fn from_seedcrc(seedcrc: u16) -> Option<Self> {
        match seedcrc {
            0x8a02 => Some(KnownRun::Performance6k),
            0x7b05 => Some(KnownRun::Validation6k),
            0x4eaf => Some(KnownRun::ProfileGeneration),
            0xe9f5 => Some(KnownRun::Performance2k),
            0x18f2 => Some(KnownRun::Validation2k),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            KnownRun::Performance6k => "6k performance run parameters for coremark.",
            KnownRun::Validation6k => "6k validation run parameters for coremark.",
            KnownRun::ProfileGeneration => "Profile generation run parameters for coremark.",
            KnownRun::Performance2k => "2K performance run parameters for coremark.",
            KnownRun::Validation2k => "2K validation run parameters for coremark.",
        }
    }

    /// Reference CRC of one algorithm under these parameters.
    pub fn expected(&self, algorithm: Algorithms) -> Option<u16> {
        let i = *self as usize;
        if algorithm == Algorithms::LIST {
            Some(Self::LIST_CRC[i])
        } else if algorithm == Algorithms::MATRIX {
            Some(Self::MATRIX_CRC[i])
        } else if algorithm == Algorithms::STATE {
            Some(Self::STATE_CRC[i])
        } else {
            None
        }
    }
}

fn algorithm_name(algorithm: Algorithms) -> &'static str {
    if algorithm == Algorithms::LIST {
        "list"
    } else if algorithm == Algorithms::MATRIX {
        "matrix"
    } else {
        "state"
    }
}

fn algorithm_crc(result: &ThreadResult, algorithm: Algorithms) -> u16 {
    if algorithm == Algorithms::LIST {
        result.crcs.crc_list
    } else if algorithm == Algorithms::MATRIX {
        result.crcs.crc_matrix
    } else {
        result.crcs.crc_state
    }
}

const ALGORITHMS: [Algorithms; 3] = [Algorithms::LIST, Algorithms::MATRIX, Algorithms::STATE];

/// A slot whose CRC differs from the reference.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CrcMismatch {
    pub thread_id: LogicalThreadId,
    pub algorithm: Algorithms,
    pub actual: u16,
    pub expected: u16,
}
impl fmt::Display for CrcMismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}]ERROR! {} crc {:#06x} - should be {:#06x}",
            self.thread_id,
            algorithm_name(self.algorithm),
            self.actual,
            self.expected
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Validation {
    /// Every CRC matched and the run was long enough.
    Validated,
    /// Number of problems found.
    Errors(u32),
    /// Seeds without reference CRCs.
    Unknown,
}

/// Summary of a completed benchmark across all result slots.
pub struct BenchmarkReport<'a, const N: usize> {
    results: &'a ResultArena<N>,
    threads: usize,
    args: WorkloadArgs,
    size: u32,
    seedcrc: u16,
    known: Option<KnownRun>,
    total_ticks: Ticks,
}
impl<'a, const N: usize> BenchmarkReport<'a, N> {
    /// Builds the report from the first |threads| slots. Run parameters
    /// are taken from thread 0. Returns None if thread 0 never published.
    pub fn new(results: &'a ResultArena<N>, threads: usize, total_ticks: Ticks) -> Option<Self> {
        let first = results.get(0)?;
        let seedcrc = seedcrc(&first.args.seeds, first.size);
        Some(Self {
            results,
            threads: threads.min(N),
            args: first.args,
            size: first.size,
            seedcrc,
            known: KnownRun::from_seedcrc(seedcrc),
            total_ticks,
        })
    }

    pub fn seedcrc(&self) -> u16 { self.seedcrc }
    pub fn known(&self) -> Option<KnownRun> { self.known }
    pub fn total_ticks(&self) -> Ticks { self.total_ticks }

    pub fn secs(&self) -> f64 { self.total_ticks as f64 / EE_TICKS_PER_SEC as f64 }

    pub fn total_iterations(&self) -> u64 { self.threads as u64 * self.args.iterations as u64 }

    pub fn iterations_per_sec(&self) -> Option<f64> {
        let secs = self.secs();
        if secs > 0.0 {
            Some(self.total_iterations() as f64 / secs)
        } else {
            None
        }
    }

    pub fn too_short(&self) -> bool { self.secs() < MIN_VALID_SECS }

    /// Slots, among the first `threads`, that never published.
    pub fn missing(&self) -> impl Iterator<Item = LogicalThreadId> + '_ {
        (0..self.threads).filter(move |id| self.results.get(*id).is_none())
    }

    /// CRC mismatches for the enabled algorithms of every slot. Empty when
    /// the parameters have no reference CRCs.
    pub fn mismatches(&self) -> impl Iterator<Item = CrcMismatch> + '_ {
        let known = self.known;
        self.results
            .iter()
            .filter(move |r| r.thread_id < self.threads)
            .flat_map(move |r| {
                ALGORITHMS.into_iter().filter_map(move |algorithm| {
                    let expected = known?.expected(algorithm)?;
                    let actual = algorithm_crc(r, algorithm);
                    (r.args.execs.contains(algorithm) && actual != expected).then_some(CrcMismatch {
                        thread_id: r.thread_id,
                        algorithm,
                        actual,
                        expected,
                    })
                })
            })
    }

    pub fn validation(&self) -> Validation {
        if self.known.is_none() {
            return Validation::Unknown;
        }
        let errors = self.mismatches().count() + self.missing().count() + self.too_short() as usize;
        match errors {
            0 => Validation::Validated,
            n => Validation::Errors(n as u32),
        }
    }

    /// CoreMark score; only reported for validated 2K performance runs.
    pub fn score(&self) -> Option<f64> {
        if self.known == Some(KnownRun::Performance2k) && self.validation() == Validation::Validated {
            self.iterations_per_sec()
        } else {
            None
        }
    }

    /// Emits the verdict through the logger.
    pub fn log_summary(&self) {
        for mismatch in self.mismatches() {
            error!(target: "BRG", "{}", mismatch);
        }
        for id in self.missing() {
            error!(target: "BRG", "[{}]ERROR! no result published", id);
        }
        match self.validation() {
            Validation::Validated => info!(target: "BRG", "Correct operation validated."),
            Validation::Errors(n) => error!(target: "BRG", "Errors detected: {}", n),
            Validation::Unknown => {
                info!(target: "BRG", "Cannot validate operation for seedcrc {:#06x}", self.seedcrc)
            }
        }
    }
}

impl<const N: usize> fmt::Display for BenchmarkReport<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(known) = self.known {
            writeln!(f, "{}", known.description())?;
        }
        for mismatch in self.mismatches() {
            writeln!(f, "{}", mismatch)?;
        }
        writeln!(f, "CoreMark Size    : {}", self.size)?;
        writeln!(f, "Total ticks      : {}", self.total_ticks)?;
        writeln!(f, "Total time (secs): {:.6}", self.secs())?;
        if let Some(ips) = self.iterations_per_sec() {
            writeln!(f, "Iterations/Sec   : {:.6}", ips)?;
        }
        if self.too_short() {
            writeln!(f, "ERROR! Must execute for at least 10 secs for a valid result!")?;
        }
        writeln!(f, "Iterations       : {}", self.total_iterations())?;
        writeln!(f, "seedcrc          : {:#06x}", self.seedcrc)?;
        for (algorithm, label) in [
            (Algorithms::LIST, "crclist  "),
            (Algorithms::MATRIX, "crcmatrix"),
            (Algorithms::STATE, "crcstate "),
        ] {
            if self.args.execs.contains(algorithm) {
                for r in self.results.iter().filter(|r| r.thread_id < self.threads) {
                    writeln!(f, "[{}]{}     : {:#06x}", r.thread_id, label, algorithm_crc(r, algorithm))?;
                }
            }
        }
        for r in self.results.iter().filter(|r| r.thread_id < self.threads) {
            writeln!(f, "[{}]crcfinal      : {:#06x}", r.thread_id, r.crcs.crc)?;
        }
        match self.validation() {
            Validation::Validated => {
                writeln!(f, "Correct operation validated.")?;
                if let Some(score) = self.score() {
                    writeln!(f, "CoreMark 1.0 : {:.6}", score)?;
                }
            }
            Validation::Errors(_) => writeln!(f, "Errors detected")?,
            Validation::Unknown => writeln!(
                f,
                "Cannot validate operation for these seed values, please compare with results on a known platform."
            )?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brg_tile_interface::{TileCoordinate, WorkloadCrcs, PERFORMANCE_SEEDS, VALIDATION_SEEDS};

    #[test]
    fn crc_primitives() {
        assert_eq!(crcu8(0xa5, 0xffff), 0x3b7f);
        assert_eq!(crcu16(0x1234, 0), 0xcd96);
        assert_eq!(crcu32(0xdead_beef, 0), 0x38a8);
        assert_eq!(crc16(0x1234, 0), crcu16(0x1234, 0));
    }

    #[test]
    fn known_seedcrcs() {
        assert_eq!(seedcrc(&PERFORMANCE_SEEDS, 2000), 0x8a02);
        assert_eq!(seedcrc(&VALIDATION_SEEDS, 2000), 0x7b05);
        assert_eq!(seedcrc(&[8, 8, 8], 400), 0x4eaf);
        assert_eq!(seedcrc(&PERFORMANCE_SEEDS, 666), 0xe9f5);
        assert_eq!(seedcrc(&VALIDATION_SEEDS, 666), 0x18f2);
        assert_eq!(KnownRun::from_seedcrc(0xe9f5), Some(KnownRun::Performance2k));
        assert_eq!(KnownRun::from_seedcrc(0x0000), None);
        assert_eq!(KnownRun::Validation2k.expected(Algorithms::STATE), Some(0x8d84));
    }

    fn publish_all<const N: usize>(arena: &ResultArena<N>, args: WorkloadArgs, crcs: WorkloadCrcs) {
        for thread_id in 0..N {
            arena
                .publish(ThreadResult {
                    thread_id,
                    tile: TileCoordinate::new(0, 2),
                    core: thread_id as u8,
                    args,
                    size: args.size_per_algorithm(),
                    crcs,
                })
                .unwrap();
        }
    }

    const GOOD_2K: WorkloadCrcs = WorkloadCrcs {
        crc: 0,
        crc_list: 0xe714,
        crc_matrix: 0x1fd7,
        crc_state: 0x8e3a,
    };

    /// Reference CRCs over a long enough run validate and produce a score.
    #[test]
    fn validated_performance_run() {
        let arena = ResultArena::<4>::new();
        let args = WorkloadArgs::new([0, 0, 0], 10).with_defaults();
        publish_all(&arena, args, GOOD_2K);
        let report = BenchmarkReport::new(&arena, 4, 20 * EE_TICKS_PER_SEC).unwrap();
        assert_eq!(report.known(), Some(KnownRun::Performance2k));
        assert_eq!(report.validation(), Validation::Validated);
        assert_eq!(report.total_iterations(), 40);
        assert_eq!(report.score(), Some(2.0));
        let text = format!("{}", report);
        assert!(text.contains("2K performance run parameters"));
        assert!(text.contains("[3]crcstate      : 0x8e3a"));
        assert!(text.contains("CoreMark 1.0 : 2.000000"));
    }

    #[test]
    fn short_run_is_an_error() {
        let arena = ResultArena::<2>::new();
        publish_all(&arena, WorkloadArgs::default().with_defaults(), GOOD_2K);
        let report = BenchmarkReport::new(&arena, 2, 1000).unwrap();
        assert!(report.too_short());
        assert_eq!(report.validation(), Validation::Errors(1));
        assert_eq!(report.score(), None);
        assert!(format!("{}", report).contains("Must execute for at least 10 secs"));
    }

    #[test]
    fn crc_mismatch_reported() {
        let arena = ResultArena::<2>::new();
        let crcs = WorkloadCrcs {
            crc_matrix: 0xbad0,
            ..GOOD_2K
        };
        publish_all(&arena, WorkloadArgs::default().with_defaults(), crcs);
        let report = BenchmarkReport::new(&arena, 2, 20 * EE_TICKS_PER_SEC).unwrap();
        let mismatches: Vec<_> = report.mismatches().collect();
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[1].thread_id, 1);
        assert_eq!(mismatches[1].algorithm, Algorithms::MATRIX);
        assert_eq!(
            format!("{}", mismatches[0]),
            "[0]ERROR! matrix crc 0xbad0 - should be 0x1fd7"
        );
        assert_eq!(report.validation(), Validation::Errors(2));
    }

    /// Only enabled algorithms are checked.
    #[test]
    fn disabled_algorithm_ignored() {
        let arena = ResultArena::<1>::new();
        let mut args = WorkloadArgs::new([8, 8, 8], 1);
        args.execs = Algorithms::all();
        args.total_data_size = 1200;
        let crcs = WorkloadCrcs {
            crc: 0,
            crc_list: 0x6a79,
            crc_matrix: 0x5608,
            crc_state: 0,
        };
        publish_all(&arena, args, crcs);
        let report = BenchmarkReport::new(&arena, 1, 20 * EE_TICKS_PER_SEC).unwrap();
        assert_eq!(report.known(), Some(KnownRun::ProfileGeneration));
        assert_eq!(report.mismatches().count(), 1);

        let arena = ResultArena::<1>::new();
        args.execs = Algorithms::LIST | Algorithms::MATRIX;
        args.total_data_size = 800;
        publish_all(&arena, args, crcs);
        let report = BenchmarkReport::new(&arena, 1, 20 * EE_TICKS_PER_SEC).unwrap();
        assert_eq!(report.validation(), Validation::Validated);
    }

    #[test]
    fn unknown_seeds() {
        let arena = ResultArena::<1>::new();
        publish_all(&arena, WorkloadArgs::new([5, 6, 7], 1).with_defaults(), GOOD_2K);
        let report = BenchmarkReport::new(&arena, 1, 20 * EE_TICKS_PER_SEC).unwrap();
        assert_eq!(report.validation(), Validation::Unknown);
        assert_eq!(report.mismatches().count(), 0);
    }

    #[test]
    fn missing_slot() {
        let arena = ResultArena::<3>::new();
        let args = WorkloadArgs::default().with_defaults();
        arena
            .publish(ThreadResult {
                thread_id: 0,
                tile: TileCoordinate::new(0, 2),
                core: 0,
                args,
                size: args.size_per_algorithm(),
                crcs: GOOD_2K,
            })
            .unwrap();
        let report = BenchmarkReport::new(&arena, 3, 20 * EE_TICKS_PER_SEC).unwrap();
        assert_eq!(report.missing().collect::<Vec<_>>(), [1, 2]);
        assert_eq!(report.validation(), Validation::Errors(2));
        assert!(BenchmarkReport::new(&ResultArena::<1>::new(), 1, 0).is_none());
    }

    struct CapturingLogger(std::sync::Mutex<Vec<(String, String)>>);
    impl log::Log for CapturingLogger {
        fn enabled(&self, _metadata: &log::Metadata) -> bool { true }
        fn log(&self, record: &log::Record) {
            let mut records = self.0.lock().unwrap();
            records.push((record.target().to_string(), record.args().to_string()));
        }
        fn flush(&self) {}
    }
    static LOGGER: CapturingLogger = CapturingLogger(std::sync::Mutex::new(Vec::new()));

    /// Verdict lines go out under the same target as the run log.
    #[test]
    fn summary_log_target() {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Info);

        let arena = ResultArena::<2>::new();
        let args = WorkloadArgs::default().with_defaults();
        arena
            .publish(ThreadResult {
                thread_id: 0,
                tile: TileCoordinate::new(0, 2),
                core: 0,
                args,
                size: args.size_per_algorithm(),
                crcs: WorkloadCrcs {
                    crc_list: 0xbad0,
                    ..GOOD_2K
                },
            })
            .unwrap();
        let report = BenchmarkReport::new(&arena, 2, 20 * EE_TICKS_PER_SEC).unwrap();
        report.log_summary();

        let records = LOGGER.0.lock().unwrap();
        let ours: Vec<_> = records
            .iter()
            .filter(|(_, msg)| {
                msg.starts_with("[0]ERROR! list crc")
                    || msg.starts_with("[1]ERROR! no result")
                    || msg.starts_with("Errors detected")
            })
            .collect();
        assert_eq!(ours.len(), 3);
        assert!(ours.iter().all(|(target, _)| target == "BRG"));
    }
}
