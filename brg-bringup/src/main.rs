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

//! `brg-bringup`: host-side bring-up of the BRG tile fabric, run against
//! the simulated fabric.
//!
//! ```text
//! brg-bringup [--iterations N] [--seeds S1 S2 S3] [--debug-print]
//!             [--max-polls N] [--drain] [--poll-latency N]
//!             [--fail-tile X,Y] [--thread-id N]
//! ```

use brg_coordinator::{
    BenchmarkReport, BrgCoordinator, BrgResults, FabricConfig, Identity, Role,
};
use brg_tile_core::WakeupMailbox;
use brg_tile_interface::{
    BrgError, BrgExitCode, Clock, CompletionPolicy, Delay, Ticks, TileCoordinate, WorkloadArgs,
};
use clap::Parser;
use fake_brg_fabric::{FakeFabric, FakeWorkload};
use log::{info, warn, LevelFilter, Metadata, Record};
use std::io::Write;
use std::process::ExitCode;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "brg-bringup", about = "BRG tile fabric bring-up", version)]
struct Cli {
    /// Benchmark iterations per thread.
    #[arg(long, default_value_t = 1)]
    iterations: u32,
    /// Payload seeds; "0 0 0" and "1 0 0" select the performance and
    /// validation sets.
    #[arg(long, num_args = 3, value_parser = parse_seed, default_values = ["0", "0", "0x66"])]
    seeds: Vec<i16>,
    /// Trace every register access. Release builds compile traces out
    /// (log's `release_max_level_info`), so this needs a debug build.
    #[arg(long)]
    debug_print: bool,
    /// Give up on a tile after this many completion polls (at least 1).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_polls: Option<u32>,
    /// Await every tile even after one fails.
    #[arg(long)]
    drain: bool,
    /// Polls a simulated tile answers RUNNING before its verdict.
    #[arg(long, default_value_t = 0)]
    poll_latency: u32,
    /// Simulate a failing tile, e.g. "0,3".
    #[arg(long, value_parser = parse_tile)]
    fail_tile: Option<TileCoordinate>,
    /// Host thread (hart) this instance runs as; only 0 does any work.
    #[arg(long, default_value_t = 0)]
    thread_id: usize,
}

fn parse_seed(s: &str) -> Result<i16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).map(|v| v as i16),
        None => s.parse::<i16>(),
    };
    parsed.map_err(|e| format!("bad seed {:?}: {}", s, e))
}

fn parse_tile(s: &str) -> Result<TileCoordinate, String> {
    let (x, y) = s.split_once(',').ok_or_else(|| format!("expected X,Y, got {:?}", s))?;
    let coord = |v: &str| v.trim().parse::<u8>().map_err(|e| format!("bad coordinate {:?}: {}", v, e));
    Ok(TileCoordinate::new(coord(x)?, coord(y)?))
}

/// Writes records to stderr as `<target>::<message>`.
struct ConsoleLogger;
impl log::Log for ConsoleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool { true }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(std::io::stderr(), "{}::{}", record.target(), record.args());
        }
    }

    fn flush(&self) {}
}
static CONSOLE_LOGGER: ConsoleLogger = ConsoleLogger;

/// Sleeps for |iterations| x |per_iteration| between polls.
struct SleepDelay {
    per_iteration: Duration,
}
impl Delay for SleepDelay {
    fn delay(&self, iterations: u32) { std::thread::sleep(self.per_iteration * iterations); }
}

/// Nanoseconds since startup, matching the 1 GHz tick rate of the reports.
struct InstantClock {
    start: Instant,
}
impl Clock for InstantClock {
    fn now(&self) -> Ticks { self.start.elapsed().as_nanos() as Ticks }
}

fn exit(code: BrgExitCode) -> ExitCode { ExitCode::from(u8::from(code)) }

/// Resolves the run configuration, checking that a simulated failing tile
/// is part of the fabric.
fn fabric_config(cli: &Cli) -> Result<FabricConfig, BrgError> {
    let config = FabricConfig {
        max_polls: cli.max_polls,
        policy: if cli.drain {
            CompletionPolicy::Drain
        } else {
            CompletionPolicy::FailFast
        },
        ..FabricConfig::BRG
    };
    if let Some(tile) = cli.fail_tile {
        config.topology.tile_index(tile)?;
    }
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if log::set_logger(&CONSOLE_LOGGER).is_ok() {
        log::set_max_level(if cli.debug_print {
            LevelFilter::Trace
        } else {
            LevelFilter::Info
        });
        if cli.debug_print && log::STATIC_MAX_LEVEL < LevelFilter::Trace {
            warn!(target: "BRG", "--debug-print has no effect: traces are compiled out of this build");
        }
    }

    let config = match fabric_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return exit(BrgExitCode::from(&e));
        }
    };
    match config.role(Identity::Host {
        thread: cli.thread_id,
    }) {
        Ok(Role::Initiator) => {}
        Ok(_) => return ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            return exit(BrgExitCode::from(&e));
        }
    }
    println!("Hello from Ariane core {}", cli.thread_id);

    let mut args = WorkloadArgs::new([cli.seeds[0], cli.seeds[1], cli.seeds[2]], cli.iterations);
    args = args.with_defaults();
    info!(target: "BRG", "seeds {:x?} iterations {}", args.seeds, args.iterations);

    let results = BrgResults::new();
    let mut fabric = FakeFabric::new(config.topology, args, FakeWorkload::default(), &results)
        .with_poll_latency(cli.poll_latency);
    if let Some(tile) = cli.fail_tile {
        fabric = fabric.fail_tile(tile);
    }
    let mailbox = WakeupMailbox::new();
    let delay = SleepDelay {
        per_iteration: Duration::from_nanos(100),
    };
    let clock = InstantClock {
        start: Instant::now(),
    };

    println!("Executing kernel using all BRG tiles ...");
    let summary = BrgCoordinator::new(&config, &fabric, &mailbox, &delay, &clock).run();
    info!(target: "BRG", "{:?}", summary.statistics);
    if summary.outcome.is_err() {
        if let Some(tile) = summary.failed_tile() {
            println!("[FAILED] tile {}", tile);
        }
        return exit(summary.exit_code());
    }
    println!("Finished execution");

    match BenchmarkReport::new(&results, config.topology.num_threads(), summary.total_ticks) {
        Some(report) => {
            print!("{}", report);
            report.log_summary();
        }
        None => println!("no results published"),
    }
    exit(summary.exit_code())
}
