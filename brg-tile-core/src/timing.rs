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

// Bare-metal timing: spin-loop delay and the mcycle counter.

use brg_tile_interface::Delay;

/// Burns |iterations| spin-loop hints.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpinDelay;
impl Delay for SpinDelay {
    fn delay(&self, iterations: u32) {
        for _ in 0..iterations {
            core::hint::spin_loop();
        }
    }
}

#[cfg(target_arch = "riscv64")]
pub use mcycle::McycleClock;

#[cfg(target_arch = "riscv64")]
mod mcycle {
    use brg_tile_interface::{Clock, Ticks};

    /// Reads the machine cycle counter.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct McycleClock;
    impl Clock for McycleClock {
        fn now(&self) -> Ticks {
            let cycles: u64;
            unsafe { core::arch::asm!("csrr {0}, mcycle", out(reg) cycles) };
            cycles
        }
    }
}
