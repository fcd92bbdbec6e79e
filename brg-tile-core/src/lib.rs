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

//! brg-tile-core is the BRG tile fabric driver. It resolves control
//! register addresses, encodes and sends wakeup interrupts, and runs the
//! arm/wake/poll protocol against one tile at a time.

use cfg_if::cfg_if;

pub mod backoff;
pub mod ctrl_regs;
pub mod protocol;
pub mod timing;
pub mod wakeup;

cfg_if! {
    if #[cfg(target_pointer_width = "64")] {
        // Fabric addresses are 40 bits wide.
        pub mod mmio;
        pub use mmio::MmioRegisters;
    }
}

pub use backoff::Backoff;
pub use ctrl_regs::{ctrl_reg_addr, ctrl_reg_addr_raw, decode_ctrl_reg_addr, CtrlRegAddr};
pub use protocol::{PollReport, TileController};
pub use timing::SpinDelay;
pub use wakeup::{WakeupMailbox, WakeupWord};
