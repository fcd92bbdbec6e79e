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

// Direct physical-address register backend. This is the only place raw
// fabric addresses are dereferenced.

use brg_tile_interface::RegisterAccess;

/// Register access through identity-mapped physical addresses.
pub struct MmioRegisters {
    _private: (),
}
impl MmioRegisters {
    /// # Safety
    ///
    /// The control-register window and the wakeup mailbox must be mapped
    /// at their physical addresses, and nothing else may alias them for the
    /// lifetime of the returned value.
    pub const unsafe fn new() -> Self { Self { _private: () } }
}
impl RegisterAccess for MmioRegisters {
    fn read_register(&self, addr: u64) -> u32 {
        unsafe { (addr as usize as *const u32).read_volatile() }
    }
    fn write_register(&self, addr: u64, value: u32) {
        unsafe { (addr as usize as *mut u32).write_volatile(value) }
    }
    fn write_register64(&self, addr: u64, value: u64) {
        unsafe { (addr as usize as *mut u64).write_volatile(value) }
    }
}
