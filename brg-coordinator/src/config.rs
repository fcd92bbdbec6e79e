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

// Run configuration, resolved once at startup.

use crate::topology::{Identity, Role, Topology};
use brg_tile_interface::{ArchVariant, BackoffConfig, BrgError, CompletionPolicy};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FabricConfig {
    pub arch: ArchVariant,
    pub topology: Topology,
    pub backoff: BackoffConfig,
    /// Completion poll budget per tile; None polls forever. The budget
    /// covers at least one read.
    pub max_polls: Option<u32>,
    pub policy: CompletionPolicy,
}
impl FabricConfig {
    /// The one supported fabric generation, driven from the host.
    pub const BRG: FabricConfig = FabricConfig {
        arch: ArchVariant::Rv64,
        topology: Topology::BRG,
        backoff: BackoffConfig::DEFAULT,
        max_polls: None,
        policy: CompletionPolicy::FailFast,
    };

    pub fn validate(&self) -> Result<(), BrgError> { self.topology.validate() }

    /// Maps the caller's identity to its role under this configuration.
    /// On the host only thread 0 initiates; on a tile the core's logical
    /// thread id comes from the topology table.
    pub fn role(&self, identity: Identity) -> Result<Role, BrgError> {
        match (self.arch, identity) {
            (ArchVariant::Rv64, Identity::Host { thread: 0 }) => Ok(Role::Initiator),
            (ArchVariant::Rv64, Identity::Host { .. }) => Ok(Role::Bystander),
            (ArchVariant::Rv32, Identity::Tile { tile, core }) => {
                let thread_id = self.topology.thread_id(tile, core)?;
                Ok(Role::Worker {
                    tile,
                    core,
                    thread_id,
                })
            }
            (ArchVariant::Rv32, Identity::Host { thread }) => Err(BrgError::InvalidThreadId(thread)),
            (ArchVariant::Rv64, Identity::Tile { tile, .. }) => Err(BrgError::InvalidTopology(tile)),
        }
    }
}
impl Default for FabricConfig {
    fn default() -> Self { Self::BRG }
}
