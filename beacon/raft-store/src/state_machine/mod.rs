// Copyright 2021 Beacon Labs.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#[cfg(test)]
mod auto_incr_test;
#[cfg(test)]
mod registry_test;
#[cfg(test)]
mod tso_test;

mod auto_incr;
pub mod keys;
mod registry;
pub mod tso;

use async_raft::AppData;
use async_raft::AppDataResponse;
use async_trait::async_trait;
pub use auto_incr::AutoIncrSm;
use common_exception::Result;
pub use registry::hash_password;
pub use registry::RegistrySm;
pub use registry::SerializableSnapshot;
pub use tso::TsoSm;

/// What every replicated state machine implements, three times over:
/// a deterministic reducer plus snapshot import/export and leader hooks.
#[async_trait]
pub trait GroupStateMachine: Send + Sync + 'static {
    type Cmd: AppData;
    type Resp: AppDataResponse;

    /// Name of the replication group this machine belongs to.
    fn group() -> &'static str;

    /// Apply one committed command. Must be deterministic: no clocks, no
    /// I/O other than the machine's own KV writes.
    ///
    /// Domain rejections (duplicate name, missing parent, ...) are data:
    /// they come back as an `Ok` response carrying an errcode. An `Err`
    /// means the store itself failed and the machine may not continue.
    async fn apply_cmd(&mut self, cmd: &Self::Cmd) -> Result<Self::Resp>;

    /// Serialize the machine state for a snapshot.
    async fn snapshot_export(&self) -> Result<Vec<u8>>;

    /// Replace the machine state from a snapshot payload.
    async fn snapshot_import(&mut self, data: &[u8]) -> Result<()>;

    fn on_leader_start(&mut self) {}

    fn on_leader_stop(&mut self) {}
}
