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

use std::sync::Arc;

use async_raft::Config;
use async_raft::NodeId;
use async_raft::SnapshotPolicy;
use common_exception::ErrorCode;
use common_exception::Result;
use structopt::StructOpt;

#[derive(Clone, Debug, PartialEq, StructOpt)]
pub struct RaftConfig {
    /// Identify this node; the index of its address in `--peers`.
    #[structopt(long, default_value = "0")]
    pub id: u64,

    /// Addresses (host:port) of every replica, comma separated, in the
    /// same order on every node. A single entry boots a one-node cluster.
    #[structopt(long, use_delimiter = true, default_value = "127.0.0.1:8010")]
    pub peers: Vec<String>,

    /// Directory holding the sled db (raft logs, raft state, registry).
    #[structopt(long, default_value = "./beacon-data")]
    pub raft_dir: String,

    /// Dedicated tree-name prefix, mainly for testing.
    #[structopt(long, default_value = "beacon")]
    pub sled_tree_prefix: String,

    /// Skip fsync on raft log and state writes. The replication log is
    /// then the only durability guarantee.
    #[structopt(long)]
    pub no_sync: bool,

    #[structopt(long, default_value = "1000")]
    pub election_timeout_min_ms: u64,

    #[structopt(long, default_value = "2000")]
    pub election_timeout_max_ms: u64,

    #[structopt(long, default_value = "500")]
    pub heartbeat_interval_ms: u64,

    /// Take a snapshot and compact the log once this many entries have
    /// been applied since the last snapshot.
    #[structopt(long, default_value = "1024")]
    pub snapshot_logs_since_last: u64,
}

impl RaftConfig {
    /// An all-default instance, for tests and embedded stores.
    pub fn empty() -> Self {
        <Self as StructOpt>::from_iter(Vec::<&'static str>::new())
    }

    pub fn is_sync(&self) -> bool {
        !self.no_sync
    }

    pub fn address_of(&self, id: NodeId) -> Result<String> {
        self.peers
            .get(id as usize)
            .cloned()
            .ok_or_else(|| ErrorCode::UnknownNode(format!("node id out of peer set: {}", id)))
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        (0..self.peers.len() as u64).collect()
    }

    /// Tree name for one store of a replication group, namespaced by the
    /// configured prefix.
    pub fn tree_name(&self, name: impl std::fmt::Display) -> String {
        format!("{}/{}", self.sled_tree_prefix, name)
    }

    /// Build the engine-side raft config shared by all three groups.
    pub fn raft_config(&self, group: &str) -> Result<Arc<Config>> {
        let config = Config::build(format!("beacon-{}", group))
            .election_timeout_min(self.election_timeout_min_ms)
            .election_timeout_max(self.election_timeout_max_ms)
            .heartbeat_interval(self.heartbeat_interval_ms)
            .snapshot_policy(SnapshotPolicy::LogsSinceLast(self.snapshot_logs_since_last))
            .validate()
            .map_err(|e| ErrorCode::InvalidConfig(format!("raft config: {}", e)))?;
        Ok(Arc::new(config))
    }
}
