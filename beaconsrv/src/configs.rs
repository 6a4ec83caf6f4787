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

use beacon_raft_store::RaftConfig;
use structopt::StructOpt;

#[derive(Clone, Debug, PartialEq, StructOpt)]
#[structopt(about = "beacon discovery server")]
pub struct Config {
    /// Address the RPC surface (and the raft RPC of this replica) binds.
    /// Must match this node's entry in `--peers`.
    #[structopt(long, default_value = "127.0.0.1:8010")]
    pub listen: String,

    /// Instances whose mtime is older than this are invisible to naming.
    #[structopt(long, default_value = "50")]
    pub liveness_window_s: i64,

    /// When positive, the leader proposes DropInstance for instances
    /// whose mtime is older than this. 0 disables the sweep.
    #[structopt(long, default_value = "0")]
    pub instance_ttl_s: i64,

    #[structopt(long, default_value = "10")]
    pub flush_interval_s: u64,

    #[structopt(long, default_value = "./beacon-logs")]
    pub log_dir: String,

    #[structopt(flatten)]
    pub raft_config: RaftConfig,
}

impl Config {
    /// An all-default instance, for tests.
    pub fn empty() -> Self {
        <Self as StructOpt>::from_iter(Vec::<&'static str>::new())
    }

    pub fn load() -> Self {
        Config::from_args()
    }
}

#[derive(Clone, Debug, PartialEq, StructOpt)]
#[structopt(about = "beacon router peer")]
pub struct RouterConfig {
    #[structopt(long, default_value = "127.0.0.1:8020")]
    pub listen: String,

    /// Replica endpoints the router forwards to, comma separated.
    #[structopt(long, use_delimiter = true, default_value = "127.0.0.1:8010")]
    pub servers: Vec<String>,

    #[structopt(long, default_value = "30000")]
    pub timeout_ms: u64,

    #[structopt(long, default_value = "3")]
    pub retry: u32,

    #[structopt(long, default_value = "1000")]
    pub retry_interval_ms: u64,

    #[structopt(long, default_value = "./beacon-logs")]
    pub log_dir: String,
}

impl RouterConfig {
    pub fn load() -> Self {
        RouterConfig::from_args()
    }
}
