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

//! Durable side of the replication groups: raft log and hard state on
//! sled, the three state machines (registry, auto-increment, TSO), and a
//! generic `RaftStorage` implementation tying them together.

#[cfg(test)]
mod store_test;

pub mod config;
pub mod key_spaces;
pub mod log;
pub mod raft_state;
pub mod state_machine;
pub mod store;

pub use config::RaftConfig;
pub use log::RaftLog;
pub use raft_state::RaftState;
pub use store::GroupRaftStore;
pub use store::ShutdownError;
