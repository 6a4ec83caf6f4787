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

use std::fmt;
use std::marker::PhantomData;

use async_raft::raft::Entry;
use async_raft::raft::MembershipConfig;
use async_raft::storage::HardState;
use async_raft::AppData;
use async_raft::NodeId;
use common_exception::ErrorCode;
use common_sled_store::sled::IVec;
use common_sled_store::SledKeySpace;
use common_sled_store::SledOrderedSerde;
use serde::Deserialize;
use serde::Serialize;

/// Position of an applied entry in the log.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedLogId {
    pub term: u64,
    pub index: u64,
}

/// Raft log entries of one group: `log index -> Entry`.
pub struct Logs<C: AppData> {
    _p: PhantomData<C>,
}

impl<C: AppData> SledKeySpace for Logs<C> {
    const PREFIX: u8 = 1;
    const NAME: &'static str = "log";
    type K = u64;
    type V = Entry<C>;
}

/// Raft-peristent state of one group: node id and hard state.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaftStateKey {
    Id,
    HardState,
}

impl fmt::Display for RaftStateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl SledOrderedSerde for RaftStateKey {
    fn ser(&self) -> common_exception::Result<IVec> {
        let b = match self {
            RaftStateKey::Id => 1u8,
            RaftStateKey::HardState => 2,
        };
        Ok(IVec::from(&[b][..]))
    }

    fn de<V: AsRef<[u8]>>(v: V) -> common_exception::Result<Self> {
        match v.as_ref().first() {
            Some(1) => Ok(RaftStateKey::Id),
            Some(2) => Ok(RaftStateKey::HardState),
            _ => Err(ErrorCode::BadBytes("invalid RaftStateKey")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum RaftStateValue {
    NodeId(NodeId),
    HardState(HardState),
}

impl From<RaftStateValue> for NodeId {
    fn from(v: RaftStateValue) -> Self {
        match v {
            RaftStateValue::NodeId(x) => x,
            _ => panic!("expect NodeId"),
        }
    }
}

impl From<RaftStateValue> for HardState {
    fn from(v: RaftStateValue) -> Self {
        match v {
            RaftStateValue::HardState(x) => x,
            _ => panic!("expect HardState"),
        }
    }
}

pub struct RaftStateKV {}
impl SledKeySpace for RaftStateKV {
    const PREFIX: u8 = 2;
    const NAME: &'static str = "raft-state";
    type K = RaftStateKey;
    type V = RaftStateValue;
}

/// Bookkeeping of an applied state machine: what has been applied, the
/// last seen membership, and whether it was ever initialized.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMachineMetaKey {
    LastApplied,
    Initialized,
    LastMembership,
}

impl fmt::Display for StateMachineMetaKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl SledOrderedSerde for StateMachineMetaKey {
    fn ser(&self) -> common_exception::Result<IVec> {
        let b = match self {
            StateMachineMetaKey::LastApplied => 1u8,
            StateMachineMetaKey::Initialized => 2,
            StateMachineMetaKey::LastMembership => 3,
        };
        Ok(IVec::from(&[b][..]))
    }

    fn de<V: AsRef<[u8]>>(v: V) -> common_exception::Result<Self> {
        match v.as_ref().first() {
            Some(1) => Ok(StateMachineMetaKey::LastApplied),
            Some(2) => Ok(StateMachineMetaKey::Initialized),
            Some(3) => Ok(StateMachineMetaKey::LastMembership),
            _ => Err(ErrorCode::BadBytes("invalid StateMachineMetaKey")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineMetaValue {
    LogId(AppliedLogId),
    Bool(bool),
    Membership(MembershipConfig),
}

impl TryFrom<StateMachineMetaValue> for AppliedLogId {
    type Error = ErrorCode;
    fn try_from(v: StateMachineMetaValue) -> common_exception::Result<Self> {
        match v {
            StateMachineMetaValue::LogId(x) => Ok(x),
            _ => Err(ErrorCode::BadBytes("expect LogId")),
        }
    }
}

impl TryFrom<StateMachineMetaValue> for MembershipConfig {
    type Error = ErrorCode;
    fn try_from(v: StateMachineMetaValue) -> common_exception::Result<Self> {
        match v {
            StateMachineMetaValue::Membership(x) => Ok(x),
            _ => Err(ErrorCode::BadBytes("expect Membership")),
        }
    }
}

pub struct StateMachineMeta {}
impl SledKeySpace for StateMachineMeta {
    const PREFIX: u8 = 3;
    const NAME: &'static str = "sm-meta";
    type K = StateMachineMetaKey;
    type V = StateMachineMetaValue;
}
