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

//! Data types of the beacon discovery service: registry entities, the
//! command records replicated through raft, and the wire protocol.

#[cfg(test)]
mod meta_test;

mod cmd;
mod errcode;
mod meta;
mod protocol;

pub use cmd::AutoIncrApplied;
pub use cmd::AutoIncrCmd;
pub use cmd::PrivilegeChange;
pub use cmd::RegistryApplied;
pub use cmd::RegistryCmd;
pub use cmd::TsoApplied;
pub use cmd::TsoCmd;
pub use errcode::ErrCode;
pub use meta::AppMeta;
pub use meta::ConfigMeta;
pub use meta::ConfigType;
pub use meta::InstanceMeta;
pub use meta::InstanceStatus;
pub use meta::MetaId;
pub use meta::MetaVersion;
pub use meta::PrivilegeServlet;
pub use meta::PrivilegeZone;
pub use meta::ServletMeta;
pub use meta::TsoTimestamp;
pub use meta::UserPrivilege;
pub use meta::ZoneMeta;
pub use meta::RW;
pub use protocol::AutoIncrRequest;
pub use protocol::ConfigRequest;
pub use protocol::ManagerRequest;
pub use protocol::ManagerResponse;
pub use protocol::NamingRequest;
pub use protocol::NamingResponse;
pub use protocol::OpType;
pub use protocol::PrivilegeRequest;
pub use protocol::QueryOpType;
pub use protocol::QueryRequest;
pub use protocol::QueryResponse;
pub use protocol::RaftControlOp;
pub use protocol::RaftControlRequest;
pub use protocol::RaftControlResponse;
pub use protocol::RaftGroup;
pub use protocol::RegisterRequest;
pub use protocol::RegisterResponse;
pub use protocol::TsoOpType;
pub use protocol::TsoRequest;
pub use protocol::TsoResponse;
pub use protocol::UserRequest;
pub use protocol::WireResponse;
