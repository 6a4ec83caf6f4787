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

//! Request and response bodies of the RPC surface. Everything is JSON on
//! the wire; the transport itself is a seam and not specified here.

use serde::Deserialize;
use serde::Serialize;

use crate::AppMeta;
use crate::ConfigMeta;
use crate::ConfigType;
use crate::ErrCode;
use crate::InstanceMeta;
use crate::InstanceStatus;
use crate::PrivilegeServlet;
use crate::PrivilegeZone;
use crate::ServletMeta;
use crate::TsoTimestamp;
use crate::UserPrivilege;
use crate::ZoneMeta;

/// Every response exposes its errcode and, when the peer is not the
/// leader, a hint where the leader lives. The router relies on this.
pub trait WireResponse {
    fn errcode(&self) -> ErrCode;
    fn leader_hint(&self) -> Option<&str>;
}

macro_rules! impl_wire_response {
    ($t:ident) => {
        impl WireResponse for $t {
            fn errcode(&self) -> ErrCode {
                self.errcode
            }
            fn leader_hint(&self) -> Option<&str> {
                if self.leader.is_empty() {
                    None
                } else {
                    Some(&self.leader)
                }
            }
        }
    };
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    OpCreateApp,
    OpDropApp,
    OpModifyApp,
    OpCreateZone,
    OpDropZone,
    OpModifyZone,
    OpCreateServlet,
    OpDropServlet,
    OpModifyServlet,
    OpAddInstance,
    OpDropInstance,
    OpUpdateInstance,
    OpCreateUser,
    OpDropUser,
    OpAddPrivilege,
    OpDropPrivilege,
    OpCreateConfig,
    OpRemoveConfig,
    OpAddIdForAutoIncrement,
    OpDropIdForAutoIncrement,
    OpGenIdForAutoIncrement,
    OpUpdateForAutoIncrement,
}

/// Wire shape of a user mutation; the password travels in clear and is
/// hashed by the front-end before it enters the log.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRequest {
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub zone_privileges: Vec<PrivilegeZone>,
    #[serde(default)]
    pub servlet_privileges: Vec<PrivilegeServlet>,
}

/// Wire shape of privilege add/drop. `password` (clear text) is only
/// honored on add.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegeRequest {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub zone_privileges: Vec<PrivilegeZone>,
    #[serde(default)]
    pub servlet_privileges: Vec<PrivilegeServlet>,
}

/// Wire shape of config create/remove. `version` is a semver string.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigRequest {
    pub config_name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub config_type: ConfigType,
    /// RemoveConfig only: drop every version of the name.
    #[serde(default)]
    pub all: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoIncrRequest {
    pub servlet_id: i64,
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub increment: Option<u64>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub force: bool,
}

/// All creates/drops/modifies. `op_type` selects the entity; exactly one
/// of the payload fields is expected to be set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ManagerRequest {
    pub op_type: OpType,
    #[serde(default)]
    pub app: Option<AppMeta>,
    #[serde(default)]
    pub zone: Option<ZoneMeta>,
    #[serde(default)]
    pub servlet: Option<ServletMeta>,
    #[serde(default)]
    pub instance: Option<InstanceMeta>,
    #[serde(default)]
    pub user: Option<UserRequest>,
    #[serde(default)]
    pub privilege: Option<PrivilegeRequest>,
    #[serde(default)]
    pub config: Option<ConfigRequest>,
    #[serde(default)]
    pub auto_increment: Option<AutoIncrRequest>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerResponse {
    pub errcode: ErrCode,
    pub errmsg: String,
    #[serde(default)]
    pub leader: String,
    /// GenId only: the allocated range `[start_id, end_id)`.
    #[serde(default)]
    pub start_id: Option<u64>,
    #[serde(default)]
    pub end_id: Option<u64>,
}

impl_wire_response!(ManagerResponse);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOpType {
    QueryApp,
    QueryZone,
    QueryServlet,
    QueryInstance,
    QueryInstanceFlatten,
    QueryUserPrivilege,
    QueryConfig,
    ListConfig,
    ListConfigVersion,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub op_type: QueryOpType,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub zone_name: Option<String>,
    #[serde(default)]
    pub servlet_name: Option<String>,
    #[serde(default)]
    pub instance_address: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub config_name: Option<String>,
    /// Semver string; absent means "the greatest version".
    #[serde(default)]
    pub config_version: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResponse {
    pub errcode: ErrCode,
    pub errmsg: String,
    #[serde(default)]
    pub leader: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apps: Vec<AppMeta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<ZoneMeta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servlets: Vec<ServletMeta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<InstanceMeta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<UserPrivilege>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configs: Vec<ConfigMeta>,
}

impl_wire_response!(QueryResponse);

impl QueryResponse {
    pub fn err(errcode: ErrCode, errmsg: impl Into<String>) -> Self {
        Self {
            errcode,
            errmsg: errmsg.into(),
            ..Default::default()
        }
    }

    pub fn ok() -> Self {
        Self {
            errcode: ErrCode::Success,
            errmsg: "success".to_string(),
            ..Default::default()
        }
    }
}

/// Liveness-filtered discovery request.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingRequest {
    pub app_name: String,
    #[serde(default)]
    pub zones: Vec<String>,
    #[serde(default)]
    pub envs: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingResponse {
    pub errcode: ErrCode,
    pub errmsg: String,
    #[serde(default)]
    pub leader: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<InstanceMeta>,
}

impl_wire_response!(NamingResponse);

/// Instance lifecycle from the servlet's side: registry/update/cancel.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterRequest {
    pub app_name: String,
    pub zone_name: String,
    pub servlet_name: String,
    pub address: String,
    #[serde(default)]
    pub env: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub status: Option<InstanceStatus>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterResponse {
    pub errcode: ErrCode,
    pub errmsg: String,
    #[serde(default)]
    pub leader: String,
}

impl_wire_response!(RegisterResponse);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsoOpType {
    GenTso,
    ResetTso,
    UpdateTso,
    QueryTsoInfo,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TsoRequest {
    pub op_type: TsoOpType,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub timestamp: Option<TsoTimestamp>,
    #[serde(default)]
    pub save_physical: Option<i64>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TsoResponse {
    pub errcode: ErrCode,
    pub errmsg: String,
    #[serde(default)]
    pub leader: String,
    #[serde(default)]
    pub timestamp: TsoTimestamp,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub save_physical: i64,
}

impl_wire_response!(TsoResponse);

/// Which raft group a control request addresses.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaftGroup {
    Registry,
    AutoIncr,
    Tso,
}

impl RaftGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaftGroup::Registry => "registry",
            RaftGroup::AutoIncr => "autoincr",
            RaftGroup::Tso => "tso",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaftControlOp {
    GetLeader,
    SnapShot,
    Vote,
    SetPeer,
    ShutDown,
    TransLeader,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RaftControlRequest {
    pub group: RaftGroup,
    pub op_type: RaftControlOp,
    #[serde(default)]
    pub new_peers: Vec<String>,
    #[serde(default)]
    pub old_peers: Vec<String>,
    #[serde(default)]
    pub new_leader: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RaftControlResponse {
    pub errcode: ErrCode,
    pub errmsg: String,
    #[serde(default)]
    pub leader: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peers: Vec<String>,
}

impl_wire_response!(RaftControlResponse);
