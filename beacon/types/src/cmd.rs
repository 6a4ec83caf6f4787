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

use async_raft::AppData;
use async_raft::AppDataResponse;
use semver::Version;
use serde::Deserialize;
use serde::Serialize;

use crate::ErrCode;
use crate::InstanceMeta;
use crate::PrivilegeServlet;
use crate::PrivilegeZone;
use crate::ServletMeta;
use crate::TsoTimestamp;
use crate::UserPrivilege;
use crate::ZoneMeta;

/// Privilege mutation payload shared by AddPrivilege and DropPrivilege.
/// `password` carries an already-hashed replacement password; it is only
/// meaningful on AddPrivilege.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegeChange {
    pub username: String,
    pub password: Option<String>,
    pub ips: Vec<String>,
    pub zone_privileges: Vec<PrivilegeZone>,
    pub servlet_privileges: Vec<PrivilegeServlet>,
}

/// The command record replicated through the registry raft group.
/// Applying one of these is the only way registry state changes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum RegistryCmd {
    CreateApp {
        app_name: String,
        quota: i64,
    },
    DropApp {
        app_name: String,
    },
    ModifyApp {
        app_name: String,
        quota: Option<i64>,
    },
    CreateZone {
        zone: ZoneMeta,
    },
    DropZone {
        app_name: String,
        zone_name: String,
    },
    ModifyZone {
        app_name: String,
        zone_name: String,
        quota: Option<i64>,
    },
    CreateServlet {
        servlet: ServletMeta,
    },
    DropServlet {
        app_name: String,
        zone_name: String,
        servlet_name: String,
    },
    ModifyServlet {
        app_name: String,
        zone_name: String,
        servlet_name: String,
    },
    /// Upsert: re-registering an existing address refreshes its fields and
    /// mtime instead of failing.
    AddInstance {
        instance: InstanceMeta,
    },
    UpdateInstance {
        instance: InstanceMeta,
    },
    DropInstance {
        address: String,
    },
    CreateUser {
        user: UserPrivilege,
    },
    DropUser {
        username: String,
    },
    AddPrivilege {
        change: PrivilegeChange,
    },
    DropPrivilege {
        change: PrivilegeChange,
    },
    CreateConfig {
        config_name: String,
        version: Version,
        content: String,
        config_type: crate::ConfigType,
        time: i64,
    },
    RemoveConfig {
        config_name: String,
        version: Option<Version>,
        all: bool,
    },
}

impl AppData for RegistryCmd {}

/// What the registry state machine replies after applying a command.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryApplied {
    pub errcode: ErrCode,
    pub errmsg: String,
}

impl RegistryApplied {
    pub fn ok() -> Self {
        Self {
            errcode: ErrCode::Success,
            errmsg: "success".to_string(),
        }
    }

    pub fn err(errcode: ErrCode, errmsg: impl Into<String>) -> Self {
        Self {
            errcode,
            errmsg: errmsg.into(),
        }
    }
}

impl AppDataResponse for RegistryApplied {}

/// The command record of the auto-increment raft group.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum AutoIncrCmd {
    AddServletId {
        servlet_id: i64,
        start: u64,
    },
    DropServletId {
        servlet_id: i64,
    },
    GenId {
        servlet_id: i64,
        count: u64,
    },
    /// Reset or advance a counter. Moving it backwards requires `force`.
    Update {
        servlet_id: i64,
        start: Option<u64>,
        increment: Option<u64>,
        force: bool,
    },
}

impl AppData for AutoIncrCmd {}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoIncrApplied {
    pub errcode: ErrCode,
    pub errmsg: String,
    pub start_id: u64,
    pub end_id: u64,
}

impl AutoIncrApplied {
    pub fn ok() -> Self {
        Self {
            errcode: ErrCode::Success,
            errmsg: "success".to_string(),
            start_id: 0,
            end_id: 0,
        }
    }

    pub fn range(start_id: u64, end_id: u64) -> Self {
        Self {
            errcode: ErrCode::Success,
            errmsg: "success".to_string(),
            start_id,
            end_id,
        }
    }

    pub fn err(errcode: ErrCode, errmsg: impl Into<String>) -> Self {
        Self {
            errcode,
            errmsg: errmsg.into(),
            start_id: 0,
            end_id: 0,
        }
    }
}

impl AppDataResponse for AutoIncrApplied {}

/// The command record of the TSO raft group. Timestamps themselves are
/// never replicated; only the durable issuing bound is.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum TsoCmd {
    /// Extend the physical bound below which the leader may issue.
    UpdateSave { save_physical: i64 },
    /// Operator reset. Going backwards requires `force`.
    Reset {
        timestamp: TsoTimestamp,
        save_physical: i64,
        force: bool,
    },
}

impl AppData for TsoCmd {}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TsoApplied {
    pub errcode: ErrCode,
    pub errmsg: String,
    pub save_physical: i64,
}

impl TsoApplied {
    pub fn ok(save_physical: i64) -> Self {
        Self {
            errcode: ErrCode::Success,
            errmsg: "success".to_string(),
            save_physical,
        }
    }

    pub fn err(errcode: ErrCode, errmsg: impl Into<String>) -> Self {
        Self {
            errcode,
            errmsg: errmsg.into(),
            save_physical: 0,
        }
    }
}

impl AppDataResponse for TsoApplied {}
