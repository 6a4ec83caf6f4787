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

use semver::Version;
use serde::Deserialize;
use serde::Serialize;

pub type MetaId = i64;
pub type MetaVersion = i64;

/// Top level of the registry hierarchy: a tenant application.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AppMeta {
    pub app_name: String,
    pub app_id: MetaId,
    pub quota: i64,
    pub version: MetaVersion,
}

/// A deployment zone under an app.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneMeta {
    pub app_name: String,
    pub zone_name: String,
    pub app_id: MetaId,
    pub zone_id: MetaId,
    pub quota: i64,
    pub version: MetaVersion,
}

/// A service under a zone; instances register below it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ServletMeta {
    pub app_name: String,
    pub zone_name: String,
    pub servlet_name: String,
    pub app_id: MetaId,
    pub zone_id: MetaId,
    pub servlet_id: MetaId,
    pub version: MetaVersion,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Normal,
    Migrate,
    Fault,
    Delay,
}

impl Default for InstanceStatus {
    fn default() -> Self {
        InstanceStatus::Normal
    }
}

/// A running process registered under app/zone/servlet, keyed by its
/// network address. `mtime` is wall-clock seconds at the last write and
/// drives the liveness filter of naming queries.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceMeta {
    pub app_name: String,
    pub zone_name: String,
    pub servlet_name: String,
    pub address: String,
    pub env: String,
    pub color: String,
    pub status: InstanceStatus,
    pub instance_id: MetaId,
    pub version: MetaVersion,
    pub mtime: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RW {
    Read,
    Write,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeZone {
    pub app_name: String,
    pub zone_name: String,
    pub rw: RW,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeServlet {
    pub app_name: String,
    pub zone_name: String,
    pub servlet_name: String,
    pub rw: RW,
}

/// An account with its allowed source addresses and granted privileges.
/// Only the sha-256 of the password is kept.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPrivilege {
    pub username: String,
    pub password_hash: String,
    pub ips: Vec<String>,
    pub zone_privileges: Vec<PrivilegeZone>,
    pub servlet_privileges: Vec<PrivilegeServlet>,
    pub version: MetaVersion,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigType {
    Json,
    Yaml,
    Toml,
    Ini,
    Text,
}

impl Default for ConfigType {
    fn default() -> Self {
        ConfigType::Json
    }
}

/// One published version of a named configuration blob. Configs are
/// immutable once created; versions of a name form a semver total order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConfigMeta {
    pub config_name: String,
    pub version: Version,
    pub content: String,
    pub config_type: ConfigType,
    pub config_id: MetaId,
    pub time: i64,
}

/// A timestamp issued by the oracle: wall milliseconds plus an 18-bit
/// logical counter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TsoTimestamp {
    pub physical: i64,
    pub logical: i64,
}
