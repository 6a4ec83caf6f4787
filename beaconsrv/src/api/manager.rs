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

use axum::extract::Extension;
use axum::Json;
use beacon_raft_store::state_machine::hash_password;
use beacon_types::AutoIncrCmd;
use beacon_types::ErrCode;
use beacon_types::ManagerRequest;
use beacon_types::ManagerResponse;
use beacon_types::OpType;
use beacon_types::PrivilegeChange;
use beacon_types::RegistryCmd;
use beacon_types::UserPrivilege;
use common_base::now_secs;
use semver::Version;

use crate::meta_service::DiscoveryNode;
use crate::meta_service::ProposeError;

fn err_resp(errcode: ErrCode, errmsg: impl Into<String>) -> ManagerResponse {
    ManagerResponse {
        errcode,
        errmsg: errmsg.into(),
        ..Default::default()
    }
}

fn parse_version(v: &str) -> std::result::Result<Version, ManagerResponse> {
    Version::parse(v)
        .map_err(|e| err_resp(ErrCode::InputParamError, format!("bad semver {}: {}", v, e)))
}

/// Translate a manager request into the registry command record that
/// enters the log. `now` is the wall clock the front-end stamps into
/// instance/config records so that apply stays deterministic.
pub fn registry_cmd_of(
    req: &ManagerRequest,
    now: i64,
) -> std::result::Result<RegistryCmd, ManagerResponse> {
    let missing = |what: &str| err_resp(ErrCode::ParseFromPbFail, format!("missing {}", what));

    let cmd = match req.op_type {
        OpType::OpCreateApp => {
            let app = req.app.as_ref().ok_or_else(|| missing("app"))?;
            RegistryCmd::CreateApp {
                app_name: app.app_name.clone(),
                quota: app.quota,
            }
        }
        OpType::OpDropApp => {
            let app = req.app.as_ref().ok_or_else(|| missing("app"))?;
            RegistryCmd::DropApp {
                app_name: app.app_name.clone(),
            }
        }
        OpType::OpModifyApp => {
            let app = req.app.as_ref().ok_or_else(|| missing("app"))?;
            RegistryCmd::ModifyApp {
                app_name: app.app_name.clone(),
                quota: Some(app.quota),
            }
        }
        OpType::OpCreateZone => {
            let zone = req.zone.as_ref().ok_or_else(|| missing("zone"))?;
            RegistryCmd::CreateZone { zone: zone.clone() }
        }
        OpType::OpDropZone => {
            let zone = req.zone.as_ref().ok_or_else(|| missing("zone"))?;
            RegistryCmd::DropZone {
                app_name: zone.app_name.clone(),
                zone_name: zone.zone_name.clone(),
            }
        }
        OpType::OpModifyZone => {
            let zone = req.zone.as_ref().ok_or_else(|| missing("zone"))?;
            RegistryCmd::ModifyZone {
                app_name: zone.app_name.clone(),
                zone_name: zone.zone_name.clone(),
                quota: Some(zone.quota),
            }
        }
        OpType::OpCreateServlet => {
            let servlet = req.servlet.as_ref().ok_or_else(|| missing("servlet"))?;
            RegistryCmd::CreateServlet {
                servlet: servlet.clone(),
            }
        }
        OpType::OpDropServlet => {
            let servlet = req.servlet.as_ref().ok_or_else(|| missing("servlet"))?;
            RegistryCmd::DropServlet {
                app_name: servlet.app_name.clone(),
                zone_name: servlet.zone_name.clone(),
                servlet_name: servlet.servlet_name.clone(),
            }
        }
        OpType::OpModifyServlet => {
            let servlet = req.servlet.as_ref().ok_or_else(|| missing("servlet"))?;
            RegistryCmd::ModifyServlet {
                app_name: servlet.app_name.clone(),
                zone_name: servlet.zone_name.clone(),
                servlet_name: servlet.servlet_name.clone(),
            }
        }
        OpType::OpAddInstance => {
            let mut instance = req.instance.clone().ok_or_else(|| missing("instance"))?;
            instance.mtime = now;
            RegistryCmd::AddInstance { instance }
        }
        OpType::OpUpdateInstance => {
            let mut instance = req.instance.clone().ok_or_else(|| missing("instance"))?;
            instance.mtime = now;
            RegistryCmd::UpdateInstance { instance }
        }
        OpType::OpDropInstance => {
            let instance = req.instance.as_ref().ok_or_else(|| missing("instance"))?;
            RegistryCmd::DropInstance {
                address: instance.address.clone(),
            }
        }
        OpType::OpCreateUser => {
            let user = req.user.as_ref().ok_or_else(|| missing("user"))?;
            RegistryCmd::CreateUser {
                user: UserPrivilege {
                    username: user.username.clone(),
                    password_hash: hash_password(&user.password),
                    ips: user.ips.clone(),
                    zone_privileges: user.zone_privileges.clone(),
                    servlet_privileges: user.servlet_privileges.clone(),
                    version: 0,
                },
            }
        }
        OpType::OpDropUser => {
            let user = req.user.as_ref().ok_or_else(|| missing("user"))?;
            RegistryCmd::DropUser {
                username: user.username.clone(),
            }
        }
        OpType::OpAddPrivilege | OpType::OpDropPrivilege => {
            let p = req.privilege.as_ref().ok_or_else(|| missing("privilege"))?;
            let change = PrivilegeChange {
                username: p.username.clone(),
                password: p.password.as_deref().map(hash_password),
                ips: p.ips.clone(),
                zone_privileges: p.zone_privileges.clone(),
                servlet_privileges: p.servlet_privileges.clone(),
            };
            if req.op_type == OpType::OpAddPrivilege {
                RegistryCmd::AddPrivilege { change }
            } else {
                RegistryCmd::DropPrivilege { change }
            }
        }
        OpType::OpCreateConfig => {
            let config = req.config.as_ref().ok_or_else(|| missing("config"))?;
            let version = config
                .version
                .as_deref()
                .ok_or_else(|| missing("config version"))?;
            RegistryCmd::CreateConfig {
                config_name: config.config_name.clone(),
                version: parse_version(version)?,
                content: config.content.clone(),
                config_type: config.config_type,
                time: now,
            }
        }
        OpType::OpRemoveConfig => {
            let config = req.config.as_ref().ok_or_else(|| missing("config"))?;
            let version = match config.version.as_deref() {
                None => None,
                Some(v) => Some(parse_version(v)?),
            };
            RegistryCmd::RemoveConfig {
                config_name: config.config_name.clone(),
                version,
                all: config.all,
            }
        }
        _ => {
            return Err(err_resp(
                ErrCode::InputParamError,
                "not a registry operation",
            ));
        }
    };

    Ok(cmd)
}

/// Translate a manager request into an auto-increment command record.
pub fn autoincr_cmd_of(req: &ManagerRequest) -> std::result::Result<AutoIncrCmd, ManagerResponse> {
    let incr = req
        .auto_increment
        .as_ref()
        .ok_or_else(|| err_resp(ErrCode::ParseFromPbFail, "missing auto_increment"))?;

    let cmd = match req.op_type {
        OpType::OpAddIdForAutoIncrement => AutoIncrCmd::AddServletId {
            servlet_id: incr.servlet_id,
            start: incr.start.unwrap_or(1),
        },
        OpType::OpDropIdForAutoIncrement => AutoIncrCmd::DropServletId {
            servlet_id: incr.servlet_id,
        },
        OpType::OpGenIdForAutoIncrement => AutoIncrCmd::GenId {
            servlet_id: incr.servlet_id,
            count: incr.count.max(1),
        },
        OpType::OpUpdateForAutoIncrement => AutoIncrCmd::Update {
            servlet_id: incr.servlet_id,
            start: incr.start,
            increment: incr.increment,
            force: incr.force,
        },
        _ => {
            return Err(err_resp(
                ErrCode::InputParamError,
                "not an auto-increment operation",
            ));
        }
    };
    Ok(cmd)
}

fn is_autoincr_op(op: OpType) -> bool {
    matches!(
        op,
        OpType::OpAddIdForAutoIncrement
            | OpType::OpDropIdForAutoIncrement
            | OpType::OpGenIdForAutoIncrement
            | OpType::OpUpdateForAutoIncrement
    )
}

pub async fn discovery_manager(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<ManagerRequest>,
) -> Json<ManagerResponse> {
    Json(manage(&node, req).await)
}

async fn manage(node: &Arc<DiscoveryNode>, req: ManagerRequest) -> ManagerResponse {
    if !node.is_initialized() {
        return err_resp(ErrCode::HaveNotInit, "server not initialized");
    }

    if is_autoincr_op(req.op_type) {
        let cmd = match autoincr_cmd_of(&req) {
            Ok(cmd) => cmd,
            Err(resp) => return resp,
        };
        return match node.write_autoincr(cmd).await {
            Ok(applied) => ManagerResponse {
                errcode: applied.errcode,
                errmsg: applied.errmsg,
                start_id: (req.op_type == OpType::OpGenIdForAutoIncrement)
                    .then(|| applied.start_id),
                end_id: (req.op_type == OpType::OpGenIdForAutoIncrement).then(|| applied.end_id),
                ..Default::default()
            },
            Err(ProposeError::NotLeader { leader }) => ManagerResponse {
                errcode: ErrCode::NotLeader,
                errmsg: "not leader".to_string(),
                leader,
                ..Default::default()
            },
            Err(ProposeError::Fatal(msg)) => err_resp(ErrCode::InternalError, msg),
        };
    }

    let cmd = match registry_cmd_of(&req, now_secs()) {
        Ok(cmd) => cmd,
        Err(resp) => return resp,
    };
    match node.write_registry(cmd).await {
        Ok(applied) => ManagerResponse {
            errcode: applied.errcode,
            errmsg: applied.errmsg,
            ..Default::default()
        },
        Err(ProposeError::NotLeader { leader }) => ManagerResponse {
            errcode: ErrCode::NotLeader,
            errmsg: "not leader".to_string(),
            leader,
            ..Default::default()
        },
        Err(ProposeError::Fatal(msg)) => err_resp(ErrCode::InternalError, msg),
    }
}
