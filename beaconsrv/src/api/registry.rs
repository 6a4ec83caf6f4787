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

//! Instance lifecycle from the servlet's side: registry, update, cancel.
//! A registration heartbeat is an upsert; the front-end stamps `mtime`
//! here so the state machine never reads a clock.

use std::sync::Arc;

use axum::extract::Extension;
use axum::Json;
use beacon_types::ErrCode;
use beacon_types::InstanceMeta;
use beacon_types::RegisterRequest;
use beacon_types::RegisterResponse;
use beacon_types::RegistryCmd;
use common_base::now_secs;

use crate::meta_service::DiscoveryNode;
use crate::meta_service::ProposeError;

fn instance_of(req: &RegisterRequest) -> Option<InstanceMeta> {
    if req.app_name.is_empty()
        || req.zone_name.is_empty()
        || req.servlet_name.is_empty()
        || req.address.is_empty()
    {
        return None;
    }
    Some(InstanceMeta {
        app_name: req.app_name.clone(),
        zone_name: req.zone_name.clone(),
        servlet_name: req.servlet_name.clone(),
        address: req.address.clone(),
        env: req.env.clone(),
        color: req.color.clone(),
        status: req.status.unwrap_or_default(),
        mtime: now_secs(),
        ..Default::default()
    })
}

async fn propose(node: &Arc<DiscoveryNode>, cmd: RegistryCmd) -> RegisterResponse {
    if !node.is_initialized() {
        return RegisterResponse {
            errcode: ErrCode::HaveNotInit,
            errmsg: "server not initialized".to_string(),
            ..Default::default()
        };
    }

    match node.write_registry(cmd).await {
        Ok(applied) => RegisterResponse {
            errcode: applied.errcode,
            errmsg: applied.errmsg,
            ..Default::default()
        },
        Err(ProposeError::NotLeader { leader }) => RegisterResponse {
            errcode: ErrCode::NotLeader,
            errmsg: "not leader".to_string(),
            leader,
        },
        Err(ProposeError::Fatal(msg)) => RegisterResponse {
            errcode: ErrCode::InternalError,
            errmsg: msg,
            ..Default::default()
        },
    }
}

fn bad_request() -> RegisterResponse {
    RegisterResponse {
        errcode: ErrCode::InputParamError,
        errmsg: "app, zone, servlet and address are required".to_string(),
        ..Default::default()
    }
}

pub async fn registry(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<RegisterRequest>,
) -> Json<RegisterResponse> {
    let instance = match instance_of(&req) {
        None => return Json(bad_request()),
        Some(i) => i,
    };
    Json(propose(&node, RegistryCmd::AddInstance { instance }).await)
}

pub async fn update(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<RegisterRequest>,
) -> Json<RegisterResponse> {
    let instance = match instance_of(&req) {
        None => return Json(bad_request()),
        Some(i) => i,
    };
    Json(propose(&node, RegistryCmd::UpdateInstance { instance }).await)
}

pub async fn cancel(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<RegisterRequest>,
) -> Json<RegisterResponse> {
    if req.address.is_empty() {
        return Json(bad_request());
    }
    Json(
        propose(
            &node,
            RegistryCmd::DropInstance {
                address: req.address.clone(),
            },
        )
        .await,
    )
}
