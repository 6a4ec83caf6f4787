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
use beacon_types::ErrCode;
use beacon_types::TsoCmd;
use beacon_types::TsoOpType;
use beacon_types::TsoRequest;
use beacon_types::TsoResponse;

use crate::meta_service::DiscoveryNode;
use crate::meta_service::ProposeError;

fn err_resp(errcode: ErrCode, errmsg: impl Into<String>) -> TsoResponse {
    TsoResponse {
        errcode,
        errmsg: errmsg.into(),
        ..Default::default()
    }
}

pub async fn tso_service(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<TsoRequest>,
) -> Json<TsoResponse> {
    if !node.is_initialized() {
        return Json(err_resp(ErrCode::HaveNotInit, "server not initialized"));
    }

    let resp = match req.op_type {
        TsoOpType::GenTso => gen_tso(&node, &req).await,
        TsoOpType::QueryTsoInfo => query_tso_info(&node).await,
        TsoOpType::ResetTso => reset_tso(&node, &req).await,
        TsoOpType::UpdateTso => update_tso(&node, &req).await,
    };
    Json(resp)
}

/// Allocation never proposes: the committed save window already covers
/// everything the leader may hand out; the TSO lock is the only fence.
async fn gen_tso(node: &Arc<DiscoveryNode>, req: &TsoRequest) -> TsoResponse {
    metrics::increment_counter!("beacon_tso_gen");

    if !node.is_tso_leader() {
        return TsoResponse {
            errcode: ErrCode::NotLeader,
            errmsg: "not leader".to_string(),
            leader: node.tso_leader_hint(),
            ..Default::default()
        };
    }

    let count = req.count.max(1);
    let mut sm = node.tso_store.state_machine.write().await;
    match sm.gen_tso(count) {
        Ok(timestamp) => TsoResponse {
            errcode: ErrCode::Success,
            errmsg: "success".to_string(),
            timestamp,
            count,
            ..Default::default()
        },
        Err(errcode) => err_resp(errcode, "tso not available, retry"),
    }
}

async fn query_tso_info(node: &Arc<DiscoveryNode>) -> TsoResponse {
    let sm = node.tso_store.state_machine.read().await;
    TsoResponse {
        errcode: ErrCode::Success,
        errmsg: "success".to_string(),
        leader: node.tso_leader_hint(),
        timestamp: sm.current(),
        save_physical: sm.last_save_physical(),
        ..Default::default()
    }
}

async fn reset_tso(node: &Arc<DiscoveryNode>, req: &TsoRequest) -> TsoResponse {
    let timestamp = match req.timestamp {
        None => return err_resp(ErrCode::InputParamError, "no timestamp to reset to"),
        Some(t) => t,
    };
    let save_physical = req
        .save_physical
        .unwrap_or(timestamp.physical + beacon_raft_store::state_machine::tso::SAVE_INTERVAL_MS);

    propose(
        node,
        TsoCmd::Reset {
            timestamp,
            save_physical,
            force: req.force,
        },
    )
    .await
}

async fn update_tso(node: &Arc<DiscoveryNode>, req: &TsoRequest) -> TsoResponse {
    let save_physical = match req.save_physical {
        None => return err_resp(ErrCode::InputParamError, "no save_physical"),
        Some(s) => s,
    };
    propose(node, TsoCmd::UpdateSave { save_physical }).await
}

async fn propose(node: &Arc<DiscoveryNode>, cmd: TsoCmd) -> TsoResponse {
    match node.write_tso(cmd).await {
        Ok(applied) => TsoResponse {
            errcode: applied.errcode,
            errmsg: applied.errmsg,
            save_physical: applied.save_physical,
            ..Default::default()
        },
        Err(ProposeError::NotLeader { leader }) => TsoResponse {
            errcode: ErrCode::NotLeader,
            errmsg: "not leader".to_string(),
            leader,
            ..Default::default()
        },
        Err(ProposeError::Fatal(msg)) => err_resp(ErrCode::InternalError, msg),
    }
}
