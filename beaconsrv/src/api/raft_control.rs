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

//! Operator endpoints of the replication groups: status, snapshot,
//! membership change, shutdown.

use std::collections::BTreeSet;
use std::collections::HashSet;
use std::sync::Arc;

use async_raft::NodeId;
use async_raft::Raft;
use async_raft::RaftStorage;
use axum::extract::Extension;
use axum::Json;
use beacon_raft_store::state_machine::GroupStateMachine;
use beacon_raft_store::GroupRaftStore;
use beacon_types::ErrCode;
use beacon_types::RaftControlOp;
use beacon_types::RaftControlRequest;
use beacon_types::RaftControlResponse;
use beacon_types::RaftGroup;
use common_tracing::tracing;

use crate::meta_service::DiscoveryNode;
use crate::meta_service::HttpNetwork;

fn err_resp(errcode: ErrCode, errmsg: impl Into<String>) -> RaftControlResponse {
    RaftControlResponse {
        errcode,
        errmsg: errmsg.into(),
        ..Default::default()
    }
}

pub async fn raft_control(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<RaftControlRequest>,
) -> Json<RaftControlResponse> {
    if !node.is_initialized() {
        return Json(err_resp(ErrCode::HaveNotInit, "server not initialized"));
    }

    let resp = match req.group {
        RaftGroup::Registry => {
            control_group(
                &node,
                &node.registry_raft,
                &node.registry_store,
                &req,
            )
            .await
        }
        RaftGroup::AutoIncr => {
            control_group(
                &node,
                &node.autoincr_raft,
                &node.autoincr_store,
                &req,
            )
            .await
        }
        RaftGroup::Tso => control_group(&node, &node.tso_raft, &node.tso_store, &req).await,
    };
    Json(resp)
}

async fn control_group<SM: GroupStateMachine>(
    node: &Arc<DiscoveryNode>,
    raft: &Raft<SM::Cmd, SM::Resp, HttpNetwork<SM::Cmd>, GroupRaftStore<SM>>,
    store: &Arc<GroupRaftStore<SM>>,
    req: &RaftControlRequest,
) -> RaftControlResponse {
    let config = &node.config.raft_config;

    let member_addrs = |members: &HashSet<NodeId>| -> Vec<String> {
        let mut addrs: Vec<String> = members
            .iter()
            .filter_map(|id| config.address_of(*id).ok())
            .collect();
        addrs.sort();
        addrs
    };

    match req.op_type {
        RaftControlOp::GetLeader => {
            let metrics = raft.metrics().borrow().clone();
            RaftControlResponse {
                errcode: ErrCode::Success,
                errmsg: "success".to_string(),
                leader: metrics
                    .current_leader
                    .and_then(|id| config.address_of(id).ok())
                    .unwrap_or_default(),
                peers: member_addrs(&metrics.membership_config.members),
            }
        }

        RaftControlOp::SnapShot => match store.do_log_compaction().await {
            Ok(snap) => {
                tracing::info!("{} snapshot triggered at {}", SM::group(), snap.index);
                err_resp(ErrCode::Success, format!("snapshot at {}", snap.index))
            }
            Err(e) => err_resp(ErrCode::ExecFail, format!("snapshot failed: {}", e)),
        },

        RaftControlOp::SetPeer => {
            let metrics = raft.metrics().borrow().clone();
            let current: BTreeSet<String> =
                member_addrs(&metrics.membership_config.members).into_iter().collect();
            let old: BTreeSet<String> = req.old_peers.iter().cloned().collect();
            if current != old {
                return err_resp(
                    ErrCode::PeerNotEqual,
                    format!("current peers are {:?}", current),
                );
            }

            let mut new_ids = HashSet::new();
            for addr in &req.new_peers {
                match config.peers.iter().position(|p| p == addr) {
                    None => {
                        return err_resp(
                            ErrCode::InputParamError,
                            format!("{} is not a configured peer", addr),
                        );
                    }
                    Some(id) => {
                        new_ids.insert(id as NodeId);
                    }
                }
            }

            match raft.change_membership(new_ids).await {
                Ok(_) => err_resp(ErrCode::Success, "membership changed"),
                Err(e) => err_resp(ErrCode::ExecFail, format!("change membership: {}", e)),
            }
        }

        RaftControlOp::ShutDown => match raft.clone().shutdown().await {
            Ok(_) => err_resp(ErrCode::Success, "raft group shut down"),
            Err(e) => err_resp(ErrCode::ExecFail, format!("shutdown: {}", e)),
        },

        RaftControlOp::Vote => err_resp(
            ErrCode::ExecFail,
            "forcing an election is not supported by the replication engine",
        ),

        RaftControlOp::TransLeader => err_resp(
            ErrCode::ExecFail,
            "leadership transfer is not supported by the replication engine",
        ),
    }
}
