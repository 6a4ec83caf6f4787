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

//! Peer-to-peer raft RPC endpoints, one triple per replication group.

use std::sync::Arc;

use async_raft::raft::AppendEntriesRequest;
use async_raft::raft::AppendEntriesResponse;
use async_raft::raft::InstallSnapshotRequest;
use async_raft::raft::InstallSnapshotResponse;
use async_raft::raft::VoteRequest;
use async_raft::raft::VoteResponse;
use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use beacon_types::AutoIncrCmd;
use beacon_types::RegistryCmd;

use crate::meta_service::DiscoveryNode;

type RaftApiResult<T> = std::result::Result<Json<T>, (StatusCode, String)>;

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

pub async fn registry_append(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<AppendEntriesRequest<RegistryCmd>>,
) -> RaftApiResult<AppendEntriesResponse> {
    node.registry_raft
        .append_entries(req)
        .await
        .map(Json)
        .map_err(internal)
}

pub async fn registry_vote(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<VoteRequest>,
) -> RaftApiResult<VoteResponse> {
    node.registry_raft.vote(req).await.map(Json).map_err(internal)
}

pub async fn registry_install_snapshot(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<InstallSnapshotRequest>,
) -> RaftApiResult<InstallSnapshotResponse> {
    node.registry_raft
        .install_snapshot(req)
        .await
        .map(Json)
        .map_err(internal)
}

pub async fn autoincr_append(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<AppendEntriesRequest<AutoIncrCmd>>,
) -> RaftApiResult<AppendEntriesResponse> {
    node.autoincr_raft
        .append_entries(req)
        .await
        .map(Json)
        .map_err(internal)
}

pub async fn autoincr_vote(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<VoteRequest>,
) -> RaftApiResult<VoteResponse> {
    node.autoincr_raft.vote(req).await.map(Json).map_err(internal)
}

pub async fn autoincr_install_snapshot(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<InstallSnapshotRequest>,
) -> RaftApiResult<InstallSnapshotResponse> {
    node.autoincr_raft
        .install_snapshot(req)
        .await
        .map(Json)
        .map_err(internal)
}

pub async fn tso_append(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<AppendEntriesRequest<beacon_types::TsoCmd>>,
) -> RaftApiResult<AppendEntriesResponse> {
    node.tso_raft
        .append_entries(req)
        .await
        .map(Json)
        .map_err(internal)
}

pub async fn tso_vote(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<VoteRequest>,
) -> RaftApiResult<VoteResponse> {
    node.tso_raft.vote(req).await.map(Json).map_err(internal)
}

pub async fn tso_install_snapshot(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<InstallSnapshotRequest>,
) -> RaftApiResult<InstallSnapshotResponse> {
    node.tso_raft
        .install_snapshot(req)
        .await
        .map(Json)
        .map_err(internal)
}
