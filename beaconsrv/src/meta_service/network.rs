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

use std::marker::PhantomData;
use std::time::Duration;

use async_raft::raft::AppendEntriesRequest;
use async_raft::raft::AppendEntriesResponse;
use async_raft::raft::InstallSnapshotRequest;
use async_raft::raft::InstallSnapshotResponse;
use async_raft::raft::VoteRequest;
use async_raft::raft::VoteResponse;
use async_raft::AppData;
use async_raft::NodeId;
use async_raft::RaftNetwork;
use async_trait::async_trait;
use beacon_raft_store::RaftConfig;
use common_exception::ErrorCode;
use common_tracing::tracing;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Carries raft RPCs of one group to its peers over the same HTTP
/// surface that serves clients, under `/raft/{group}/...`.
pub struct HttpNetwork<D: AppData> {
    group: &'static str,
    config: RaftConfig,
    client: reqwest::Client,
    _p: PhantomData<fn() -> D>,
}

impl<D: AppData> HttpNetwork<D> {
    pub fn new(group: &'static str, config: RaftConfig) -> common_exception::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(ErrorCode::from_std_error)?;

        Ok(HttpNetwork {
            group,
            config,
            client,
            _p: PhantomData,
        })
    }

    async fn post<Q, R>(&self, target: NodeId, path: &str, req: &Q) -> anyhow::Result<R>
    where
        Q: Serialize + Sync,
        R: DeserializeOwned,
    {
        let addr = self.config.address_of(target)?;
        let url = format!("http://{}/raft/{}/{}", addr, self.group, path);

        let resp = self.client.post(&url).json(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            tracing::debug!("raft rpc {} to {} failed: {}", path, addr, status);
            anyhow::bail!("raft rpc {} to node {} failed: {}", path, target, status);
        }
        let reply = resp.json::<R>().await?;
        Ok(reply)
    }
}

#[async_trait]
impl<D: AppData> RaftNetwork<D> for HttpNetwork<D> {
    async fn append_entries(
        &self,
        target: NodeId,
        rpc: AppendEntriesRequest<D>,
    ) -> anyhow::Result<AppendEntriesResponse> {
        self.post(target, "append-entries", &rpc).await
    }

    async fn install_snapshot(
        &self,
        target: NodeId,
        rpc: InstallSnapshotRequest,
    ) -> anyhow::Result<InstallSnapshotResponse> {
        self.post(target, "install-snapshot", &rpc).await
    }

    async fn vote(&self, target: NodeId, rpc: VoteRequest) -> anyhow::Result<VoteResponse> {
        self.post(target, "vote", &rpc).await
    }
}
