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

use std::time::Duration;

use beacon_types::ErrCode;
use beacon_types::ManagerRequest;
use beacon_types::ManagerResponse;
use beacon_types::NamingRequest;
use beacon_types::NamingResponse;
use beacon_types::QueryRequest;
use beacon_types::QueryResponse;
use beacon_types::RaftControlRequest;
use beacon_types::RaftControlResponse;
use beacon_types::RegisterRequest;
use beacon_types::RegisterResponse;
use beacon_types::TsoRequest;
use beacon_types::TsoResponse;
use beacon_types::WireResponse;
use common_base::tokio;
use common_exception::ErrorCode;
use common_exception::Result;
use common_infallible::RwLock;
use common_tracing::tracing;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A client that hides leader changes.
///
/// Requests go to the currently bound endpoint. A `NotLeader` reply
/// rebinds to the advertised leader; a transport error rotates to the
/// next configured endpoint. Both retry up to `retry_times` with a fixed
/// pause in between.
pub struct RouterClient {
    endpoints: Vec<String>,
    bound: RwLock<usize>,
    leader: RwLock<Option<String>>,
    retry_times: u32,
    retry_interval: Duration,
    http: reqwest::Client,
    verbose: bool,
}

impl RouterClient {
    pub fn new(endpoints: Vec<String>) -> Result<RouterClient> {
        Self::with_options(endpoints, 30_000, 3, 1_000, false)
    }

    pub fn with_options(
        endpoints: Vec<String>,
        timeout_ms: u64,
        retry_times: u32,
        retry_interval_ms: u64,
        verbose: bool,
    ) -> Result<RouterClient> {
        if endpoints.is_empty() {
            return Err(ErrorCode::InvalidConfig("no endpoint given"));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(ErrorCode::from_std_error)?;

        Ok(RouterClient {
            endpoints,
            bound: RwLock::new(0),
            leader: RwLock::new(None),
            retry_times,
            retry_interval: Duration::from_millis(retry_interval_ms),
            http,
            verbose,
        })
    }

    pub(crate) fn target(&self) -> String {
        if let Some(leader) = self.leader.read().clone() {
            return leader;
        }
        self.endpoints[*self.bound.read() % self.endpoints.len()].clone()
    }

    pub(crate) fn rotate(&self) {
        let mut bound = self.bound.write();
        *bound = (*bound + 1) % self.endpoints.len();
        *self.leader.write() = None;
    }

    fn rebind(&self, leader: &str) {
        *self.leader.write() = Some(leader.to_string());
    }

    /// Send `req` to `path`, retrying through leader changes and dead
    /// peers; gives up after `retry_times` retries.
    pub async fn send<Q, R>(&self, path: &str, req: &Q) -> Result<R>
    where
        Q: Serialize + Sync,
        R: DeserializeOwned + WireResponse,
    {
        let mut last_err = None;

        for attempt in 0..=self.retry_times {
            if attempt > 0 {
                tokio::time::sleep(self.retry_interval).await;
            }

            let target = self.target();
            let url = format!("http://{}/{}", target, path);

            let sent = self.http.post(&url).json(req).send().await;
            let resp = match sent {
                Err(e) => {
                    tracing::warn!("send to {} failed: {}", url, e);
                    last_err = Some(ErrorCode::from_std_error(e));
                    self.rotate();
                    continue;
                }
                Ok(r) => r,
            };

            let reply = match resp.json::<R>().await {
                Err(e) => {
                    last_err = Some(ErrorCode::from_std_error(e));
                    self.rotate();
                    continue;
                }
                Ok(r) => r,
            };

            if reply.errcode() == ErrCode::NotLeader {
                match reply.leader_hint() {
                    Some(leader) => {
                        if self.verbose {
                            tracing::info!("{} is not leader, rebind to {}", target, leader);
                        }
                        self.rebind(&leader.to_string());
                    }
                    None => self.rotate(),
                }
                last_err = Some(ErrorCode::UnknownException("not leader"));
                continue;
            }

            return Ok(reply);
        }

        Err(last_err.unwrap_or_else(|| {
            ErrorCode::Timeout(format!("request not served within {} retries", self.retry_times))
        }))
    }

    pub async fn discovery_manager(&self, req: &ManagerRequest) -> Result<ManagerResponse> {
        self.send("discovery/manager", req).await
    }

    pub async fn discovery_query(&self, req: &QueryRequest) -> Result<QueryResponse> {
        self.send("discovery/query", req).await
    }

    pub async fn naming(&self, req: &NamingRequest) -> Result<NamingResponse> {
        self.send("discovery/naming", req).await
    }

    pub async fn registry(&self, req: &RegisterRequest) -> Result<RegisterResponse> {
        self.send("discovery/registry", req).await
    }

    pub async fn update(&self, req: &RegisterRequest) -> Result<RegisterResponse> {
        self.send("discovery/update", req).await
    }

    pub async fn cancel(&self, req: &RegisterRequest) -> Result<RegisterResponse> {
        self.send("discovery/cancel", req).await
    }

    pub async fn tso(&self, req: &TsoRequest) -> Result<TsoResponse> {
        self.send("tso", req).await
    }

    pub async fn raft_control(&self, req: &RaftControlRequest) -> Result<RaftControlResponse> {
        self.send("raft/control", req).await
    }
}
