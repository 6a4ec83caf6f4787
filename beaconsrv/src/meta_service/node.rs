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

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_raft::raft::ClientWriteRequest;
use async_raft::ClientWriteError;
use async_raft::NodeId;
use async_raft::Raft;
use async_raft::State;
use beacon_raft_store::state_machine::AutoIncrSm;
use beacon_raft_store::state_machine::RegistrySm;
use beacon_raft_store::state_machine::TsoSm;
use beacon_raft_store::GroupRaftStore;
use beacon_types::AutoIncrApplied;
use beacon_types::AutoIncrCmd;
use beacon_types::RegistryApplied;
use beacon_types::RegistryCmd;
use beacon_types::TsoApplied;
use beacon_types::TsoCmd;
use common_base::now_secs;
use common_base::tokio;
use common_base::tokio::sync::watch;
use common_base::tokio::task::JoinHandle;
use common_exception::ErrorCode;
use common_exception::Result;
use common_tracing::tracing;

use crate::configs::Config;
use crate::meta_service::tso_runtime;
use crate::meta_service::HttpNetwork;

pub type RegistryRaft =
    Raft<RegistryCmd, RegistryApplied, HttpNetwork<RegistryCmd>, GroupRaftStore<RegistrySm>>;
pub type AutoIncrRaft =
    Raft<AutoIncrCmd, AutoIncrApplied, HttpNetwork<AutoIncrCmd>, GroupRaftStore<AutoIncrSm>>;
pub type TsoRaft = Raft<TsoCmd, TsoApplied, HttpNetwork<TsoCmd>, GroupRaftStore<TsoSm>>;

/// Why a proposal did not come back applied.
pub enum ProposeError {
    /// This replica is not the leader; `leader` is the remembered
    /// endpoint, possibly empty during an election.
    NotLeader { leader: String },
    Fatal(String),
}

/// One replica of the discovery cluster: the three replication groups,
/// their stores, and the housekeeping fibers around them.
pub struct DiscoveryNode {
    pub config: Config,

    pub registry_store: Arc<GroupRaftStore<RegistrySm>>,
    pub autoincr_store: Arc<GroupRaftStore<AutoIncrSm>>,
    pub tso_store: Arc<GroupRaftStore<TsoSm>>,

    pub registry_raft: RegistryRaft,
    pub autoincr_raft: AutoIncrRaft,
    pub tso_raft: TsoRaft,

    initialized: AtomicBool,

    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,

    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl DiscoveryNode {
    /// Open (or create) the three stores and hand each to its raft
    /// instance. `start` must be called before serving.
    pub async fn open(config: Config) -> Result<Arc<DiscoveryNode>> {
        let rc = &config.raft_config;

        let registry_store = Arc::new(
            GroupRaftStore::open_create(rc, RegistrySm::open(rc).await?, Some(()), Some(()))
                .await?,
        );
        let autoincr_store = Arc::new(
            GroupRaftStore::open_create(rc, AutoIncrSm::new(), Some(()), Some(())).await?,
        );
        let tso_store =
            Arc::new(GroupRaftStore::open_create(rc, TsoSm::new(), Some(()), Some(())).await?);

        let registry_raft = Raft::new(
            rc.id,
            rc.raft_config("registry")?,
            Arc::new(HttpNetwork::new("registry", rc.clone())?),
            registry_store.clone(),
        );
        let autoincr_raft = Raft::new(
            rc.id,
            rc.raft_config("autoincr")?,
            Arc::new(HttpNetwork::new("autoincr", rc.clone())?),
            autoincr_store.clone(),
        );
        let tso_raft = Raft::new(
            rc.id,
            rc.raft_config("tso")?,
            Arc::new(HttpNetwork::new("tso", rc.clone())?),
            tso_store.clone(),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Arc::new(DiscoveryNode {
            config,
            registry_store,
            autoincr_store,
            tso_store,
            registry_raft,
            autoincr_raft,
            tso_raft,
            initialized: AtomicBool::new(false),
            shutdown_tx,
            shutdown_rx,
            tasks: std::sync::Mutex::new(vec![]),
        }))
    }

    /// Bootstrap membership on first boot and launch housekeeping fibers.
    pub async fn start(node: &Arc<DiscoveryNode>) -> Result<()> {
        let first_boot = !node.registry_store.is_open();

        if first_boot {
            let members: HashSet<NodeId> =
                node.config.raft_config.node_ids().into_iter().collect();
            tracing::info!("first boot, initializing groups with {:?}", members);

            // Every replica proposes the same initial membership; raft
            // lets exactly one initialization win per group.
            if let Err(e) = node.registry_raft.initialize(members.clone()).await {
                tracing::info!("registry initialize: {}", e);
            }
            if let Err(e) = node.autoincr_raft.initialize(members.clone()).await {
                tracing::info!("autoincr initialize: {}", e);
            }
            if let Err(e) = node.tso_raft.initialize(members).await {
                tracing::info!("tso initialize: {}", e);
            }

            node.write_init_sentinel()?;
        }

        node.spawn_task(tso_runtime::spawn_tso_runtime(node.clone()));
        Self::spawn_flush_fiber(node);
        if node.config.instance_ttl_s > 0 {
            Self::spawn_instance_ttl_fiber(node);
        }

        node.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn write_init_sentinel(&self) -> Result<()> {
        let dir = &self.config.raft_config.raft_dir;
        std::fs::create_dir_all(dir)?;
        std::fs::write(Path::new(dir).join("init.success"), b"ok\n")?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn spawn_task(&self, h: JoinHandle<()>) {
        self.tasks.lock().unwrap().push(h);
    }

    fn spawn_flush_fiber(node: &Arc<DiscoveryNode>) {
        let mut rx = node.shutdown_rx.clone();
        let period = Duration::from_secs(node.config.flush_interval_s.max(1));

        node.spawn_task(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = rx.changed() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = common_sled_store::get_sled_db().flush_async().await {
                            tracing::warn!("periodic flush failed: {}", e);
                        }
                    }
                }
            }
        }));
    }

    /// Leader-side sweep proposing DropInstance for entries whose mtime
    /// fell behind the configured TTL.
    fn spawn_instance_ttl_fiber(this: &Arc<DiscoveryNode>) {
        let node = this.clone();
        let mut rx = this.shutdown_rx.clone();
        let ttl = this.config.instance_ttl_s;
        let period = Duration::from_secs((ttl / 2).max(1) as u64);

        this.spawn_task(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = rx.changed() => break,
                    _ = ticker.tick() => {
                        if !node.is_registry_leader() {
                            continue;
                        }
                        let now = now_secs();
                        let stale: Vec<String> = {
                            let sm = node.registry_store.state_machine.read().await;
                            sm.flatten_instances(None, None, None)
                                .into_iter()
                                .filter(|i| now - i.mtime > ttl)
                                .map(|i| i.address)
                                .collect()
                        };
                        for address in stale {
                            tracing::info!("instance ttl expired, dropping {}", address);
                            let _ = node
                                .write_registry(RegistryCmd::DropInstance { address })
                                .await;
                        }
                    }
                }
            }
        }));
    }

    pub fn is_registry_leader(&self) -> bool {
        self.registry_raft.metrics().borrow().state == State::Leader
    }

    pub fn is_tso_leader(&self) -> bool {
        self.tso_raft.metrics().borrow().state == State::Leader
    }

    fn addr_of(&self, id: Option<NodeId>) -> String {
        id.and_then(|id| self.config.raft_config.address_of(id).ok())
            .unwrap_or_default()
    }

    pub fn registry_leader_hint(&self) -> String {
        self.addr_of(self.registry_raft.metrics().borrow().current_leader)
    }

    pub fn autoincr_leader_hint(&self) -> String {
        self.addr_of(self.autoincr_raft.metrics().borrow().current_leader)
    }

    pub fn tso_leader_hint(&self) -> String {
        self.addr_of(self.tso_raft.metrics().borrow().current_leader)
    }

    pub async fn write_registry(
        &self,
        cmd: RegistryCmd,
    ) -> std::result::Result<RegistryApplied, ProposeError> {
        metrics::increment_counter!("beacon_registry_proposals");
        match self
            .registry_raft
            .client_write(ClientWriteRequest::new(cmd))
            .await
        {
            Ok(resp) => Ok(resp.data),
            Err(ClientWriteError::ForwardToLeader(_, leader)) => Err(ProposeError::NotLeader {
                leader: self.addr_of(leader),
            }),
            Err(ClientWriteError::RaftError(e)) => Err(ProposeError::Fatal(e.to_string())),
        }
    }

    pub async fn write_autoincr(
        &self,
        cmd: AutoIncrCmd,
    ) -> std::result::Result<AutoIncrApplied, ProposeError> {
        metrics::increment_counter!("beacon_autoincr_proposals");
        match self
            .autoincr_raft
            .client_write(ClientWriteRequest::new(cmd))
            .await
        {
            Ok(resp) => Ok(resp.data),
            Err(ClientWriteError::ForwardToLeader(_, leader)) => Err(ProposeError::NotLeader {
                leader: self.addr_of(leader),
            }),
            Err(ClientWriteError::RaftError(e)) => Err(ProposeError::Fatal(e.to_string())),
        }
    }

    pub async fn write_tso(&self, cmd: TsoCmd) -> std::result::Result<TsoApplied, ProposeError> {
        match self.tso_raft.client_write(ClientWriteRequest::new(cmd)).await {
            Ok(resp) => Ok(resp.data),
            Err(ClientWriteError::ForwardToLeader(_, leader)) => Err(ProposeError::NotLeader {
                leader: self.addr_of(leader),
            }),
            Err(ClientWriteError::RaftError(e)) => Err(ProposeError::Fatal(e.to_string())),
        }
    }

    /// Stop background fibers, shut the raft cores down and flush.
    pub async fn close(&self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.registry_raft.clone().shutdown().await {
            tracing::warn!("registry raft shutdown: {}", e);
        }
        if let Err(e) = self.autoincr_raft.clone().shutdown().await {
            tracing::warn!("autoincr raft shutdown: {}", e);
        }
        if let Err(e) = self.tso_raft.clone().shutdown().await {
            tracing::warn!("tso raft shutdown: {}", e);
        }

        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap();
            tasks.drain(..).collect()
        };
        for h in handles {
            let _ = h.await;
        }

        common_sled_store::get_sled_db()
            .flush_async()
            .await
            .map_err(|e| ErrorCode::MetaStoreDamaged(format!("final flush: {}", e)))?;
        Ok(())
    }
}
