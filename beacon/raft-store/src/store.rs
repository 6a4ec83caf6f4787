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

use std::io::Cursor;

use async_raft::raft::Entry;
use async_raft::raft::EntryPayload;
use async_raft::raft::MembershipConfig;
use async_raft::storage::CurrentSnapshotData;
use async_raft::storage::HardState;
use async_raft::storage::InitialState;
use async_raft::NodeId;
use async_raft::RaftStorage;
use async_trait::async_trait;
use common_base::tokio::sync::RwLock;
use common_exception::Result;
use common_sled_store::get_sled_db;
use common_sled_store::AsKeySpace;
use common_sled_store::SledTree;
use common_tracing::tracing;
use serde::Deserialize;
use serde::Serialize;

use crate::config::RaftConfig;
use crate::key_spaces::AppliedLogId;
use crate::key_spaces::StateMachineMeta;
use crate::key_spaces::StateMachineMetaKey;
use crate::key_spaces::StateMachineMetaValue;
use crate::log::RaftLog;
use crate::raft_state::RaftState;
use crate::state_machine::GroupStateMachine;

/// An error returned by the storage layer that raft must not try to
/// recover from.
#[derive(thiserror::Error, Debug)]
pub enum ShutdownError {
    #[error("unsafe storage error")]
    UnsafeStorageError,
}

/// The snapshot payload shipped between peers: where the machine stood,
/// under which membership, and its serialized state.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct SnapshotBlob {
    last_applied: AppliedLogId,
    membership: MembershipConfig,
    sm: Vec<u8>,
}

struct StoredSnapshot {
    index: u64,
    term: u64,
    membership: MembershipConfig,
    data: Vec<u8>,
}

/// Storage of one replication group: its log, its raft-persistent state
/// and one state machine, all on the shared sled db.
///
/// This is instantiated three times, once per group; everything
/// group-specific lives behind `GroupStateMachine`.
pub struct GroupRaftStore<SM: GroupStateMachine> {
    pub id: NodeId,

    config: RaftConfig,

    pub raft_state: RaftState,

    pub log: RaftLog<SM::Cmd>,

    sm_meta_tree: SledTree,

    pub state_machine: RwLock<SM>,

    current_snapshot: RwLock<Option<StoredSnapshot>>,
}

impl<SM: GroupStateMachine> GroupRaftStore<SM> {
    /// Open an existing store or create a new one.
    pub async fn open_create(
        config: &RaftConfig,
        sm: SM,
        open: Option<()>,
        create: Option<()>,
    ) -> Result<GroupRaftStore<SM>> {
        let group = SM::group();

        let raft_state = RaftState::open_create(config, group, open, create).await?;
        let log = RaftLog::<SM::Cmd>::open(config, group)?;

        let db = get_sled_db();
        let sm_meta_tree = SledTree::open(
            &db,
            config.tree_name(format!("sm-meta/{}", group)),
            config.is_sync(),
        )?;

        Ok(GroupRaftStore {
            id: raft_state.id,
            config: config.clone(),
            raft_state,
            log,
            sm_meta_tree,
            state_machine: RwLock::new(sm),
            current_snapshot: RwLock::new(None),
        })
    }

    pub fn is_open(&self) -> bool {
        self.raft_state.is_open()
    }

    pub fn config(&self) -> &RaftConfig {
        &self.config
    }

    fn sm_meta(&self) -> AsKeySpace<StateMachineMeta> {
        self.sm_meta_tree.key_space()
    }

    pub fn last_applied(&self) -> Result<AppliedLogId> {
        let v = self.sm_meta().get(&StateMachineMetaKey::LastApplied)?;
        match v {
            None => Ok(AppliedLogId::default()),
            Some(v) => Ok(AppliedLogId::try_from(v)?),
        }
    }

    async fn set_last_applied(&self, log_id: AppliedLogId) -> Result<()> {
        self.sm_meta()
            .insert(
                &StateMachineMetaKey::LastApplied,
                &StateMachineMetaValue::LogId(log_id),
            )
            .await?;
        Ok(())
    }

    async fn set_last_membership(&self, membership: MembershipConfig) -> Result<()> {
        self.sm_meta()
            .insert(
                &StateMachineMetaKey::LastMembership,
                &StateMachineMetaValue::Membership(membership),
            )
            .await?;
        Ok(())
    }

    /// The membership at or below `upto` (all of the log when `None`):
    /// the latest config-change or snapshot-pointer entry wins; absent
    /// that, the membership recorded at the last snapshot install; absent
    /// that, a single-node cluster of this id.
    pub fn get_membership_from_log(&self, upto: Option<u64>) -> Result<MembershipConfig> {
        let keys = match upto {
            Some(upto) => self.log.range_keys(..=upto)?,
            None => self.log.range_keys(..)?,
        };

        for index in keys.iter().rev() {
            let entry = match self.log.get(index)? {
                None => continue,
                Some(e) => e,
            };
            match entry.payload {
                EntryPayload::ConfigChange(cfg) => return Ok(cfg.membership),
                EntryPayload::SnapshotPointer(snap) => return Ok(snap.membership),
                _ => {}
            }
        }

        let from_meta = self.sm_meta().get(&StateMachineMetaKey::LastMembership)?;
        if let Some(v) = from_meta {
            return Ok(MembershipConfig::try_from(v)?);
        }

        Ok(MembershipConfig::new_initial(self.id))
    }

    async fn apply_to_sm(&self, index: u64, data: &SM::Cmd) -> Result<SM::Resp> {
        let resp = {
            let mut sm = self.state_machine.write().await;
            sm.apply_cmd(data).await?
        };

        // Apply first, record after: a crash in between re-applies the
        // entry on restart instead of dropping it.
        let term = self.log.get(&index)?.map(|e| e.term).unwrap_or_default();
        self.set_last_applied(AppliedLogId { term, index }).await?;

        Ok(resp)
    }

    fn new_snapshot_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[async_trait]
impl<SM: GroupStateMachine> RaftStorage<SM::Cmd, SM::Resp> for GroupRaftStore<SM> {
    type Snapshot = Cursor<Vec<u8>>;
    type ShutdownError = ShutdownError;

    async fn get_membership_config(&self) -> anyhow::Result<MembershipConfig> {
        let mem = self.get_membership_from_log(None)?;
        Ok(mem)
    }

    async fn get_initial_state(&self) -> anyhow::Result<InitialState> {
        let hard_state = self.raft_state.read_hard_state()?;
        match hard_state {
            None => {
                let new = InitialState::new_initial(self.id);
                self.raft_state.write_hard_state(&new.hard_state).await?;
                Ok(new)
            }
            Some(hard_state) => {
                let (last_log_index, last_log_term) = match self.log.last()? {
                    None => (0, 0),
                    Some((index, entry)) => (index, entry.term),
                };
                let last_applied_log = self.last_applied()?.index;
                let membership = self.get_membership_from_log(None)?;

                Ok(InitialState {
                    last_log_index,
                    last_log_term,
                    last_applied_log,
                    hard_state,
                    membership,
                })
            }
        }
    }

    async fn save_hard_state(&self, hs: &HardState) -> anyhow::Result<()> {
        self.raft_state.write_hard_state(hs).await?;
        Ok(())
    }

    async fn get_log_entries(&self, start: u64, stop: u64) -> anyhow::Result<Vec<Entry<SM::Cmd>>> {
        if start > stop {
            tracing::error!("invalid request, start > stop: {}-{}", start, stop);
            return Ok(vec![]);
        }
        let entries = self.log.range_values(start..stop)?;
        Ok(entries)
    }

    async fn delete_logs_from(&self, start: u64, stop: Option<u64>) -> anyhow::Result<()> {
        match stop {
            Some(stop) => self.log.range_remove(start..stop).await?,
            None => self.log.range_remove(start..).await?,
        }
        Ok(())
    }

    async fn append_entry_to_log(&self, entry: &Entry<SM::Cmd>) -> anyhow::Result<()> {
        self.log.insert(entry).await?;
        Ok(())
    }

    async fn replicate_to_log(&self, entries: &[Entry<SM::Cmd>]) -> anyhow::Result<()> {
        self.log.append(entries).await?;
        Ok(())
    }

    async fn apply_entry_to_state_machine(
        &self,
        index: &u64,
        data: &SM::Cmd,
    ) -> anyhow::Result<SM::Resp> {
        let resp = self.apply_to_sm(*index, data).await?;
        Ok(resp)
    }

    async fn replicate_to_state_machine(&self, entries: &[(&u64, &SM::Cmd)]) -> anyhow::Result<()> {
        for (index, data) in entries {
            self.apply_to_sm(**index, data).await?;
        }
        Ok(())
    }

    async fn do_log_compaction(&self) -> anyhow::Result<CurrentSnapshotData<Self::Snapshot>> {
        let last_applied = self.last_applied()?;
        let through = last_applied.index;
        let membership = self.get_membership_from_log(Some(through))?;

        let sm_bytes = {
            let sm = self.state_machine.read().await;
            sm.snapshot_export().await?
        };

        let blob = SnapshotBlob {
            last_applied,
            membership: membership.clone(),
            sm: sm_bytes,
        };
        let data = serde_json::to_vec(&blob)?;

        let term = self
            .log
            .get(&through)?
            .map(|e| e.term)
            .unwrap_or(last_applied.term);
        let snapshot_id = Self::new_snapshot_id();

        // Compact: everything covered by the snapshot collapses into a
        // single pointer entry.
        self.log.range_remove(..=through).await?;
        self.log
            .insert(&Entry::new_snapshot_pointer(
                through,
                term,
                snapshot_id,
                membership.clone(),
            ))
            .await?;

        {
            let mut current = self.current_snapshot.write().await;
            *current = Some(StoredSnapshot {
                index: through,
                term,
                membership: membership.clone(),
                data: data.clone(),
            });
        }

        tracing::info!(
            "{} snapshot done: through index {}, {} bytes",
            SM::group(),
            through,
            data.len()
        );

        Ok(CurrentSnapshotData {
            term,
            index: through,
            membership,
            snapshot: Box::new(Cursor::new(data)),
        })
    }

    async fn create_snapshot(&self) -> anyhow::Result<(String, Box<Self::Snapshot>)> {
        Ok((Self::new_snapshot_id(), Box::new(Cursor::new(Vec::new()))))
    }

    async fn finalize_snapshot_installation(
        &self,
        index: u64,
        term: u64,
        delete_through: Option<u64>,
        id: String,
        snapshot: Box<Self::Snapshot>,
    ) -> anyhow::Result<()> {
        let data = snapshot.into_inner();
        let blob: SnapshotBlob = serde_json::from_slice(&data)?;

        {
            let mut sm = self.state_machine.write().await;
            sm.snapshot_import(&blob.sm).await?;
        }

        self.set_last_applied(AppliedLogId { term, index }).await?;
        self.set_last_membership(blob.membership.clone()).await?;

        match delete_through {
            Some(through) => self.log.range_remove(..=through).await?,
            None => self.log.range_remove(..).await?,
        }
        self.log
            .insert(&Entry::new_snapshot_pointer(
                index,
                term,
                id,
                blob.membership.clone(),
            ))
            .await?;

        {
            let mut current = self.current_snapshot.write().await;
            *current = Some(StoredSnapshot {
                index,
                term,
                membership: blob.membership,
                data,
            });
        }

        tracing::info!("{} snapshot installed: index {}", SM::group(), index);
        Ok(())
    }

    async fn get_current_snapshot(
        &self,
    ) -> anyhow::Result<Option<CurrentSnapshotData<Self::Snapshot>>> {
        let current = self.current_snapshot.read().await;
        match &*current {
            None => Ok(None),
            Some(snap) => Ok(Some(CurrentSnapshotData {
                term: snap.term,
                index: snap.index,
                membership: snap.membership.clone(),
                snapshot: Box::new(Cursor::new(snap.data.clone())),
            })),
        }
    }
}
