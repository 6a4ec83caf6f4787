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

use async_raft::storage::HardState;
use async_raft::NodeId;
use common_exception::ErrorCode;
use common_exception::Result;
use common_sled_store::get_sled_db;
use common_sled_store::AsKeySpace;
use common_sled_store::SledTree;
use common_tracing::tracing;

use crate::config::RaftConfig;
use crate::key_spaces::RaftStateKV;
use crate::key_spaces::RaftStateKey;
use crate::key_spaces::RaftStateValue;

/// Raft-persistent state of one group.
///
/// `is_open` tells whether the tree pre-existed: a node id found on disk
/// means this store was created by a previous run.
pub struct RaftState {
    pub id: NodeId,
    is_open: bool,
    pub inner: SledTree,
}

impl RaftState {
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Open/create a raft state store:
    /// - `open == Some(())`: open an existing one, or
    /// - `create == Some(())`: create one if it does not exist.
    pub async fn open_create(
        config: &RaftConfig,
        group: &str,
        open: Option<()>,
        create: Option<()>,
    ) -> Result<RaftState> {
        tracing::info!(
            "open raft state: group={}, id={}, open={:?}, create={:?}",
            group,
            config.id,
            open,
            create
        );

        let db = get_sled_db();
        let tree_name = config.tree_name(format!("raft-state/{}", group));
        let inner = SledTree::open(&db, &tree_name, config.is_sync())?;

        let state = inner.key_space::<RaftStateKV>();
        let curr_id = state.get(&RaftStateKey::Id)?.map(NodeId::from);

        let state = match (curr_id, open, create) {
            (Some(curr_id), Some(_), _) => {
                if curr_id != config.id {
                    return Err(ErrorCode::MetaStoreDamaged(format!(
                        "store node id: {} is not the configured: {}",
                        curr_id, config.id
                    )));
                }
                RaftState {
                    id: curr_id,
                    is_open: true,
                    inner,
                }
            }
            (Some(_), None, Some(_)) => {
                return Err(ErrorCode::MetaStoreAlreadyExists(format!(
                    "raft state present id={}, can not create",
                    config.id
                )));
            }
            (None, _, Some(_)) => {
                let rs = RaftState {
                    id: config.id,
                    is_open: false,
                    inner,
                };
                rs.write_id(&config.id).await?;
                rs
            }
            (None, Some(_), None) => {
                return Err(ErrorCode::MetaStoreDamaged(format!(
                    "raft state absent, can not open: {}",
                    tree_name
                )));
            }
            (_, None, None) => {
                panic!("no open no create is an error");
            }
        };

        Ok(state)
    }

    fn kvs(&self) -> AsKeySpace<RaftStateKV> {
        self.inner.key_space()
    }

    async fn write_id(&self, id: &NodeId) -> Result<()> {
        self.kvs()
            .insert(&RaftStateKey::Id, &RaftStateValue::NodeId(*id))
            .await?;
        Ok(())
    }

    pub async fn write_hard_state(&self, hs: &HardState) -> Result<()> {
        self.kvs()
            .insert(
                &RaftStateKey::HardState,
                &RaftStateValue::HardState(hs.clone()),
            )
            .await?;
        Ok(())
    }

    pub fn read_hard_state(&self) -> Result<Option<HardState>> {
        let hs = self.kvs().get(&RaftStateKey::HardState)?;
        Ok(hs.map(HardState::from))
    }
}
