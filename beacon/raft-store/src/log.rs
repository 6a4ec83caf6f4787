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
use std::ops::RangeBounds;

use async_raft::raft::Entry;
use async_raft::AppData;
use common_exception::Result;
use common_sled_store::get_sled_db;
use common_sled_store::AsKeySpace;
use common_sled_store::SledTree;

use crate::config::RaftConfig;
use crate::key_spaces::Logs;

/// The raft log of one replication group: `log index -> Entry`.
#[derive(Clone)]
pub struct RaftLog<C: AppData> {
    pub inner: SledTree,
    _p: PhantomData<C>,
}

impl<C: AppData> RaftLog<C> {
    /// Open or create the log tree of group `group`.
    pub fn open(config: &RaftConfig, group: &str) -> Result<RaftLog<C>> {
        let db = get_sled_db();
        let tree_name = config.tree_name(format!("raft-log/{}", group));
        let inner = SledTree::open(&db, tree_name, config.is_sync())?;

        Ok(RaftLog {
            inner,
            _p: PhantomData,
        })
    }

    fn logs(&self) -> AsKeySpace<Logs<C>> {
        self.inner.key_space()
    }

    pub fn get(&self, index: &u64) -> Result<Option<Entry<C>>> {
        self.logs().get(index)
    }

    pub fn last(&self) -> Result<Option<(u64, Entry<C>)>> {
        self.logs().last()
    }

    pub async fn insert(&self, entry: &Entry<C>) -> Result<()> {
        self.logs().insert(&entry.index, entry).await?;
        Ok(())
    }

    pub async fn append(&self, entries: &[Entry<C>]) -> Result<()> {
        for entry in entries {
            self.logs().insert(&entry.index, entry).await?;
        }
        Ok(())
    }

    pub fn range_values<R: RangeBounds<u64>>(&self, range: R) -> Result<Vec<Entry<C>>> {
        let kvs = self.logs().range_kvs(range)?;
        Ok(kvs.into_iter().map(|(_, v)| v).collect())
    }

    pub fn range_keys<R: RangeBounds<u64>>(&self, range: R) -> Result<Vec<u64>> {
        self.logs().range_keys(range)
    }

    /// Delete logs in `range`.
    ///
    /// Deletion is not guaranteed to be atomic with respect to a crash,
    /// which is acceptable: a partially deleted prefix is re-deleted on
    /// the next compaction.
    pub async fn range_remove<R: RangeBounds<u64>>(&self, range: R) -> Result<()> {
        self.logs().range_remove(range, true).await
    }
}
