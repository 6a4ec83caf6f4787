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

use std::fmt::Display;
use std::marker::PhantomData;
use std::ops::Bound;
use std::ops::RangeBounds;

use common_exception::ErrorCode;
use common_exception::Result;
use common_exception::ToErrorCode;
use common_tracing::tracing;

use crate::SledKeySpace;

/// SledTree is a wrapper of sled::Tree that provides access to more than
/// one key-value type, each under its own single-byte prefix, plus a raw
/// byte-keyed view used as a plain column family.
#[derive(Debug, Clone)]
pub struct SledTree {
    pub name: String,

    /// Whether to fsync after every write.
    /// Durability is normally provided by the replication log, so a store
    /// may run with `sync == false` and treat the tree as a checkpoint.
    sync: bool,

    pub tree: sled::Tree,
}

impl SledTree {
    pub fn open<N: AsRef<[u8]> + Display>(db: &sled::Db, tree_name: N, sync: bool) -> Result<Self> {
        let t = db
            .open_tree(&tree_name)
            .map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("open tree: {}", tree_name)
            })?;

        tracing::debug!("SledTree opened tree: {}", tree_name);

        Ok(SledTree {
            name: format!("{}", tree_name),
            sync,
            tree: t,
        })
    }

    /// Borrows the SledTree and creates a wrapper with access limited to
    /// the specified key space `KV`.
    pub fn key_space<KV: SledKeySpace>(&self) -> AsKeySpace<KV> {
        AsKeySpace::<KV> {
            inner: self,
            phantom: PhantomData,
        }
    }

    pub async fn flush(&self) -> Result<()> {
        self.tree
            .flush_async()
            .await
            .map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("flush tree: {}", self.name)
            })?;
        Ok(())
    }

    async fn flush_if_sync(&self) -> Result<()> {
        if self.sync {
            self.flush().await?;
        }
        Ok(())
    }

    // --- raw byte-keyed view, used as a single column family ---

    pub fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let got = self
            .tree
            .get(key)
            .map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("get_raw: {}", self.name)
            })?;
        Ok(got.map(|iv| iv.to_vec()))
    }

    /// Apply puts and deletes atomically: either every write lands or none.
    pub async fn put_batch(&self, puts: &[(Vec<u8>, Vec<u8>)], dels: &[Vec<u8>]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for (k, v) in puts {
            batch.insert(k.as_slice(), v.as_slice());
        }
        for k in dels {
            batch.remove(k.as_slice());
        }

        self.tree
            .apply_batch(batch)
            .map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("put_batch: {}", self.name)
            })?;

        self.flush_if_sync().await
    }

    /// Lexicographic scan of every key starting with `prefix`.
    pub fn scan_prefix_raw(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut res = vec![];
        for item in self.tree.scan_prefix(prefix) {
            let (k, v) = item.map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("scan_prefix_raw: {}", self.name)
            })?;
            res.push((k.to_vec(), v.to_vec()));
        }
        Ok(res)
    }

    /// Dump the whole tree as key-value pairs, in key order.
    pub fn export(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut kvs = Vec::new();
        for rkv in self.tree.iter() {
            let (k, v) = rkv.map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("export: {}", self.name)
            })?;
            kvs.push((k.to_vec(), v.to_vec()));
        }
        Ok(kvs)
    }

    /// Replace the whole tree content with `kvs`.
    pub async fn import(&self, kvs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        self.tree
            .clear()
            .map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("clear before import: {}", self.name)
            })?;

        for (k, v) in kvs {
            self.tree
                .insert(k, v)
                .map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                    format!("import: {}", self.name)
                })?;
        }

        self.flush().await
    }

    // --- typed, key-space scoped operations ---

    fn get<KV: SledKeySpace>(&self, key: &KV::K) -> Result<Option<KV::V>> {
        let got = self
            .tree
            .get(KV::serialize_key(key)?)
            .map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("get: {}:{}", self.name, key)
            })?;

        let v = match got {
            None => None,
            Some(iv) => Some(KV::deserialize_value(iv)?),
        };
        Ok(v)
    }

    async fn insert<KV: SledKeySpace>(&self, key: &KV::K, value: &KV::V) -> Result<Option<KV::V>> {
        let prev = self
            .tree
            .insert(KV::serialize_key(key)?, KV::serialize_value(value)?)
            .map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("insert: {}:{}", self.name, key)
            })?;

        self.flush_if_sync().await?;

        let prev = match prev {
            None => None,
            Some(iv) => Some(KV::deserialize_value(iv)?),
        };
        Ok(prev)
    }

    async fn remove<KV: SledKeySpace>(&self, key: &KV::K) -> Result<Option<KV::V>> {
        let prev = self
            .tree
            .remove(KV::serialize_key(key)?)
            .map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("remove: {}:{}", self.name, key)
            })?;

        self.flush_if_sync().await?;

        let prev = match prev {
            None => None,
            Some(iv) => Some(KV::deserialize_value(iv)?),
        };
        Ok(prev)
    }

    fn byte_range<KV: SledKeySpace, R: RangeBounds<KV::K>>(
        range: R,
    ) -> Result<(Bound<Vec<u8>>, Bound<Vec<u8>>)> {
        let (span_start, span_end) = KV::span();

        let start = match range.start_bound() {
            Bound::Included(k) => Bound::Included(KV::serialize_key(k)?.to_vec()),
            Bound::Excluded(k) => Bound::Excluded(KV::serialize_key(k)?.to_vec()),
            Bound::Unbounded => span_start,
        };
        let end = match range.end_bound() {
            Bound::Included(k) => Bound::Included(KV::serialize_key(k)?.to_vec()),
            Bound::Excluded(k) => Bound::Excluded(KV::serialize_key(k)?.to_vec()),
            Bound::Unbounded => span_end,
        };
        Ok((start, end))
    }

    fn range_keys<KV: SledKeySpace, R: RangeBounds<KV::K>>(&self, range: R) -> Result<Vec<KV::K>> {
        let mut res = vec![];
        for item in self.tree.range(Self::byte_range::<KV, R>(range)?) {
            let (k, _) = item.map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("range_keys: {}", self.name)
            })?;
            res.push(KV::deserialize_key(k)?);
        }
        Ok(res)
    }

    fn range_kvs<KV: SledKeySpace, R: RangeBounds<KV::K>>(
        &self,
        range: R,
    ) -> Result<Vec<(KV::K, KV::V)>> {
        let mut res = vec![];
        for item in self.tree.range(Self::byte_range::<KV, R>(range)?) {
            let (k, v) = item.map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("range_kvs: {}", self.name)
            })?;
            res.push((KV::deserialize_key(k)?, KV::deserialize_value(v)?));
        }
        Ok(res)
    }

    async fn range_remove<KV: SledKeySpace, R: RangeBounds<KV::K>>(
        &self,
        range: R,
        flush: bool,
    ) -> Result<()> {
        let mut batch = sled::Batch::default();

        for item in self.tree.range(Self::byte_range::<KV, R>(range)?) {
            let (k, _) = item.map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("range_remove: {}", self.name)
            })?;
            batch.remove(k);
        }

        self.tree
            .apply_batch(batch)
            .map_err_to_code(ErrorCode::MetaStoreDamaged, || {
                format!("range_remove apply: {}", self.name)
            })?;

        if flush && self.sync {
            self.flush().await?;
        }
        Ok(())
    }

    fn last<KV: SledKeySpace>(&self) -> Result<Option<(KV::K, KV::V)>> {
        let item = self.tree.range(KV::span()).next_back();
        let item = match item {
            None => return Ok(None),
            Some(x) => x,
        };
        let (k, v) = item.map_err_to_code(ErrorCode::MetaStoreDamaged, || {
            format!("last: {}", self.name)
        })?;
        Ok(Some((KV::deserialize_key(k)?, KV::deserialize_value(v)?)))
    }
}

/// A view of a SledTree that is limited to a single key space.
pub struct AsKeySpace<'a, KV: SledKeySpace> {
    inner: &'a SledTree,
    phantom: PhantomData<KV>,
}

impl<'a, KV: SledKeySpace> AsKeySpace<'a, KV> {
    pub fn get(&self, key: &KV::K) -> Result<Option<KV::V>> {
        self.inner.get::<KV>(key)
    }

    pub async fn insert(&self, key: &KV::K, value: &KV::V) -> Result<Option<KV::V>> {
        self.inner.insert::<KV>(key, value).await
    }

    pub async fn remove(&self, key: &KV::K) -> Result<Option<KV::V>> {
        self.inner.remove::<KV>(key).await
    }

    pub fn range_keys<R: RangeBounds<KV::K>>(&self, range: R) -> Result<Vec<KV::K>> {
        self.inner.range_keys::<KV, R>(range)
    }

    pub fn range_kvs<R: RangeBounds<KV::K>>(&self, range: R) -> Result<Vec<(KV::K, KV::V)>> {
        self.inner.range_kvs::<KV, R>(range)
    }

    pub async fn range_remove<R: RangeBounds<KV::K>>(&self, range: R, flush: bool) -> Result<()> {
        self.inner.range_remove::<KV, R>(range, flush).await
    }

    pub fn last(&self) -> Result<Option<(KV::K, KV::V)>> {
        self.inner.last::<KV>()
    }
}
