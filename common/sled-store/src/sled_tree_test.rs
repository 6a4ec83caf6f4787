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

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use common_base::tokio;
use common_exception::Result;
use pretty_assertions::assert_eq;

use crate::get_sled_db;
use crate::init_temp_sled_db;
use crate::SledKeySpace;
use crate::SledTree;

struct Seqs {}
impl SledKeySpace for Seqs {
    const PREFIX: u8 = 1;
    const NAME: &'static str = "seqs";
    type K = u64;
    type V = String;
}

struct Names {}
impl SledKeySpace for Names {
    const PREFIX: u8 = 2;
    const NAME: &'static str = "names";
    type K = String;
    type V = u64;
}

fn new_tree() -> Result<SledTree> {
    init_temp_sled_db(tempfile::tempdir().expect("create temp dir"));

    static SEQ: AtomicUsize = AtomicUsize::new(0);
    let x = SEQ.fetch_add(1, Ordering::SeqCst);

    SledTree::open(&get_sled_db(), format!("test-tree-{}", x), false)
}

#[tokio::test]
async fn test_key_space_insert_get_remove() -> Result<()> {
    let t = new_tree()?;
    let seqs = t.key_space::<Seqs>();

    assert_eq!(None, seqs.get(&5)?);

    let prev = seqs.insert(&5, &"five".to_string()).await?;
    assert_eq!(None, prev);
    assert_eq!(Some("five".to_string()), seqs.get(&5)?);

    let prev = seqs.insert(&5, &"FIVE".to_string()).await?;
    assert_eq!(Some("five".to_string()), prev);

    let prev = seqs.remove(&5).await?;
    assert_eq!(Some("FIVE".to_string()), prev);
    assert_eq!(None, seqs.get(&5)?);

    Ok(())
}

#[tokio::test]
async fn test_key_spaces_do_not_overlap() -> Result<()> {
    let t = new_tree()?;

    t.key_space::<Seqs>().insert(&1, &"one".to_string()).await?;
    t.key_space::<Names>()
        .insert(&"one".to_string(), &1)
        .await?;

    assert_eq!(vec![1], t.key_space::<Seqs>().range_keys(..)?);
    assert_eq!(
        vec!["one".to_string()],
        t.key_space::<Names>().range_keys(..)?
    );

    Ok(())
}

#[tokio::test]
async fn test_range_and_last() -> Result<()> {
    let t = new_tree()?;
    let seqs = t.key_space::<Seqs>();

    for i in [2u64, 9, 4, 7] {
        seqs.insert(&i, &format!("v{}", i)).await?;
    }

    assert_eq!(vec![2, 4, 7, 9], seqs.range_keys(..)?);
    assert_eq!(vec![4, 7], seqs.range_keys(3..8)?);
    assert_eq!(Some((9, "v9".to_string())), seqs.last()?);

    seqs.range_remove(7.., true).await?;
    assert_eq!(vec![2, 4], seqs.range_keys(..)?);
    assert_eq!(Some((4, "v4".to_string())), seqs.last()?);

    Ok(())
}

#[tokio::test]
async fn test_raw_batch_scan_export() -> Result<()> {
    let t = new_tree()?;

    t.put_batch(
        &[
            (b"\x01a".to_vec(), b"1".to_vec()),
            (b"\x01b".to_vec(), b"2".to_vec()),
            (b"\x02c".to_vec(), b"3".to_vec()),
        ],
        &[],
    )
    .await?;

    assert_eq!(Some(b"2".to_vec()), t.get_raw(b"\x01b")?);

    let got = t.scan_prefix_raw(b"\x01")?;
    assert_eq!(2, got.len());
    assert_eq!((b"\x01a".to_vec(), b"1".to_vec()), got[0]);

    // deletes land in the same atomic batch
    t.put_batch(&[(b"\x01d".to_vec(), b"4".to_vec())], &[b"\x01a".to_vec()])
        .await?;
    assert_eq!(None, t.get_raw(b"\x01a")?);
    assert_eq!(Some(b"4".to_vec()), t.get_raw(b"\x01d")?);

    let dump = t.export()?;
    let t2 = new_tree()?;
    t2.import(dump.clone()).await?;
    assert_eq!(dump, t2.export()?);

    Ok(())
}
