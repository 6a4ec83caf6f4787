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

use async_raft::raft::Entry;
use async_raft::raft::EntryConfigChange;
use async_raft::raft::EntryNormal;
use async_raft::raft::EntryPayload;
use async_raft::raft::MembershipConfig;
use async_raft::storage::HardState;
use async_raft::RaftStorage;
use beacon_types::AutoIncrCmd;
use beacon_types::ErrCode;
use beacon_types::RegistryCmd;
use common_base::tokio;
use common_exception::Result;
use maplit::hashset;
use pretty_assertions::assert_eq;

use crate::config::RaftConfig;
use crate::state_machine::AutoIncrSm;
use crate::state_machine::RegistrySm;
use crate::store::GroupRaftStore;

fn new_config(id: u64) -> RaftConfig {
    common_sled_store::init_temp_sled_db(tempfile::tempdir().expect("create temp dir"));

    static SEQ: AtomicUsize = AtomicUsize::new(0);
    let x = SEQ.fetch_add(1, Ordering::SeqCst);

    let mut config = RaftConfig::empty();
    config.id = id;
    config.sled_tree_prefix = format!("test-store-{}", x);
    config.no_sync = true;
    config
}

fn normal_entry(term: u64, index: u64, cmd: AutoIncrCmd) -> Entry<AutoIncrCmd> {
    Entry {
        term,
        index,
        payload: EntryPayload::Normal(EntryNormal { data: cmd }),
    }
}

#[tokio::test]
async fn test_store_restart_keeps_hard_state() -> Result<()> {
    // - create a store, save a hard state
    // - reopen it and find the state restored

    let config = new_config(3);

    {
        let store =
            GroupRaftStore::open_create(&config, AutoIncrSm::new(), None, Some(())).await?;
        assert_eq!(3, store.id);
        assert!(!store.is_open());
        assert_eq!(None, store.raft_state.read_hard_state()?);

        store
            .save_hard_state(&HardState {
                current_term: 10,
                voted_for: Some(5),
            })
            .await
            .map_err(common_exception::ErrorCode::from)?;
    }

    {
        let store =
            GroupRaftStore::open_create(&config, AutoIncrSm::new(), Some(()), None).await?;
        assert_eq!(3, store.id);
        assert!(store.is_open());
        assert_eq!(
            Some(HardState {
                current_term: 10,
                voted_for: Some(5),
            }),
            store.raft_state.read_hard_state()?
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_store_membership_from_log() -> Result<()> {
    let config = new_config(3);
    let store = GroupRaftStore::open_create(&config, AutoIncrSm::new(), None, Some(())).await?;

    // nothing in the log: a single-node membership of this id
    let got = store.get_membership_from_log(None)?;
    assert_eq!(hashset![3], got.members);

    let c1 = MembershipConfig {
        members: hashset![1, 2, 3],
        members_after_consensus: None,
    };

    store
        .log
        .insert(&Entry {
            term: 1,
            index: 5,
            payload: EntryPayload::ConfigChange(EntryConfigChange {
                membership: c1.clone(),
            }),
        })
        .await?;

    assert_eq!(c1, store.get_membership_from_log(None)?);
    assert_eq!(c1, store.get_membership_from_log(Some(5))?);
    assert_eq!(
        hashset![3],
        store.get_membership_from_log(Some(4))?.members,
        "membership below the config change falls back to default"
    );

    Ok(())
}

#[tokio::test]
async fn test_store_apply_and_compaction() -> Result<()> {
    let config = new_config(0);
    let store = GroupRaftStore::open_create(&config, AutoIncrSm::new(), None, Some(())).await?;

    let cmds = vec![
        AutoIncrCmd::AddServletId {
            servlet_id: 7,
            start: 100,
        },
        AutoIncrCmd::GenId {
            servlet_id: 7,
            count: 5,
        },
        AutoIncrCmd::GenId {
            servlet_id: 7,
            count: 3,
        },
    ];

    for (i, cmd) in cmds.iter().enumerate() {
        let index = i as u64 + 1;
        store
            .log
            .insert(&normal_entry(1, index, cmd.clone()))
            .await?;
        let resp = store
            .apply_entry_to_state_machine(&index, cmd)
            .await
            .map_err(common_exception::ErrorCode::from)?;
        assert_eq!(ErrCode::Success, resp.errcode);
    }

    let applied = store.last_applied()?;
    assert_eq!((1, 3), (applied.term, applied.index));

    let snap = store
        .do_log_compaction()
        .await
        .map_err(common_exception::ErrorCode::from)?;
    assert_eq!(3, snap.index);
    assert_eq!(1, snap.term);

    // the compacted range collapsed into a single pointer entry
    let keys = store.log.range_keys(..)?;
    assert_eq!(vec![3], keys);
    let entry = store.log.get(&3)?.unwrap();
    assert!(matches!(entry.payload, EntryPayload::SnapshotPointer(_)));

    let current = store
        .get_current_snapshot()
        .await
        .map_err(common_exception::ErrorCode::from)?
        .unwrap();
    assert_eq!(3, current.index);

    Ok(())
}

#[tokio::test]
async fn test_store_install_snapshot_restores_state() -> Result<()> {
    // build a registry on one store, snapshot it, install on a fresh one
    let snap_data;
    {
        let config = new_config(0);
        let store = GroupRaftStore::open_create(&config, RegistrySm::open(&config).await?, None, Some(())).await?;

        let cmds = vec![
            RegistryCmd::CreateApp {
                app_name: "search".to_string(),
                quota: 100,
            },
            RegistryCmd::CreateZone {
                zone: beacon_types::ZoneMeta {
                    app_name: "search".to_string(),
                    zone_name: "web".to_string(),
                    ..Default::default()
                },
            },
        ];
        for (i, cmd) in cmds.iter().enumerate() {
            let index = i as u64 + 1;
            store
                .log
                .insert(&Entry {
                    term: 1,
                    index,
                    payload: EntryPayload::Normal(EntryNormal { data: cmd.clone() }),
                })
                .await?;
            store
                .apply_entry_to_state_machine(&index, cmd)
                .await
                .map_err(common_exception::ErrorCode::from)?;
        }

        let snap = store
            .do_log_compaction()
            .await
            .map_err(common_exception::ErrorCode::from)?;
        snap_data = snap.snapshot.into_inner();
    }

    let config = new_config(1);
    let store = GroupRaftStore::open_create(&config, RegistrySm::open(&config).await?, None, Some(())).await?;

    store
        .finalize_snapshot_installation(
            2,
            1,
            None,
            "snap-1".to_string(),
            Box::new(std::io::Cursor::new(snap_data)),
        )
        .await
        .map_err(common_exception::ErrorCode::from)?;

    let applied = store.last_applied()?;
    assert_eq!(2, applied.index);

    let sm = store.state_machine.read().await;
    let app = sm.get_app("search").unwrap();
    assert_eq!(100, app.quota);
    assert!(sm.get_zone("search", "web").is_some());

    Ok(())
}
