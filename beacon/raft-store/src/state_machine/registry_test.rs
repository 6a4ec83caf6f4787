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

use beacon_types::ErrCode;
use beacon_types::InstanceMeta;
use beacon_types::NamingRequest;
use beacon_types::PrivilegeChange;
use beacon_types::PrivilegeZone;
use beacon_types::RegistryCmd;
use beacon_types::ServletMeta;
use beacon_types::UserPrivilege;
use beacon_types::ZoneMeta;
use common_base::tokio;
use common_exception::Result;
use pretty_assertions::assert_eq;
use semver::Version;

use crate::config::RaftConfig;
use crate::state_machine::registry::hash_password;
use crate::state_machine::GroupStateMachine;
use crate::state_machine::RegistrySm;

fn new_config() -> RaftConfig {
    common_sled_store::init_temp_sled_db(tempfile::tempdir().expect("create temp dir"));

    static SEQ: AtomicUsize = AtomicUsize::new(0);
    let x = SEQ.fetch_add(1, Ordering::SeqCst);

    let mut config = RaftConfig::empty();
    config.sled_tree_prefix = format!("test-registry-{}", x);
    config.no_sync = true;
    config
}

async fn new_sm() -> Result<RegistrySm> {
    RegistrySm::open(&new_config()).await
}

async fn apply(sm: &mut RegistrySm, cmd: RegistryCmd) -> Result<ErrCode> {
    let resp = sm.apply_cmd(&cmd).await?;
    Ok(resp.errcode)
}

/// Create the "search" app with one zone, one servlet and one instance
/// registered at `mtime`.
async fn build_search_app(sm: &mut RegistrySm, mtime: i64) -> Result<()> {
    let got = apply(
        sm,
        RegistryCmd::CreateApp {
            app_name: "search".to_string(),
            quota: 100,
        },
    )
    .await?;
    assert_eq!(ErrCode::Success, got);

    let got = apply(
        sm,
        RegistryCmd::CreateZone {
            zone: ZoneMeta {
                app_name: "search".to_string(),
                zone_name: "web".to_string(),
                quota: 10,
                ..Default::default()
            },
        },
    )
    .await?;
    assert_eq!(ErrCode::Success, got);

    let got = apply(
        sm,
        RegistryCmd::CreateServlet {
            servlet: ServletMeta {
                app_name: "search".to_string(),
                zone_name: "web".to_string(),
                servlet_name: "query".to_string(),
                ..Default::default()
            },
        },
    )
    .await?;
    assert_eq!(ErrCode::Success, got);

    let got = apply(
        sm,
        RegistryCmd::AddInstance {
            instance: InstanceMeta {
                app_name: "search".to_string(),
                zone_name: "web".to_string(),
                servlet_name: "query".to_string(),
                address: "10.0.0.1:80".to_string(),
                env: "prod".to_string(),
                color: "blue".to_string(),
                mtime,
                ..Default::default()
            },
        },
    )
    .await?;
    assert_eq!(ErrCode::Success, got);

    Ok(())
}

fn naming_req(zones: &[&str], envs: &[&str], colors: &[&str]) -> NamingRequest {
    NamingRequest {
        app_name: "search".to_string(),
        zones: zones.iter().map(|s| s.to_string()).collect(),
        envs: envs.iter().map(|s| s.to_string()).collect(),
        colors: colors.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_hierarchy_ids_and_versions() -> Result<()> {
    let mut sm = new_sm().await?;
    build_search_app(&mut sm, 1000).await?;

    let app = sm.get_app("search").unwrap();
    assert_eq!(1, app.app_id);
    assert_eq!(1, app.version);
    assert_eq!(100, app.quota);

    let zone = sm.get_zone("search", "web").unwrap();
    assert_eq!(1, zone.zone_id);
    assert_eq!(app.app_id, zone.app_id);

    let servlet = sm.get_servlet("search", "web", "query").unwrap();
    assert_eq!(1, servlet.servlet_id);
    assert_eq!(zone.zone_id, servlet.zone_id);

    let instance = sm.get_instance("10.0.0.1:80").unwrap();
    assert_eq!(1, instance.instance_id);
    assert_eq!(1, instance.version);

    // modify quota only: other fields untouched, version bumps
    let got = apply(
        &mut sm,
        RegistryCmd::ModifyApp {
            app_name: "search".to_string(),
            quota: Some(200),
        },
    )
    .await?;
    assert_eq!(ErrCode::Success, got);
    let app = sm.get_app("search").unwrap();
    assert_eq!(200, app.quota);
    assert_eq!(2, app.version);
    assert_eq!(1, app.app_id);

    Ok(())
}

#[tokio::test]
async fn test_create_duplicates_rejected() -> Result<()> {
    let mut sm = new_sm().await?;
    build_search_app(&mut sm, 1000).await?;

    let got = apply(
        &mut sm,
        RegistryCmd::CreateApp {
            app_name: "search".to_string(),
            quota: 1,
        },
    )
    .await?;
    assert_eq!(ErrCode::InputParamError, got);

    let got = apply(
        &mut sm,
        RegistryCmd::CreateZone {
            zone: ZoneMeta {
                app_name: "search".to_string(),
                zone_name: "web".to_string(),
                ..Default::default()
            },
        },
    )
    .await?;
    assert_eq!(ErrCode::InputParamError, got);

    // a zone under an absent app does not resolve
    let got = apply(
        &mut sm,
        RegistryCmd::CreateZone {
            zone: ZoneMeta {
                app_name: "nosuch".to_string(),
                zone_name: "web".to_string(),
                ..Default::default()
            },
        },
    )
    .await?;
    assert_eq!(ErrCode::InputParamError, got);

    Ok(())
}

#[tokio::test]
async fn test_drop_non_empty_parent_rejected() -> Result<()> {
    let mut sm = new_sm().await?;
    build_search_app(&mut sm, 1000).await?;

    let got = apply(
        &mut sm,
        RegistryCmd::DropApp {
            app_name: "search".to_string(),
        },
    )
    .await?;
    assert_eq!(ErrCode::InputParamError, got);
    assert!(sm.get_app("search").is_some(), "state unchanged");

    let got = apply(
        &mut sm,
        RegistryCmd::DropZone {
            app_name: "search".to_string(),
            zone_name: "web".to_string(),
        },
    )
    .await?;
    assert_eq!(ErrCode::InputParamError, got);

    let got = apply(
        &mut sm,
        RegistryCmd::DropServlet {
            app_name: "search".to_string(),
            zone_name: "web".to_string(),
            servlet_name: "query".to_string(),
        },
    )
    .await?;
    assert_eq!(ErrCode::InputParamError, got);

    // bottom-up removal drains the hierarchy
    for cmd in [
        RegistryCmd::DropInstance {
            address: "10.0.0.1:80".to_string(),
        },
        RegistryCmd::DropServlet {
            app_name: "search".to_string(),
            zone_name: "web".to_string(),
            servlet_name: "query".to_string(),
        },
        RegistryCmd::DropZone {
            app_name: "search".to_string(),
            zone_name: "web".to_string(),
        },
        RegistryCmd::DropApp {
            app_name: "search".to_string(),
        },
    ] {
        let got = apply(&mut sm, cmd).await?;
        assert_eq!(ErrCode::Success, got);
    }
    assert!(sm.get_app("search").is_none());

    Ok(())
}

#[tokio::test]
async fn test_naming_filters_and_liveness() -> Result<()> {
    let t = 1_000_000;
    let mut sm = new_sm().await?;
    build_search_app(&mut sm, t).await?;

    // fresh: 10s after registration, within the 50s window
    let resp = sm.naming(&naming_req(&["web"], &["prod"], &["blue"]), t + 10, 50);
    assert_eq!(ErrCode::Success, resp.errcode);
    assert_eq!(1, resp.instances.len());
    assert_eq!("10.0.0.1:80", resp.instances[0].address);

    // stale: 60s after registration
    let resp = sm.naming(&naming_req(&["web"], &["prod"], &["blue"]), t + 60, 50);
    assert_eq!(ErrCode::Success, resp.errcode);
    assert!(resp.instances.is_empty());

    // env/color mismatch excludes
    let resp = sm.naming(&naming_req(&["web"], &["dev"], &["blue"]), t + 10, 50);
    assert!(resp.instances.is_empty());
    let resp = sm.naming(&naming_req(&["web"], &["prod"], &["green"]), t + 10, 50);
    assert!(resp.instances.is_empty());

    // empty env/color filters match everything
    let resp = sm.naming(&naming_req(&["web"], &[], &[]), t + 10, 50);
    assert_eq!(1, resp.instances.len());

    // an empty zones filter intersects to nothing
    let resp = sm.naming(&naming_req(&[], &["prod"], &["blue"]), t + 10, 50);
    assert_eq!(ErrCode::InputParamError, resp.errcode);

    // unknown app
    let mut req = naming_req(&["web"], &[], &[]);
    req.app_name = "nosuch".to_string();
    let resp = sm.naming(&req, t + 10, 50);
    assert_eq!(ErrCode::InputParamError, resp.errcode);

    Ok(())
}

#[tokio::test]
async fn test_re_registration_is_upsert() -> Result<()> {
    let mut sm = new_sm().await?;
    build_search_app(&mut sm, 1000).await?;

    let got = apply(
        &mut sm,
        RegistryCmd::AddInstance {
            instance: InstanceMeta {
                app_name: "search".to_string(),
                zone_name: "web".to_string(),
                servlet_name: "query".to_string(),
                address: "10.0.0.1:80".to_string(),
                env: "prod".to_string(),
                color: "green".to_string(),
                mtime: 2000,
                ..Default::default()
            },
        },
    )
    .await?;
    assert_eq!(ErrCode::Success, got);

    let instance = sm.get_instance("10.0.0.1:80").unwrap();
    assert_eq!(1, instance.instance_id, "identity is kept");
    assert_eq!(2, instance.version);
    assert_eq!("green", instance.color);
    assert_eq!(2000, instance.mtime);

    Ok(())
}

#[tokio::test]
async fn test_config_versioning() -> Result<()> {
    let mut sm = new_sm().await?;

    let create = |name: &str, ver: &str, content: &str| RegistryCmd::CreateConfig {
        config_name: name.to_string(),
        version: Version::parse(ver).unwrap(),
        content: content.to_string(),
        config_type: beacon_types::ConfigType::Text,
        time: 42,
    };

    assert_eq!(ErrCode::Success, apply(&mut sm, create("x", "1.0.0", "a")).await?);
    assert_eq!(
        ErrCode::ConfigExists,
        apply(&mut sm, create("x", "1.0.0", "b")).await?
    );
    assert_eq!(ErrCode::Success, apply(&mut sm, create("x", "1.0.1", "b")).await?);

    // get without version returns the greatest
    let got = sm.get_config("x", None).unwrap();
    assert_eq!(Version::parse("1.0.1").unwrap(), got.version);
    assert_eq!("b", got.content);

    let got = sm
        .get_config("x", Some(&Version::parse("1.0.0").unwrap()))
        .unwrap();
    assert_eq!("a", got.content);

    assert_eq!(Err(ErrCode::ConfigNotExists), sm.get_config("y", None));
    assert_eq!(
        Err(ErrCode::ConfigNotExistsVersion),
        sm.get_config("x", Some(&Version::parse("9.9.9").unwrap()))
    );

    // remove one version, then the rest
    let got = apply(
        &mut sm,
        RegistryCmd::RemoveConfig {
            config_name: "x".to_string(),
            version: Some(Version::parse("1.0.0").unwrap()),
            all: false,
        },
    )
    .await?;
    assert_eq!(ErrCode::Success, got);
    assert_eq!(1, sm.list_config_versions("x").unwrap().len());

    let got = apply(
        &mut sm,
        RegistryCmd::RemoveConfig {
            config_name: "x".to_string(),
            version: None,
            all: true,
        },
    )
    .await?;
    assert_eq!(ErrCode::Success, got);
    assert_eq!(Err(ErrCode::ConfigNotExists), sm.get_config("x", None));

    Ok(())
}

#[tokio::test]
async fn test_user_privileges() -> Result<()> {
    let mut sm = new_sm().await?;

    let got = apply(
        &mut sm,
        RegistryCmd::CreateUser {
            user: UserPrivilege {
                username: "ops".to_string(),
                password_hash: hash_password("secret"),
                ips: vec!["10.1.0.0".to_string()],
                ..Default::default()
            },
        },
    )
    .await?;
    assert_eq!(ErrCode::Success, got);

    let old_hash = sm.get_user("ops").unwrap().password_hash;

    // add a zone privilege, then upgrade it in place
    for rw in [beacon_types::RW::Read, beacon_types::RW::Write] {
        let got = apply(
            &mut sm,
            RegistryCmd::AddPrivilege {
                change: PrivilegeChange {
                    username: "ops".to_string(),
                    zone_privileges: vec![PrivilegeZone {
                        app_name: "search".to_string(),
                        zone_name: "web".to_string(),
                        rw,
                    }],
                    ..Default::default()
                },
            },
        )
        .await?;
        assert_eq!(ErrCode::Success, got);
    }

    let user = sm.get_user("ops").unwrap();
    assert_eq!(1, user.zone_privileges.len(), "upgraded, not duplicated");
    assert_eq!(beacon_types::RW::Write, user.zone_privileges[0].rw);
    assert_eq!(3, user.version);

    // password change through AddPrivilege
    let got = apply(
        &mut sm,
        RegistryCmd::AddPrivilege {
            change: PrivilegeChange {
                username: "ops".to_string(),
                password: Some(hash_password("rotated")),
                ..Default::default()
            },
        },
    )
    .await?;
    assert_eq!(ErrCode::Success, got);
    let user = sm.get_user("ops").unwrap();
    assert_ne!(old_hash, user.password_hash);
    assert_eq!(hash_password("rotated"), user.password_hash);

    let got = apply(
        &mut sm,
        RegistryCmd::DropPrivilege {
            change: PrivilegeChange {
                username: "ops".to_string(),
                zone_privileges: vec![PrivilegeZone {
                    app_name: "search".to_string(),
                    zone_name: "web".to_string(),
                    rw: beacon_types::RW::Read,
                }],
                ips: vec!["10.1.0.0".to_string()],
                ..Default::default()
            },
        },
    )
    .await?;
    assert_eq!(ErrCode::Success, got);
    let user = sm.get_user("ops").unwrap();
    assert!(user.zone_privileges.is_empty());
    assert!(user.ips.is_empty());

    let got = apply(
        &mut sm,
        RegistryCmd::DropUser {
            username: "ops".to_string(),
        },
    )
    .await?;
    assert_eq!(ErrCode::Success, got);
    assert!(sm.get_user("ops").is_none());

    Ok(())
}

#[tokio::test]
async fn test_rebuild_from_db_equals_pre_restart() -> Result<()> {
    let config = new_config();
    {
        let mut sm = RegistrySm::open(&config).await?;
        build_search_app(&mut sm, 5000).await?;
    }

    // reopen on the same trees: indexes rebuild from the column family
    let mut sm = RegistrySm::open(&config).await?;
    assert_eq!(1, sm.get_app("search").unwrap().app_id);
    assert_eq!(1, sm.get_instance("10.0.0.1:80").unwrap().instance_id);

    let resp = sm.naming(&naming_req(&["web"], &["prod"], &["blue"]), 5010, 50);
    assert_eq!(1, resp.instances.len());

    // max ids survived: the next app id does not collide
    let got = apply(
        &mut sm,
        RegistryCmd::CreateApp {
            app_name: "ads".to_string(),
            quota: 1,
        },
    )
    .await?;
    assert_eq!(ErrCode::Success, got);
    assert_eq!(2, sm.get_app("ads").unwrap().app_id);

    Ok(())
}

#[tokio::test]
async fn test_snapshot_roundtrip_is_byte_identical() -> Result<()> {
    let mut sm = new_sm().await?;
    build_search_app(&mut sm, 1000).await?;

    let snap1 = sm.snapshot_export().await?;

    let mut sm2 = new_sm().await?;
    sm2.snapshot_import(&snap1).await?;
    let snap2 = sm2.snapshot_export().await?;

    assert_eq!(snap1, snap2, "save -> load -> save is identity");

    // the restored machine answers queries like the original
    let resp = sm2.naming(&naming_req(&["web"], &["prod"], &["blue"]), 1010, 50);
    assert_eq!(1, resp.instances.len());

    Ok(())
}
