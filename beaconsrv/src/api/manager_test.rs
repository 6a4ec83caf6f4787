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

use beacon_types::AppMeta;
use beacon_types::AutoIncrCmd;
use beacon_types::AutoIncrRequest;
use beacon_types::ConfigRequest;
use beacon_types::ErrCode;
use beacon_types::InstanceMeta;
use beacon_types::ManagerRequest;
use beacon_types::OpType;
use beacon_types::RegistryCmd;
use beacon_types::UserRequest;
use pretty_assertions::assert_eq;

use crate::api::autoincr_cmd_of;
use crate::api::registry_cmd_of;

fn req(op_type: OpType) -> ManagerRequest {
    ManagerRequest {
        op_type,
        app: None,
        zone: None,
        servlet: None,
        instance: None,
        user: None,
        privilege: None,
        config: None,
        auto_increment: None,
    }
}

#[test]
fn test_create_app_maps_to_cmd() {
    let mut r = req(OpType::OpCreateApp);
    r.app = Some(AppMeta {
        app_name: "search".to_string(),
        quota: 100,
        ..Default::default()
    });

    let cmd = registry_cmd_of(&r, 1234).unwrap();
    assert_eq!(
        RegistryCmd::CreateApp {
            app_name: "search".to_string(),
            quota: 100,
        },
        cmd
    );
}

#[test]
fn test_missing_payload_is_a_parse_failure() {
    let r = req(OpType::OpCreateApp);
    let got = registry_cmd_of(&r, 0).unwrap_err();
    assert_eq!(ErrCode::ParseFromPbFail, got.errcode);
}

#[test]
fn test_instance_mtime_is_stamped_by_front_end() {
    let mut r = req(OpType::OpAddInstance);
    r.instance = Some(InstanceMeta {
        app_name: "search".to_string(),
        zone_name: "web".to_string(),
        servlet_name: "query".to_string(),
        address: "10.0.0.1:80".to_string(),
        mtime: 7, // whatever the client sent is overwritten
        ..Default::default()
    });

    match registry_cmd_of(&r, 99_000).unwrap() {
        RegistryCmd::AddInstance { instance } => assert_eq!(99_000, instance.mtime),
        cmd => panic!("unexpected cmd: {:?}", cmd),
    }
}

#[test]
fn test_user_password_never_enters_the_log_in_clear() {
    let mut r = req(OpType::OpCreateUser);
    r.user = Some(UserRequest {
        username: "ops".to_string(),
        password: "secret".to_string(),
        ..Default::default()
    });

    match registry_cmd_of(&r, 0).unwrap() {
        RegistryCmd::CreateUser { user } => {
            assert_ne!("secret", user.password_hash);
            assert_eq!(64, user.password_hash.len(), "hex sha-256");
        }
        cmd => panic!("unexpected cmd: {:?}", cmd),
    }
}

#[test]
fn test_bad_config_version_rejected() {
    let mut r = req(OpType::OpCreateConfig);
    r.config = Some(ConfigRequest {
        config_name: "x".to_string(),
        version: Some("not-semver".to_string()),
        content: "a".to_string(),
        ..Default::default()
    });

    let got = registry_cmd_of(&r, 0).unwrap_err();
    assert_eq!(ErrCode::InputParamError, got.errcode);
}

#[test]
fn test_autoincr_mapping() {
    let mut r = req(OpType::OpGenIdForAutoIncrement);
    r.auto_increment = Some(AutoIncrRequest {
        servlet_id: 7,
        count: 5,
        ..Default::default()
    });

    let cmd = autoincr_cmd_of(&r).unwrap();
    assert_eq!(
        AutoIncrCmd::GenId {
            servlet_id: 7,
            count: 5,
        },
        cmd
    );

    // a registry op is refused by the auto-increment mapper
    let r = req(OpType::OpCreateApp);
    assert!(autoincr_cmd_of(&r).is_err());
}
