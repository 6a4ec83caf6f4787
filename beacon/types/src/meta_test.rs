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

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use semver::Version;

use crate::ErrCode;
use crate::InstanceMeta;
use crate::ManagerRequest;
use crate::OpType;
use crate::RegistryCmd;

#[test]
fn test_config_versions_order_by_semver() {
    let mut versions: BTreeMap<Version, &str> = BTreeMap::new();
    versions.insert(Version::parse("1.0.0").unwrap(), "a");
    versions.insert(Version::parse("1.0.10").unwrap(), "c");
    versions.insert(Version::parse("1.0.2").unwrap(), "b");

    // 1.0.10 > 1.0.2 numerically, not lexically.
    let (latest, content) = versions.iter().next_back().unwrap();
    assert_eq!(&Version::parse("1.0.10").unwrap(), latest);
    assert_eq!(&"c", content);
}

#[test]
fn test_registry_cmd_roundtrip() {
    let cmd = RegistryCmd::AddInstance {
        instance: InstanceMeta {
            app_name: "search".to_string(),
            zone_name: "web".to_string(),
            servlet_name: "query".to_string(),
            address: "10.0.0.1:80".to_string(),
            env: "prod".to_string(),
            color: "blue".to_string(),
            mtime: 1000,
            ..Default::default()
        },
    };

    let b = serde_json::to_vec(&cmd).unwrap();
    let got: RegistryCmd = serde_json::from_slice(&b).unwrap();
    assert_eq!(cmd, got);
}

#[test]
fn test_manager_request_omitted_payloads_default() {
    // A client only sets the payload matching op_type; the rest must
    // deserialize as absent.
    let req: ManagerRequest = serde_json::from_str(
        r#"{"op_type":"OpCreateApp","app":{"app_name":"a","app_id":0,"quota":1,"version":0}}"#,
    )
    .unwrap();

    assert_eq!(OpType::OpCreateApp, req.op_type);
    assert_eq!("a", req.app.as_ref().unwrap().app_name);
    assert!(req.zone.is_none());
    assert!(req.config.is_none());
}

#[test]
fn test_errcode_serde_is_stable() {
    assert_eq!(
        "\"InputParamError\"",
        serde_json::to_string(&ErrCode::InputParamError).unwrap()
    );
    let e: ErrCode = serde_json::from_str("\"NotLeader\"").unwrap();
    assert_eq!(ErrCode::NotLeader, e);
}
