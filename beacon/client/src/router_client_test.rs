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

use common_base::tokio;
use pretty_assertions::assert_eq;

use crate::RouterClient;

#[test]
fn test_empty_endpoints_rejected() {
    let got = RouterClient::new(vec![]);
    assert!(got.is_err());
}

#[tokio::test]
async fn test_send_exhausts_retries_on_dead_peers() {
    // a port from the discard range that nothing listens on
    let client = RouterClient::with_options(
        vec!["127.0.0.1:1".to_string(), "127.0.0.1:2".to_string()],
        200,
        2,
        1,
        false,
    )
    .unwrap();

    let req = beacon_types::NamingRequest {
        app_name: "a".to_string(),
        ..Default::default()
    };
    let got: common_exception::Result<beacon_types::NamingResponse> =
        client.send("discovery/naming", &req).await;

    assert!(got.is_err());
}

#[test]
fn test_rotation_walks_the_endpoint_list() {
    let client = RouterClient::new(vec!["a:1".to_string(), "b:2".to_string()]).unwrap();

    assert_eq!("a:1", client.target());
    client.rotate();
    assert_eq!("b:2", client.target());
    client.rotate();
    assert_eq!("a:1", client.target());
}
