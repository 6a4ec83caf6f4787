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

use beaconsrv::api;
use beaconsrv::configs::Config;
use beaconsrv::meta_service::DiscoveryNode;
use common_base::tokio;
use common_exception::Result;
use common_tracing::init_tracing_with_file;
use common_tracing::tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load();

    let _guards = init_tracing_with_file("beacon-server", &config.log_dir);
    tracing::info!("config: {:?}", config);

    common_sled_store::init_sled_db(config.raft_config.raft_dir.clone());

    let node = DiscoveryNode::open(config).await?;
    DiscoveryNode::start(&node).await?;

    let serving = api::serve(node.clone());

    tokio::select! {
        res = serving => {
            res?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down");
        }
    }

    node.close().await?;
    tracing::info!("bye");
    Ok(())
}
