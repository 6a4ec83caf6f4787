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

use beaconsrv::configs::RouterConfig;
use beaconsrv::router;
use common_base::tokio;
use common_exception::Result;
use common_tracing::init_tracing_with_file;
use common_tracing::tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RouterConfig::load();

    let _guards = init_tracing_with_file("beacon-router", &config.log_dir);
    tracing::info!("config: {:?}", config);

    router::serve(config).await?;

    tracing::info!("bye");
    Ok(())
}
