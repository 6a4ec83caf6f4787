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

use beacon_client::RouterClient;
use beacon_types::AppMeta;
use beacon_types::OpType;
use beacon_types::QueryOpType;
use comfy_table::Table;
use common_exception::Result;
use structopt::StructOpt;

use crate::cmds::check;
use crate::cmds::manager_req;
use crate::cmds::query_req;

#[derive(Debug, StructOpt)]
pub enum AppCmd {
    /// Create an app.
    Create {
        #[structopt(long)]
        name: String,
        #[structopt(long, default_value = "0")]
        quota: i64,
    },
    /// Remove an empty app.
    Remove {
        #[structopt(long)]
        name: String,
    },
    /// Change an app's quota.
    Modify {
        #[structopt(long)]
        name: String,
        #[structopt(long)]
        quota: i64,
    },
    /// List every app.
    List,
    /// Show one app.
    Info {
        #[structopt(long)]
        name: String,
    },
}

fn with_app(op_type: OpType, name: &str, quota: i64) -> beacon_types::ManagerRequest {
    let mut req = manager_req(op_type);
    req.app = Some(AppMeta {
        app_name: name.to_string(),
        quota,
        ..Default::default()
    });
    req
}

fn print_apps(apps: &[AppMeta]) {
    let mut table = Table::new();
    table.set_header(vec!["name", "id", "quota", "version"]);
    for app in apps {
        table.add_row(vec![
            app.app_name.clone(),
            app.app_id.to_string(),
            app.quota.to_string(),
            app.version.to_string(),
        ]);
    }
    println!("{}", table);
}

pub async fn exec(client: &RouterClient, cmd: &AppCmd) -> Result<()> {
    match cmd {
        AppCmd::Create { name, quota } => {
            let resp = client
                .discovery_manager(&with_app(OpType::OpCreateApp, name, *quota))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("created app {}", name);
        }
        AppCmd::Remove { name } => {
            let resp = client
                .discovery_manager(&with_app(OpType::OpDropApp, name, 0))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("removed app {}", name);
        }
        AppCmd::Modify { name, quota } => {
            let resp = client
                .discovery_manager(&with_app(OpType::OpModifyApp, name, *quota))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("modified app {}", name);
        }
        AppCmd::List => {
            let resp = client
                .discovery_query(&query_req(QueryOpType::QueryApp))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            print_apps(&resp.apps);
        }
        AppCmd::Info { name } => {
            let mut req = query_req(QueryOpType::QueryApp);
            req.app_name = Some(name.clone());
            let resp = client.discovery_query(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            print_apps(&resp.apps);
        }
    }
    Ok(())
}
