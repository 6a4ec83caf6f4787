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
use beacon_types::OpType;
use beacon_types::QueryOpType;
use beacon_types::ServletMeta;
use comfy_table::Table;
use common_exception::Result;
use structopt::StructOpt;

use crate::cmds::check;
use crate::cmds::manager_req;
use crate::cmds::query_req;

#[derive(Debug, StructOpt)]
pub enum ServletCmd {
    /// Create a servlet under a zone.
    Create {
        #[structopt(long)]
        app: String,
        #[structopt(long)]
        zone: String,
        #[structopt(long)]
        servlet: String,
    },
    /// Remove a servlet without instances.
    Remove {
        #[structopt(long)]
        app: String,
        #[structopt(long)]
        zone: String,
        #[structopt(long)]
        servlet: String,
    },
    /// Bump a servlet's version.
    Modify {
        #[structopt(long)]
        app: String,
        #[structopt(long)]
        zone: String,
        #[structopt(long)]
        servlet: String,
    },
    /// List servlets, optionally under an app or zone.
    List {
        #[structopt(long)]
        app: Option<String>,
        #[structopt(long)]
        zone: Option<String>,
    },
    /// Show one servlet.
    Info {
        #[structopt(long)]
        app: String,
        #[structopt(long)]
        zone: String,
        #[structopt(long)]
        servlet: String,
    },
}

fn with_servlet(op_type: OpType, app: &str, zone: &str, servlet: &str) -> beacon_types::ManagerRequest {
    let mut req = manager_req(op_type);
    req.servlet = Some(ServletMeta {
        app_name: app.to_string(),
        zone_name: zone.to_string(),
        servlet_name: servlet.to_string(),
        ..Default::default()
    });
    req
}

fn print_servlets(servlets: &[ServletMeta]) {
    let mut table = Table::new();
    table.set_header(vec!["app", "zone", "servlet", "id", "version"]);
    for s in servlets {
        table.add_row(vec![
            s.app_name.clone(),
            s.zone_name.clone(),
            s.servlet_name.clone(),
            s.servlet_id.to_string(),
            s.version.to_string(),
        ]);
    }
    println!("{}", table);
}

pub async fn exec(client: &RouterClient, cmd: &ServletCmd) -> Result<()> {
    match cmd {
        ServletCmd::Create { app, zone, servlet } => {
            let resp = client
                .discovery_manager(&with_servlet(OpType::OpCreateServlet, app, zone, servlet))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("created servlet {}.{}.{}", app, zone, servlet);
        }
        ServletCmd::Remove { app, zone, servlet } => {
            let resp = client
                .discovery_manager(&with_servlet(OpType::OpDropServlet, app, zone, servlet))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("removed servlet {}.{}.{}", app, zone, servlet);
        }
        ServletCmd::Modify { app, zone, servlet } => {
            let resp = client
                .discovery_manager(&with_servlet(OpType::OpModifyServlet, app, zone, servlet))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("modified servlet {}.{}.{}", app, zone, servlet);
        }
        ServletCmd::List { app, zone } => {
            let mut req = query_req(QueryOpType::QueryServlet);
            req.app_name = app.clone();
            req.zone_name = zone.clone();
            let resp = client.discovery_query(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            print_servlets(&resp.servlets);
        }
        ServletCmd::Info { app, zone, servlet } => {
            let mut req = query_req(QueryOpType::QueryServlet);
            req.app_name = Some(app.clone());
            req.zone_name = Some(zone.clone());
            req.servlet_name = Some(servlet.clone());
            let resp = client.discovery_query(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            print_servlets(&resp.servlets);
        }
    }
    Ok(())
}
