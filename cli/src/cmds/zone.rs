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
use beacon_types::ZoneMeta;
use comfy_table::Table;
use common_exception::Result;
use structopt::StructOpt;

use crate::cmds::check;
use crate::cmds::manager_req;
use crate::cmds::query_req;

#[derive(Debug, StructOpt)]
pub enum ZoneCmd {
    /// Create a zone under an app.
    Create {
        #[structopt(long)]
        app: String,
        #[structopt(long)]
        zone: String,
        #[structopt(long, default_value = "0")]
        quota: i64,
    },
    /// Remove an empty zone.
    Remove {
        #[structopt(long)]
        app: String,
        #[structopt(long)]
        zone: String,
    },
    /// Change a zone's quota.
    Modify {
        #[structopt(long)]
        app: String,
        #[structopt(long)]
        zone: String,
        #[structopt(long)]
        quota: i64,
    },
    /// List zones, optionally of one app.
    List {
        #[structopt(long)]
        app: Option<String>,
    },
    /// Show one zone.
    Info {
        #[structopt(long)]
        app: String,
        #[structopt(long)]
        zone: String,
    },
}

fn with_zone(op_type: OpType, app: &str, zone: &str, quota: i64) -> beacon_types::ManagerRequest {
    let mut req = manager_req(op_type);
    req.zone = Some(ZoneMeta {
        app_name: app.to_string(),
        zone_name: zone.to_string(),
        quota,
        ..Default::default()
    });
    req
}

fn print_zones(zones: &[ZoneMeta]) {
    let mut table = Table::new();
    table.set_header(vec!["app", "zone", "id", "quota", "version"]);
    for zone in zones {
        table.add_row(vec![
            zone.app_name.clone(),
            zone.zone_name.clone(),
            zone.zone_id.to_string(),
            zone.quota.to_string(),
            zone.version.to_string(),
        ]);
    }
    println!("{}", table);
}

pub async fn exec(client: &RouterClient, cmd: &ZoneCmd) -> Result<()> {
    match cmd {
        ZoneCmd::Create { app, zone, quota } => {
            let resp = client
                .discovery_manager(&with_zone(OpType::OpCreateZone, app, zone, *quota))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("created zone {}.{}", app, zone);
        }
        ZoneCmd::Remove { app, zone } => {
            let resp = client
                .discovery_manager(&with_zone(OpType::OpDropZone, app, zone, 0))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("removed zone {}.{}", app, zone);
        }
        ZoneCmd::Modify { app, zone, quota } => {
            let resp = client
                .discovery_manager(&with_zone(OpType::OpModifyZone, app, zone, *quota))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("modified zone {}.{}", app, zone);
        }
        ZoneCmd::List { app } => {
            let mut req = query_req(QueryOpType::QueryZone);
            req.app_name = app.clone();
            let resp = client.discovery_query(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            print_zones(&resp.zones);
        }
        ZoneCmd::Info { app, zone } => {
            let mut req = query_req(QueryOpType::QueryZone);
            req.app_name = Some(app.clone());
            req.zone_name = Some(zone.clone());
            let resp = client.discovery_query(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            print_zones(&resp.zones);
        }
    }
    Ok(())
}
