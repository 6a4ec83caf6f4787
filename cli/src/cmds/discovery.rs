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
use beacon_types::InstanceMeta;
use beacon_types::NamingRequest;
use beacon_types::QueryOpType;
use beacon_types::RegisterRequest;
use comfy_table::Table;
use common_exception::Result;
use structopt::StructOpt;

use crate::cmds::check;
use crate::cmds::query_req;

#[derive(Debug, StructOpt)]
pub enum DiscoveryCmd {
    /// Register an instance (or refresh its heartbeat).
    Register {
        #[structopt(long)]
        app: String,
        #[structopt(long)]
        zone: String,
        #[structopt(long)]
        servlet: String,
        #[structopt(long)]
        address: String,
        #[structopt(long, default_value = "")]
        env: String,
        #[structopt(long, default_value = "")]
        color: String,
    },
    /// Update an instance's tags.
    Update {
        #[structopt(long)]
        app: String,
        #[structopt(long)]
        zone: String,
        #[structopt(long)]
        servlet: String,
        #[structopt(long)]
        address: String,
        #[structopt(long, default_value = "")]
        env: String,
        #[structopt(long, default_value = "")]
        color: String,
    },
    /// Cancel an instance registration.
    Cancel {
        #[structopt(long)]
        app: String,
        #[structopt(long)]
        zone: String,
        #[structopt(long)]
        servlet: String,
        #[structopt(long)]
        address: String,
    },
    /// Liveness-filtered discovery.
    Naming {
        #[structopt(long)]
        app: String,
        #[structopt(long, use_delimiter = true)]
        zones: Vec<String>,
        #[structopt(long, use_delimiter = true)]
        envs: Vec<String>,
        #[structopt(long, use_delimiter = true)]
        colors: Vec<String>,
    },
    /// Flatten instances under a prefix of the hierarchy.
    List {
        #[structopt(long)]
        app: Option<String>,
        #[structopt(long)]
        zone: Option<String>,
        #[structopt(long)]
        servlet: Option<String>,
    },
    /// Show one instance.
    Info {
        #[structopt(long)]
        address: String,
    },
}

fn register_req(
    app: &str,
    zone: &str,
    servlet: &str,
    address: &str,
    env: &str,
    color: &str,
) -> RegisterRequest {
    RegisterRequest {
        app_name: app.to_string(),
        zone_name: zone.to_string(),
        servlet_name: servlet.to_string(),
        address: address.to_string(),
        env: env.to_string(),
        color: color.to_string(),
        status: None,
    }
}

fn print_instances(instances: &[InstanceMeta]) {
    let mut table = Table::new();
    table.set_header(vec![
        "address", "app", "zone", "servlet", "env", "color", "status", "version", "mtime",
    ]);
    for i in instances {
        table.add_row(vec![
            i.address.clone(),
            i.app_name.clone(),
            i.zone_name.clone(),
            i.servlet_name.clone(),
            i.env.clone(),
            i.color.clone(),
            format!("{:?}", i.status),
            i.version.to_string(),
            i.mtime.to_string(),
        ]);
    }
    println!("{}", table);
}

pub async fn exec(client: &RouterClient, cmd: &DiscoveryCmd) -> Result<()> {
    match cmd {
        DiscoveryCmd::Register {
            app,
            zone,
            servlet,
            address,
            env,
            color,
        } => {
            let resp = client
                .registry(&register_req(app, zone, servlet, address, env, color))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("registered {}", address);
        }
        DiscoveryCmd::Update {
            app,
            zone,
            servlet,
            address,
            env,
            color,
        } => {
            let resp = client
                .update(&register_req(app, zone, servlet, address, env, color))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("updated {}", address);
        }
        DiscoveryCmd::Cancel {
            app,
            zone,
            servlet,
            address,
        } => {
            let resp = client
                .cancel(&register_req(app, zone, servlet, address, "", ""))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("cancelled {}", address);
        }
        DiscoveryCmd::Naming {
            app,
            zones,
            envs,
            colors,
        } => {
            let resp = client
                .naming(&NamingRequest {
                    app_name: app.clone(),
                    zones: zones.clone(),
                    envs: envs.clone(),
                    colors: colors.clone(),
                })
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            print_instances(&resp.instances);
        }
        DiscoveryCmd::List { app, zone, servlet } => {
            let mut req = query_req(QueryOpType::QueryInstanceFlatten);
            req.app_name = app.clone();
            req.zone_name = zone.clone();
            req.servlet_name = servlet.clone();
            let resp = client.discovery_query(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            print_instances(&resp.instances);
        }
        DiscoveryCmd::Info { address } => {
            let mut req = query_req(QueryOpType::QueryInstance);
            req.instance_address = Some(address.clone());
            let resp = client.discovery_query(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            print_instances(&resp.instances);
        }
    }
    Ok(())
}
