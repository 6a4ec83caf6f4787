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
use beacon_types::PrivilegeRequest;
use beacon_types::PrivilegeServlet;
use beacon_types::PrivilegeZone;
use beacon_types::QueryOpType;
use beacon_types::UserPrivilege;
use beacon_types::UserRequest;
use beacon_types::RW;
use comfy_table::Table;
use common_exception::Result;
use structopt::StructOpt;

use crate::cmds::check;
use crate::cmds::manager_req;
use crate::cmds::query_req;

#[derive(Debug, StructOpt)]
pub enum UserCmd {
    /// Create a user.
    Create {
        #[structopt(long)]
        name: String,
        #[structopt(long)]
        password: String,
        /// Allowed source addresses, repeatable.
        #[structopt(long)]
        ip: Vec<String>,
    },
    /// Remove a user.
    Remove {
        #[structopt(long)]
        name: String,
    },
    /// Grant a privilege (and/or rotate the password, add ips).
    Grant {
        #[structopt(long)]
        name: String,
        #[structopt(long)]
        password: Option<String>,
        #[structopt(long)]
        ip: Vec<String>,
        #[structopt(long)]
        app: Option<String>,
        #[structopt(long)]
        zone: Option<String>,
        #[structopt(long)]
        servlet: Option<String>,
        /// Grant write instead of read.
        #[structopt(long)]
        write: bool,
    },
    /// Revoke a privilege or allowed ips.
    Revoke {
        #[structopt(long)]
        name: String,
        #[structopt(long)]
        ip: Vec<String>,
        #[structopt(long)]
        app: Option<String>,
        #[structopt(long)]
        zone: Option<String>,
        #[structopt(long)]
        servlet: Option<String>,
    },
    /// List every user.
    List,
    /// Show one user with privileges.
    Info {
        #[structopt(long)]
        name: String,
    },
}

fn privilege_of(
    app: &Option<String>,
    zone: &Option<String>,
    servlet: &Option<String>,
    rw: RW,
) -> (Vec<PrivilegeZone>, Vec<PrivilegeServlet>) {
    match (app, zone, servlet) {
        (Some(app), Some(zone), Some(servlet)) => (
            vec![],
            vec![PrivilegeServlet {
                app_name: app.clone(),
                zone_name: zone.clone(),
                servlet_name: servlet.clone(),
                rw,
            }],
        ),
        (Some(app), Some(zone), None) => (
            vec![PrivilegeZone {
                app_name: app.clone(),
                zone_name: zone.clone(),
                rw,
            }],
            vec![],
        ),
        _ => (vec![], vec![]),
    }
}

fn print_users(users: &[UserPrivilege]) {
    let mut table = Table::new();
    table.set_header(vec!["user", "ips", "zone privileges", "servlet privileges", "version"]);
    for u in users {
        let zones = u
            .zone_privileges
            .iter()
            .map(|p| format!("{}.{}:{:?}", p.app_name, p.zone_name, p.rw))
            .collect::<Vec<_>>()
            .join(",");
        let servlets = u
            .servlet_privileges
            .iter()
            .map(|p| format!("{}.{}.{}:{:?}", p.app_name, p.zone_name, p.servlet_name, p.rw))
            .collect::<Vec<_>>()
            .join(",");
        table.add_row(vec![
            u.username.clone(),
            u.ips.join(","),
            zones,
            servlets,
            u.version.to_string(),
        ]);
    }
    println!("{}", table);
}

pub async fn exec(client: &RouterClient, cmd: &UserCmd) -> Result<()> {
    match cmd {
        UserCmd::Create { name, password, ip } => {
            let mut req = manager_req(OpType::OpCreateUser);
            req.user = Some(UserRequest {
                username: name.clone(),
                password: password.clone(),
                ips: ip.clone(),
                ..Default::default()
            });
            let resp = client.discovery_manager(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("created user {}", name);
        }
        UserCmd::Remove { name } => {
            let mut req = manager_req(OpType::OpDropUser);
            req.user = Some(UserRequest {
                username: name.clone(),
                ..Default::default()
            });
            let resp = client.discovery_manager(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("removed user {}", name);
        }
        UserCmd::Grant {
            name,
            password,
            ip,
            app,
            zone,
            servlet,
            write,
        } => {
            let rw = if *write { RW::Write } else { RW::Read };
            let (zone_privileges, servlet_privileges) = privilege_of(app, zone, servlet, rw);
            let mut req = manager_req(OpType::OpAddPrivilege);
            req.privilege = Some(PrivilegeRequest {
                username: name.clone(),
                password: password.clone(),
                ips: ip.clone(),
                zone_privileges,
                servlet_privileges,
            });
            let resp = client.discovery_manager(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("granted to {}", name);
        }
        UserCmd::Revoke {
            name,
            ip,
            app,
            zone,
            servlet,
        } => {
            let (zone_privileges, servlet_privileges) = privilege_of(app, zone, servlet, RW::Read);
            let mut req = manager_req(OpType::OpDropPrivilege);
            req.privilege = Some(PrivilegeRequest {
                username: name.clone(),
                password: None,
                ips: ip.clone(),
                zone_privileges,
                servlet_privileges,
            });
            let resp = client.discovery_manager(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("revoked from {}", name);
        }
        UserCmd::List => {
            let resp = client
                .discovery_query(&query_req(QueryOpType::QueryUserPrivilege))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            print_users(&resp.users);
        }
        UserCmd::Info { name } => {
            let mut req = query_req(QueryOpType::QueryUserPrivilege);
            req.user_name = Some(name.clone());
            let resp = client.discovery_query(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            print_users(&resp.users);
        }
    }
    Ok(())
}
