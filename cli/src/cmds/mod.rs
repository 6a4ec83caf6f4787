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

mod app;
mod atomic;
mod config;
mod discovery;
mod raft;
mod servlet;
mod user;
mod zone;

use beacon_client::RouterClient;
use beacon_types::ErrCode;
use common_exception::ErrorCode;
use common_exception::Result;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "beaconctl", about = "beacon cluster operator command line")]
pub struct Opts {
    /// A replica endpoint (host:port) to talk to directly.
    #[structopt(long, global = true, default_value = "127.0.0.1:8010")]
    pub server: String,

    /// A router endpoint; wins over --server when set.
    #[structopt(long, global = true, default_value = "")]
    pub router: String,

    /// Per-request timeout in milliseconds.
    #[structopt(long, global = true, default_value = "30000")]
    pub timeout: u64,

    /// Retries across leader changes and dead peers.
    #[structopt(long, global = true, default_value = "3")]
    pub retry: u32,

    #[structopt(long, global = true)]
    pub verbose: bool,

    #[structopt(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Manage apps.
    App(app::AppCmd),
    /// Manage zones under an app.
    Zone(zone::ZoneCmd),
    /// Manage servlets under a zone.
    Servlet(servlet::ServletCmd),
    /// Manage users and privileges.
    User(user::UserCmd),
    /// Manage versioned configuration blobs.
    Config(config::ConfigCmd),
    /// Instance registration and naming queries.
    Discovery(discovery::DiscoveryCmd),
    /// Per-servlet auto-increment counters.
    Atomic(atomic::AtomicCmd),
    /// Raft group control.
    Raft(raft::RaftCmd),
}

impl Opts {
    fn client(&self) -> Result<RouterClient> {
        let endpoint = if self.router.is_empty() {
            self.server.clone()
        } else {
            self.router.clone()
        };
        RouterClient::with_options(vec![endpoint], self.timeout, self.retry, 1_000, self.verbose)
    }
}

/// An empty query body for `op`; callers fill in the filters they need.
pub(crate) fn query_req(op_type: beacon_types::QueryOpType) -> beacon_types::QueryRequest {
    beacon_types::QueryRequest {
        op_type,
        app_name: None,
        zone_name: None,
        servlet_name: None,
        instance_address: None,
        user_name: None,
        config_name: None,
        config_version: None,
    }
}

/// An empty manager body for `op`; callers fill in the payload.
pub(crate) fn manager_req(op_type: beacon_types::OpType) -> beacon_types::ManagerRequest {
    beacon_types::ManagerRequest {
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

/// Fail the command when the server said no; callers bubble this up into
/// a non-zero exit code.
pub(crate) fn check(errcode: ErrCode, errmsg: &str) -> Result<()> {
    if errcode.is_success() {
        Ok(())
    } else {
        Err(ErrorCode::UnknownException(format!(
            "{:?}: {}",
            errcode, errmsg
        )))
    }
}

pub async fn exec(opts: Opts) -> Result<()> {
    let client = opts.client()?;

    match &opts.cmd {
        Command::App(cmd) => app::exec(&client, cmd).await,
        Command::Zone(cmd) => zone::exec(&client, cmd).await,
        Command::Servlet(cmd) => servlet::exec(&client, cmd).await,
        Command::User(cmd) => user::exec(&client, cmd).await,
        Command::Config(cmd) => config::exec(&client, cmd).await,
        Command::Discovery(cmd) => discovery::exec(&client, cmd).await,
        Command::Atomic(cmd) => atomic::exec(&client, cmd).await,
        Command::Raft(cmd) => raft::exec(&client, cmd).await,
    }
}
