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
use beacon_types::AutoIncrRequest;
use beacon_types::OpType;
use common_exception::Result;
use structopt::StructOpt;

use crate::cmds::check;
use crate::cmds::manager_req;

#[derive(Debug, StructOpt)]
pub enum AtomicCmd {
    /// Create a counter for a servlet id.
    Create {
        #[structopt(long)]
        servlet_id: i64,
        #[structopt(long, default_value = "1")]
        start: u64,
    },
    /// Remove a counter.
    Remove {
        #[structopt(long)]
        servlet_id: i64,
    },
    /// Allocate a range of ids.
    Gen {
        #[structopt(long)]
        servlet_id: i64,
        #[structopt(long, default_value = "1")]
        count: u64,
    },
    /// Reset or advance a counter; going backwards needs --force.
    Update {
        #[structopt(long)]
        servlet_id: i64,
        #[structopt(long)]
        start: Option<u64>,
        #[structopt(long)]
        increment: Option<u64>,
        #[structopt(long)]
        force: bool,
    },
}

pub async fn exec(client: &RouterClient, cmd: &AtomicCmd) -> Result<()> {
    let (op_type, incr) = match cmd {
        AtomicCmd::Create { servlet_id, start } => (
            OpType::OpAddIdForAutoIncrement,
            AutoIncrRequest {
                servlet_id: *servlet_id,
                start: Some(*start),
                ..Default::default()
            },
        ),
        AtomicCmd::Remove { servlet_id } => (
            OpType::OpDropIdForAutoIncrement,
            AutoIncrRequest {
                servlet_id: *servlet_id,
                ..Default::default()
            },
        ),
        AtomicCmd::Gen { servlet_id, count } => (
            OpType::OpGenIdForAutoIncrement,
            AutoIncrRequest {
                servlet_id: *servlet_id,
                count: *count,
                ..Default::default()
            },
        ),
        AtomicCmd::Update {
            servlet_id,
            start,
            increment,
            force,
        } => (
            OpType::OpUpdateForAutoIncrement,
            AutoIncrRequest {
                servlet_id: *servlet_id,
                start: *start,
                increment: *increment,
                force: *force,
                ..Default::default()
            },
        ),
    };

    let mut req = manager_req(op_type);
    req.auto_increment = Some(incr);

    let resp = client.discovery_manager(&req).await?;
    check(resp.errcode, &resp.errmsg)?;

    match (resp.start_id, resp.end_id) {
        (Some(start), Some(end)) => println!("allocated [{}, {})", start, end),
        _ => println!("ok"),
    }
    Ok(())
}
