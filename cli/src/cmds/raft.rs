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
use beacon_types::RaftControlOp;
use beacon_types::RaftControlRequest;
use beacon_types::RaftGroup;
use common_exception::ErrorCode;
use common_exception::Result;
use structopt::StructOpt;

use crate::cmds::check;

#[derive(Debug, StructOpt)]
pub enum RaftCmd {
    /// Leader and peer set of a group.
    Status {
        #[structopt(long, default_value = "registry")]
        group: String,
    },
    /// Trigger a snapshot of a group.
    Snapshot {
        #[structopt(long, default_value = "registry")]
        group: String,
    },
    /// Ask the addressed replica to call an election.
    Vote {
        #[structopt(long, default_value = "registry")]
        group: String,
    },
    /// Replace the peer set; --old must match the current one.
    SetPeer {
        #[structopt(long, default_value = "registry")]
        group: String,
        #[structopt(long, use_delimiter = true)]
        old: Vec<String>,
        #[structopt(long, use_delimiter = true)]
        new: Vec<String>,
    },
    /// Shut a group down on the addressed replica.
    Shutdown {
        #[structopt(long, default_value = "registry")]
        group: String,
    },
}

fn group_of(s: &str) -> Result<RaftGroup> {
    match s {
        "registry" => Ok(RaftGroup::Registry),
        "autoincr" => Ok(RaftGroup::AutoIncr),
        "tso" => Ok(RaftGroup::Tso),
        _ => Err(ErrorCode::InvalidConfig(format!(
            "unknown raft group: {} (registry|autoincr|tso)",
            s
        ))),
    }
}

fn control_req(group: RaftGroup, op_type: RaftControlOp) -> RaftControlRequest {
    RaftControlRequest {
        group,
        op_type,
        new_peers: vec![],
        old_peers: vec![],
        new_leader: None,
        force: false,
    }
}

pub async fn exec(client: &RouterClient, cmd: &RaftCmd) -> Result<()> {
    match cmd {
        RaftCmd::Status { group } => {
            let req = control_req(group_of(group)?, RaftControlOp::GetLeader);
            let resp = client.raft_control(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("leader: {}", resp.leader);
            println!("peers:  {}", resp.peers.join(","));
        }
        RaftCmd::Snapshot { group } => {
            let req = control_req(group_of(group)?, RaftControlOp::SnapShot);
            let resp = client.raft_control(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("{}", resp.errmsg);
        }
        RaftCmd::Vote { group } => {
            let req = control_req(group_of(group)?, RaftControlOp::Vote);
            let resp = client.raft_control(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("{}", resp.errmsg);
        }
        RaftCmd::SetPeer { group, old, new } => {
            let mut req = control_req(group_of(group)?, RaftControlOp::SetPeer);
            req.old_peers = old.clone();
            req.new_peers = new.clone();
            let resp = client.raft_control(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("{}", resp.errmsg);
        }
        RaftCmd::Shutdown { group } => {
            let req = control_req(group_of(group)?, RaftControlOp::ShutDown);
            let resp = client.raft_control(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("{}", resp.errmsg);
        }
    }
    Ok(())
}
