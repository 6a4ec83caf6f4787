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

use std::collections::BTreeMap;

use async_trait::async_trait;
use beacon_types::AutoIncrApplied;
use beacon_types::AutoIncrCmd;
use beacon_types::ErrCode;
use common_exception::Result;
use common_tracing::tracing;
use serde::Deserialize;
use serde::Serialize;

use crate::state_machine::GroupStateMachine;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
struct Counter {
    next: u64,
    increment: u64,
}

/// Per-servlet monotonic counters with ranged allocation.
///
/// The whole state is the map; it lives in memory and is rebuilt from the
/// replicated log or a snapshot. The snapshot is a JSON document keyed by
/// servlet id, which BTreeMap keeps in stable numeric order.
#[derive(Default)]
pub struct AutoIncrSm {
    counters: BTreeMap<i64, Counter>,
}

impl AutoIncrSm {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_servlet_id(&mut self, servlet_id: i64, start: u64) -> AutoIncrApplied {
        if self.counters.contains_key(&servlet_id) {
            return AutoIncrApplied::err(ErrCode::InputParamError, "servlet id already exists");
        }
        self.counters.insert(
            servlet_id,
            Counter {
                next: start,
                increment: 1,
            },
        );
        AutoIncrApplied::ok()
    }

    fn drop_servlet_id(&mut self, servlet_id: i64) -> AutoIncrApplied {
        if self.counters.remove(&servlet_id).is_none() {
            return AutoIncrApplied::err(ErrCode::InputParamError, "servlet id not exist");
        }
        AutoIncrApplied::ok()
    }

    fn gen_id(&mut self, servlet_id: i64, count: u64) -> AutoIncrApplied {
        if count == 0 {
            return AutoIncrApplied::err(ErrCode::InputParamError, "count must be positive");
        }
        let counter = match self.counters.get_mut(&servlet_id) {
            None => {
                return AutoIncrApplied::err(ErrCode::InputParamError, "servlet id not exist");
            }
            Some(c) => c,
        };

        let start_id = counter.next;
        let end_id = start_id + count * counter.increment;
        counter.next = end_id;
        AutoIncrApplied::range(start_id, end_id)
    }

    fn update(
        &mut self,
        servlet_id: i64,
        start: Option<u64>,
        increment: Option<u64>,
        force: bool,
    ) -> AutoIncrApplied {
        let counter = match self.counters.get_mut(&servlet_id) {
            None => {
                return AutoIncrApplied::err(ErrCode::InputParamError, "servlet id not exist");
            }
            Some(c) => c,
        };

        if let Some(start) = start {
            // Winding a counter backwards re-issues ids; make the operator
            // say so explicitly.
            if start < counter.next && !force {
                return AutoIncrApplied::err(
                    ErrCode::InputParamError,
                    "backwards update requires force",
                );
            }
            counter.next = start;
        }
        if let Some(increment) = increment {
            if increment == 0 {
                return AutoIncrApplied::err(ErrCode::InputParamError, "increment must be positive");
            }
            counter.increment = increment;
        }
        AutoIncrApplied::ok()
    }
}

#[async_trait]
impl GroupStateMachine for AutoIncrSm {
    type Cmd = AutoIncrCmd;
    type Resp = AutoIncrApplied;

    fn group() -> &'static str {
        "autoincr"
    }

    async fn apply_cmd(&mut self, cmd: &AutoIncrCmd) -> Result<AutoIncrApplied> {
        let resp = match cmd {
            AutoIncrCmd::AddServletId { servlet_id, start } => {
                self.add_servlet_id(*servlet_id, *start)
            }
            AutoIncrCmd::DropServletId { servlet_id } => self.drop_servlet_id(*servlet_id),
            AutoIncrCmd::GenId { servlet_id, count } => self.gen_id(*servlet_id, *count),
            AutoIncrCmd::Update {
                servlet_id,
                start,
                increment,
                force,
            } => self.update(*servlet_id, *start, *increment, *force),
        };

        if !resp.errcode.is_success() {
            tracing::warn!("auto-incr apply rejected: {:?}: {}", cmd, resp.errmsg);
        }
        Ok(resp)
    }

    async fn snapshot_export(&self) -> Result<Vec<u8>> {
        let data = serde_json::to_vec(&self.counters)?;
        Ok(data)
    }

    async fn snapshot_import(&mut self, data: &[u8]) -> Result<()> {
        self.counters = serde_json::from_slice(data)?;
        Ok(())
    }
}
