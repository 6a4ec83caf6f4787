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

use async_trait::async_trait;
use beacon_types::ErrCode;
use beacon_types::TsoApplied;
use beacon_types::TsoCmd;
use beacon_types::TsoTimestamp;
use common_exception::Result;
use common_tracing::tracing;
use serde::Deserialize;
use serde::Serialize;

use crate::state_machine::GroupStateMachine;

/// Refresh period of the leader's physical clock.
pub const UPDATE_TIMESTAMP_INTERVAL_MS: u64 = 50;
/// Physical interval the leader pre-commits before issuing timestamps.
pub const SAVE_INTERVAL_MS: i64 = 3000;
/// 2020-01-01 00:00:00 UTC; physical times count from here.
pub const BASE_TIMESTAMP_MS: i64 = 1_577_808_000_000;
pub const LOGICAL_BITS: u32 = 18;
pub const MAX_LOGICAL: i64 = 1 << LOGICAL_BITS;

/// Wall milliseconds since the TSO epoch.
pub fn physical_of(now_unix_ms: i64) -> i64 {
    now_unix_ms - BASE_TIMESTAMP_MS
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
struct TsoSnapshot {
    last_save_physical: i64,
}

/// The timestamp oracle.
///
/// `last_save_physical` is replicated: it is the bound below which a
/// leader has durably acquired the right to issue. `current` is leader
/// volatile; it is never persisted and resets on every leadership change,
/// which is exactly why a new leader resumes strictly above the old one.
#[derive(Default)]
pub struct TsoSm {
    current: TsoTimestamp,
    last_save_physical: i64,
    ready: bool,
}

impl TsoSm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_save_physical(&self) -> i64 {
        self.last_save_physical
    }

    pub fn current(&self) -> TsoTimestamp {
        self.current
    }

    /// Whether the leader has committed its first save window and may
    /// serve `gen_tso`.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Advance the volatile clock to `physical` and reset the logical
    /// counter. Called by the leader on start and on every refresh tick.
    pub fn sync_timestamp(&mut self, physical: i64) {
        self.current = TsoTimestamp {
            physical,
            logical: 0,
        };
    }

    /// Allocate `count` timestamps without a proposal: returns the current
    /// tuple and advances the logical counter under the machine's lock.
    pub fn gen_tso(&mut self, count: u64) -> std::result::Result<TsoTimestamp, ErrCode> {
        if count == 0 {
            return Err(ErrCode::InputParamError);
        }
        if !self.ready || self.current.physical == 0 {
            return Err(ErrCode::RetryLater);
        }
        if self.current.logical + count as i64 >= MAX_LOGICAL {
            // Logical space exhausted within this physical tick; the next
            // refresh advances physical and resets it.
            return Err(ErrCode::RetryLater);
        }

        let ts = self.current;
        self.current.logical += count as i64;
        Ok(ts)
    }
}

#[async_trait]
impl GroupStateMachine for TsoSm {
    type Cmd = TsoCmd;
    type Resp = TsoApplied;

    fn group() -> &'static str {
        "tso"
    }

    async fn apply_cmd(&mut self, cmd: &TsoCmd) -> Result<TsoApplied> {
        match cmd {
            TsoCmd::UpdateSave { save_physical } => {
                // The save bound never goes backwards.
                if *save_physical > self.last_save_physical {
                    self.last_save_physical = *save_physical;
                }
                Ok(TsoApplied::ok(self.last_save_physical))
            }
            TsoCmd::Reset {
                timestamp,
                save_physical,
                force,
            } => {
                if !force
                    && (*save_physical < self.last_save_physical
                        || timestamp.physical < self.current.physical)
                {
                    return Ok(TsoApplied::err(
                        ErrCode::InputParamError,
                        "backwards reset requires force",
                    ));
                }
                self.last_save_physical = *save_physical;
                self.current = *timestamp;
                tracing::info!(
                    "tso reset: current={:?} save={}",
                    self.current,
                    self.last_save_physical
                );
                Ok(TsoApplied::ok(self.last_save_physical))
            }
        }
    }

    async fn snapshot_export(&self) -> Result<Vec<u8>> {
        // Physical bound only; the logical counter is never persisted.
        let snap = TsoSnapshot {
            last_save_physical: self.last_save_physical,
        };
        let data = serde_json::to_vec(&snap)?;
        Ok(data)
    }

    async fn snapshot_import(&mut self, data: &[u8]) -> Result<()> {
        let snap: TsoSnapshot = serde_json::from_slice(data)?;
        self.last_save_physical = snap.last_save_physical;
        self.current = TsoTimestamp::default();
        self.ready = false;
        Ok(())
    }

    fn on_leader_start(&mut self) {
        self.current = TsoTimestamp::default();
        self.ready = false;
    }

    fn on_leader_stop(&mut self) {
        // Fence: no timestamp may be issued after leadership is lost.
        self.current = TsoTimestamp::default();
        self.ready = false;
    }
}
