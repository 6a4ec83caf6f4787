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

//! Leader-side choreography of the timestamp oracle.
//!
//! On winning the election the leader first commits the right to issue
//! below `last_save + SAVE_INTERVAL` into the log, and only then starts
//! handing out timestamps. A refresh fiber advances the physical clock
//! every tick and tops the window up before it drains. Everything here
//! runs outside `apply`; the state machine itself stays deterministic.

use std::sync::Arc;
use std::time::Duration;

use async_raft::State;
use beacon_raft_store::state_machine::tso;
use beacon_raft_store::state_machine::GroupStateMachine;
use beacon_types::TsoCmd;
use common_base::now_ms;
use common_base::tokio;
use common_base::tokio::sync::watch;
use common_base::tokio::task::JoinHandle;
use common_tracing::tracing;

use crate::meta_service::DiscoveryNode;

/// Watch the TSO group's metrics and drive leader start/stop.
pub fn spawn_tso_runtime(node: Arc<DiscoveryNode>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut metrics_rx = node.tso_raft.metrics();
        let mut shutdown_rx = node.shutdown_rx.clone();
        let mut was_leader = false;
        let mut tick_stop: Option<watch::Sender<bool>> = None;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                changed = metrics_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let is_leader = metrics_rx.borrow().state == State::Leader;

                    if is_leader && !was_leader {
                        was_leader = true;
                        tick_stop = leader_start(&node).await;
                    } else if !is_leader && was_leader {
                        was_leader = false;
                        if let Some(stop) = tick_stop.take() {
                            let _ = stop.send(true);
                        }
                        leader_stop(&node).await;
                    }
                }
            }
        }

        if let Some(stop) = tick_stop.take() {
            let _ = stop.send(true);
        }
    })
}

async fn leader_start(node: &Arc<DiscoveryNode>) -> Option<watch::Sender<bool>> {
    {
        let mut sm = node.tso_store.state_machine.write().await;
        sm.on_leader_start();
    }

    let last_save = {
        let sm = node.tso_store.state_machine.read().await;
        sm.last_save_physical()
    };

    let next = std::cmp::max(tso::physical_of(now_ms()), last_save + 1);
    let save = next + tso::SAVE_INTERVAL_MS;

    match node.write_tso(TsoCmd::UpdateSave { save_physical: save }).await {
        Ok(resp) if resp.errcode.is_success() => {}
        _ => {
            // Leadership may already be gone; the next election cycle
            // will retry.
            tracing::warn!("tso leader start: save window proposal failed");
            return None;
        }
    }

    {
        let mut sm = node.tso_store.state_machine.write().await;
        sm.sync_timestamp(next);
        sm.set_ready(true);
    }
    tracing::info!("tso leader ready: physical={} save={}", next, save);

    let (stop_tx, stop_rx) = watch::channel(false);
    let n = node.clone();
    tokio::spawn(refresh_loop(n, stop_rx));
    Some(stop_tx)
}

async fn leader_stop(node: &Arc<DiscoveryNode>) {
    let mut sm = node.tso_store.state_machine.write().await;
    sm.on_leader_stop();
    tracing::info!("tso leader stopped");
}

async fn refresh_loop(node: Arc<DiscoveryNode>, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(tso::UPDATE_TIMESTAMP_INTERVAL_MS));

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.tick() => {
                let (current, last_save, ready) = {
                    let sm = node.tso_store.state_machine.read().await;
                    (sm.current(), sm.last_save_physical(), sm.is_ready())
                };
                if !ready {
                    continue;
                }

                let next = std::cmp::max(tso::physical_of(now_ms()), current.physical + 1);

                // Top the window up before it runs dry.
                if next > last_save - tso::SAVE_INTERVAL_MS / 2 {
                    let save = next + tso::SAVE_INTERVAL_MS;
                    match node.write_tso(TsoCmd::UpdateSave { save_physical: save }).await {
                        Ok(resp) if resp.errcode.is_success() => {}
                        _ => {
                            tracing::warn!("tso refresh: save window extension failed");
                            continue;
                        }
                    }
                }

                let mut sm = node.tso_store.state_machine.write().await;
                sm.sync_timestamp(next);
            }
        }
    }
}
