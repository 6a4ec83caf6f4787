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

use beacon_types::ErrCode;
use beacon_types::TsoCmd;
use beacon_types::TsoTimestamp;
use common_base::tokio;
use common_exception::Result;
use pretty_assertions::assert_eq;

use crate::state_machine::tso::MAX_LOGICAL;
use crate::state_machine::tso::SAVE_INTERVAL_MS;
use crate::state_machine::GroupStateMachine;
use crate::state_machine::TsoSm;

#[tokio::test]
async fn test_gen_tso_is_monotonic() -> Result<()> {
    let mut sm = TsoSm::new();

    // not ready before the first save window is committed
    assert_eq!(Err(ErrCode::RetryLater), sm.gen_tso(1));

    sm.apply_cmd(&TsoCmd::UpdateSave {
        save_physical: 10_000 + SAVE_INTERVAL_MS,
    })
    .await?;
    sm.sync_timestamp(10_000);
    sm.set_ready(true);

    let r1 = sm.gen_tso(100).unwrap();
    let r2 = sm.gen_tso(1).unwrap();

    assert_eq!((10_000, 0), (r1.physical, r1.logical));
    assert_eq!((10_000, 100), (r2.physical, r2.logical));
    // the whole allocated range of r1 sits strictly below r2
    assert!((r1.physical, r1.logical + 100 - 1) < (r2.physical, r2.logical));

    // a refresh tick advances physical and resets logical
    sm.sync_timestamp(10_051);
    let r3 = sm.gen_tso(1).unwrap();
    assert_eq!((10_051, 0), (r3.physical, r3.logical));
    assert!((r2.physical, r2.logical) < (r3.physical, r3.logical));

    Ok(())
}

#[tokio::test]
async fn test_gen_tso_logical_exhaustion() -> Result<()> {
    let mut sm = TsoSm::new();
    sm.apply_cmd(&TsoCmd::UpdateSave {
        save_physical: 20_000,
    })
    .await?;
    sm.sync_timestamp(10_000);
    sm.set_ready(true);

    sm.gen_tso((MAX_LOGICAL - 10) as u64).unwrap();
    assert_eq!(Err(ErrCode::RetryLater), sm.gen_tso(100));

    // a smaller allocation still fits
    assert!(sm.gen_tso(5).is_ok());

    Ok(())
}

#[tokio::test]
async fn test_save_bound_never_goes_backwards() -> Result<()> {
    let mut sm = TsoSm::new();

    let got = sm
        .apply_cmd(&TsoCmd::UpdateSave { save_physical: 500 })
        .await?;
    assert_eq!(500, got.save_physical);

    let got = sm
        .apply_cmd(&TsoCmd::UpdateSave { save_physical: 400 })
        .await?;
    assert_eq!(500, got.save_physical, "stale extension is ignored");

    Ok(())
}

#[tokio::test]
async fn test_reset_requires_force_to_go_backwards() -> Result<()> {
    let mut sm = TsoSm::new();
    sm.apply_cmd(&TsoCmd::UpdateSave {
        save_physical: 9_000,
    })
    .await?;

    let got = sm
        .apply_cmd(&TsoCmd::Reset {
            timestamp: TsoTimestamp {
                physical: 100,
                logical: 0,
            },
            save_physical: 1_000,
            force: false,
        })
        .await?;
    assert_eq!(ErrCode::InputParamError, got.errcode);
    assert_eq!(9_000, sm.last_save_physical());

    let got = sm
        .apply_cmd(&TsoCmd::Reset {
            timestamp: TsoTimestamp {
                physical: 100,
                logical: 0,
            },
            save_physical: 1_000,
            force: true,
        })
        .await?;
    assert_eq!(ErrCode::Success, got.errcode);
    assert_eq!(1_000, sm.last_save_physical());
    assert_eq!(100, sm.current().physical);

    Ok(())
}

#[tokio::test]
async fn test_snapshot_keeps_save_bound_only() -> Result<()> {
    let mut sm = TsoSm::new();
    sm.apply_cmd(&TsoCmd::UpdateSave {
        save_physical: 7_777,
    })
    .await?;
    sm.sync_timestamp(7_000);
    sm.set_ready(true);
    sm.gen_tso(42).unwrap();

    let snap = sm.snapshot_export().await?;

    let mut sm2 = TsoSm::new();
    sm2.snapshot_import(&snap).await?;

    assert_eq!(7_777, sm2.last_save_physical());
    assert_eq!(TsoTimestamp::default(), sm2.current(), "logical not kept");
    assert!(!sm2.is_ready());

    Ok(())
}

#[tokio::test]
async fn test_new_leader_resumes_above_old_issues() -> Result<()> {
    // Leader 1 commits a window and issues from within it.
    let mut l1 = TsoSm::new();
    let p1 = 50_000;
    l1.apply_cmd(&TsoCmd::UpdateSave {
        save_physical: p1 + SAVE_INTERVAL_MS,
    })
    .await?;
    l1.sync_timestamp(p1);
    l1.set_ready(true);
    let r1 = l1.gen_tso(100).unwrap();

    // Leader 2 takes over from a snapshot, with a wall clock far behind.
    let snap = l1.snapshot_export().await?;
    let mut l2 = TsoSm::new();
    l2.snapshot_import(&snap).await?;
    l2.on_leader_start();

    let wall_behind = 10_000;
    let next = std::cmp::max(wall_behind, l2.last_save_physical() + 1);
    l2.apply_cmd(&TsoCmd::UpdateSave {
        save_physical: next + SAVE_INTERVAL_MS,
    })
    .await?;
    l2.sync_timestamp(next);
    l2.set_ready(true);

    let r2 = l2.gen_tso(1).unwrap();
    assert!(
        r2.physical > r1.physical,
        "new leader issues strictly above the old one even with a lagging clock"
    );

    Ok(())
}
