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

use beacon_types::AutoIncrCmd;
use beacon_types::ErrCode;
use common_base::tokio;
use common_exception::Result;
use pretty_assertions::assert_eq;

use crate::state_machine::AutoIncrSm;
use crate::state_machine::GroupStateMachine;

#[tokio::test]
async fn test_gen_id_ranges() -> Result<()> {
    let mut sm = AutoIncrSm::new();

    let got = sm
        .apply_cmd(&AutoIncrCmd::AddServletId {
            servlet_id: 7,
            start: 100,
        })
        .await?;
    assert_eq!(ErrCode::Success, got.errcode);

    // adding again fails
    let got = sm
        .apply_cmd(&AutoIncrCmd::AddServletId {
            servlet_id: 7,
            start: 1,
        })
        .await?;
    assert_eq!(ErrCode::InputParamError, got.errcode);

    let got = sm
        .apply_cmd(&AutoIncrCmd::GenId {
            servlet_id: 7,
            count: 5,
        })
        .await?;
    assert_eq!((100, 105), (got.start_id, got.end_id));

    let got = sm
        .apply_cmd(&AutoIncrCmd::GenId {
            servlet_id: 7,
            count: 3,
        })
        .await?;
    assert_eq!((105, 108), (got.start_id, got.end_id));

    // unknown servlet
    let got = sm
        .apply_cmd(&AutoIncrCmd::GenId {
            servlet_id: 8,
            count: 1,
        })
        .await?;
    assert_eq!(ErrCode::InputParamError, got.errcode);

    Ok(())
}

#[tokio::test]
async fn test_update_backwards_requires_force() -> Result<()> {
    let mut sm = AutoIncrSm::new();

    sm.apply_cmd(&AutoIncrCmd::AddServletId {
        servlet_id: 7,
        start: 100,
    })
    .await?;
    sm.apply_cmd(&AutoIncrCmd::GenId {
        servlet_id: 7,
        count: 8,
    })
    .await?;

    let got = sm
        .apply_cmd(&AutoIncrCmd::Update {
            servlet_id: 7,
            start: Some(50),
            increment: None,
            force: false,
        })
        .await?;
    assert_eq!(ErrCode::InputParamError, got.errcode);

    let got = sm
        .apply_cmd(&AutoIncrCmd::Update {
            servlet_id: 7,
            start: Some(50),
            increment: None,
            force: true,
        })
        .await?;
    assert_eq!(ErrCode::Success, got.errcode);

    let got = sm
        .apply_cmd(&AutoIncrCmd::GenId {
            servlet_id: 7,
            count: 1,
        })
        .await?;
    assert_eq!((50, 51), (got.start_id, got.end_id));

    // a forward move needs no force
    let got = sm
        .apply_cmd(&AutoIncrCmd::Update {
            servlet_id: 7,
            start: Some(1000),
            increment: Some(10),
            force: false,
        })
        .await?;
    assert_eq!(ErrCode::Success, got.errcode);

    let got = sm
        .apply_cmd(&AutoIncrCmd::GenId {
            servlet_id: 7,
            count: 2,
        })
        .await?;
    assert_eq!((1000, 1020), (got.start_id, got.end_id), "step applied");

    Ok(())
}

#[tokio::test]
async fn test_snapshot_roundtrip() -> Result<()> {
    let mut sm = AutoIncrSm::new();
    for (id, start) in [(3, 30u64), (1, 10), (2, 20)] {
        sm.apply_cmd(&AutoIncrCmd::AddServletId {
            servlet_id: id,
            start,
        })
        .await?;
    }
    sm.apply_cmd(&AutoIncrCmd::GenId {
        servlet_id: 2,
        count: 5,
    })
    .await?;

    let snap1 = sm.snapshot_export().await?;

    let mut sm2 = AutoIncrSm::new();
    sm2.snapshot_import(&snap1).await?;
    let snap2 = sm2.snapshot_export().await?;
    assert_eq!(snap1, snap2, "save -> load -> save is identity");

    // allocation continues where the snapshot stood
    let got = sm2
        .apply_cmd(&AutoIncrCmd::GenId {
            servlet_id: 2,
            count: 1,
        })
        .await?;
    assert_eq!((25, 26), (got.start_id, got.end_id));

    let got = sm2
        .apply_cmd(&AutoIncrCmd::DropServletId { servlet_id: 3 })
        .await?;
    assert_eq!(ErrCode::Success, got.errcode);
    let got = sm2
        .apply_cmd(&AutoIncrCmd::DropServletId { servlet_id: 3 })
        .await?;
    assert_eq!(ErrCode::InputParamError, got.errcode);

    Ok(())
}
