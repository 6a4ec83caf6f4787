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

use std::time::Duration;

use common_exception::Result;

use crate::BlockingWait;
use crate::Runtime;
use crate::TrySpawn;

#[test]
fn test_runtime_spawn() -> Result<()> {
    let rt = Runtime::with_worker_threads(2)?;

    let h = rt.spawn(async { 1 + 2 });
    let got = futures::executor::block_on(h).unwrap();
    assert_eq!(3, got);

    Ok(())
}

#[test]
fn test_blocking_wait() -> Result<()> {
    async fn five() -> u8 {
        5
    }

    assert_eq!(5, five().wait(None)?);
    assert_eq!(5, five().wait(Some(Duration::from_millis(100)))?);

    let slow = async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        5
    };
    let got = slow.wait(Some(Duration::from_millis(20)));
    assert!(got.is_err());

    Ok(())
}

#[test]
fn test_now_secs_tracks_now_ms() {
    let ms = crate::now_ms();
    let secs = crate::now_secs();
    assert!((secs - ms / 1000).abs() <= 1);
}
