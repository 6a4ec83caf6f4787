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

use std::sync::Arc;
use std::sync::Mutex;

use lazy_static::lazy_static;
use tempfile::TempDir;

struct GlobalSledDb {
    /// When opened on a temp dir, the dir is kept alive as long as the db.
    #[allow(dead_code)]
    temp_dir: Option<TempDir>,
    db: sled::Db,
}

impl GlobalSledDb {
    fn new_temp(temp_dir: TempDir) -> Self {
        let path = temp_dir.path().to_str().unwrap().to_string();

        GlobalSledDb {
            temp_dir: Some(temp_dir),
            db: sled::open(path).expect("open global sled db"),
        }
    }

    fn new(path: String) -> Self {
        GlobalSledDb {
            temp_dir: None,
            db: sled::open(path).expect("open global sled db"),
        }
    }
}

lazy_static! {
    static ref GLOBAL_SLED: Arc<Mutex<Option<GlobalSledDb>>> = Arc::new(Mutex::new(None));
}

/// Open a process-wide sled db at `path`. Only the first call has effect;
/// sled requires a single `Db` instance per process.
pub fn init_sled_db(path: String) {
    let mut g = GLOBAL_SLED.as_ref().lock().unwrap();
    if g.is_some() {
        return;
    }
    *g = Some(GlobalSledDb::new(path));
}

/// Open the process-wide sled db on a temp dir; for testing.
pub fn init_temp_sled_db(temp_dir: TempDir) {
    let mut g = GLOBAL_SLED.as_ref().lock().unwrap();
    if g.is_some() {
        return;
    }
    *g = Some(GlobalSledDb::new_temp(temp_dir));
}

pub fn get_sled_db() -> sled::Db {
    let guard = GLOBAL_SLED.as_ref().lock().unwrap();
    let glb_opt = guard.as_ref();
    match glb_opt {
        None => panic!("init_sled_db() or init_temp_sled_db() must be called before using sled"),
        Some(g) => g.db.clone(),
    }
}
