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

#[cfg(test)]
mod runtime_test;

mod runtime;
mod time;

pub use runtime::BlockingWait;
pub use runtime::Runtime;
pub use runtime::TrySpawn;
pub use time::now_ms;
pub use time::now_secs;
// Re-export tokio so that every crate in the workspace builds against the
// same runtime version.
pub use tokio;
