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
use std::sync::Once;

use lazy_static::lazy_static;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

lazy_static! {
    static ref GLOBAL_UT_LOG_GUARD: Arc<Mutex<Option<Vec<WorkerGuard>>>> =
        Arc::new(Mutex::new(None));
}

/// Initialize logging for a server process: a stdout layer plus a
/// daily-rolling file in `dir`, both filtered by `RUST_LOG`.
///
/// The returned guards flush buffered records on drop; keep them alive for
/// the lifetime of the process.
pub fn init_tracing_with_file(app_name: &str, dir: &str) -> Vec<WorkerGuard> {
    let mut guards = vec![];

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout_layer = fmt::Layer::new().with_writer(stdout_writer);
    guards.push(stdout_guard);

    let file_appender = tracing_appender::rolling::daily(dir, app_name);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::Layer::new().with_writer(file_writer).with_ansi(false);
    guards.push(file_guard);

    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(stdout_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .expect("error setting global tracing subscriber");

    guards
}

/// Initialize logging once for unit tests; repeated calls are no-ops.
pub fn init_default_ut_tracing() {
    static START: Once = Once::new();

    START.call_once(|| {
        let guards = init_ut_tracing();
        let mut g = GLOBAL_UT_LOG_GUARD.as_ref().lock().unwrap();
        *g = Some(guards);
    });
}

fn init_ut_tracing() -> Vec<WorkerGuard> {
    let mut guards = vec![];

    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(guard);

    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(fmt::Layer::new().with_writer(writer).with_ansi(false));

    // Tests from multiple crates may race to install a subscriber.
    let _ = tracing::subscriber::set_global_default(subscriber);

    guards
}
