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

use beacon_cli::cmds;
use beacon_cli::cmds::Opts;
use common_base::tokio;
use structopt::StructOpt;

#[tokio::main]
async fn main() {
    let opts = Opts::from_args();

    if let Err(e) = cmds::exec(opts).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
