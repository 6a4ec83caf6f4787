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

use beacon_client::RouterClient;
use beacon_types::ConfigMeta;
use beacon_types::ConfigRequest;
use beacon_types::ConfigType;
use beacon_types::OpType;
use beacon_types::QueryOpType;
use comfy_table::Table;
use common_exception::ErrorCode;
use common_exception::Result;
use structopt::StructOpt;

use crate::cmds::check;
use crate::cmds::manager_req;
use crate::cmds::query_req;

#[derive(Debug, StructOpt)]
pub enum ConfigCmd {
    /// Publish a new config version. Content comes from --content or
    /// --file.
    Create {
        #[structopt(long)]
        name: String,
        #[structopt(long)]
        version: String,
        #[structopt(long)]
        content: Option<String>,
        #[structopt(long)]
        file: Option<String>,
        /// One of: json, yaml, toml, ini, text.
        #[structopt(long, default_value = "json")]
        config_type: String,
    },
    /// Remove one version, or every version with --all.
    Remove {
        #[structopt(long)]
        name: String,
        #[structopt(long)]
        version: Option<String>,
        #[structopt(long)]
        all: bool,
    },
    /// Fetch one config; without --version the greatest one.
    Get {
        #[structopt(long)]
        name: String,
        #[structopt(long)]
        version: Option<String>,
    },
    /// List every config of every name.
    List,
    /// List the versions of one name.
    Versions {
        #[structopt(long)]
        name: String,
    },
}

fn config_type_of(s: &str) -> Result<ConfigType> {
    match s {
        "json" => Ok(ConfigType::Json),
        "yaml" => Ok(ConfigType::Yaml),
        "toml" => Ok(ConfigType::Toml),
        "ini" => Ok(ConfigType::Ini),
        "text" => Ok(ConfigType::Text),
        _ => Err(ErrorCode::InvalidConfig(format!(
            "unknown config type: {}",
            s
        ))),
    }
}

fn print_configs(configs: &[ConfigMeta], with_content: bool) {
    let mut table = Table::new();
    if with_content {
        table.set_header(vec!["name", "version", "type", "time", "content"]);
    } else {
        table.set_header(vec!["name", "version", "type", "time"]);
    }
    for c in configs {
        let mut row = vec![
            c.config_name.clone(),
            c.version.to_string(),
            format!("{:?}", c.config_type),
            c.time.to_string(),
        ];
        if with_content {
            row.push(c.content.clone());
        }
        table.add_row(row);
    }
    println!("{}", table);
}

pub async fn exec(client: &RouterClient, cmd: &ConfigCmd) -> Result<()> {
    match cmd {
        ConfigCmd::Create {
            name,
            version,
            content,
            file,
            config_type,
        } => {
            let content = match (content, file) {
                (Some(c), _) => c.clone(),
                (None, Some(f)) => std::fs::read_to_string(f)?,
                (None, None) => {
                    return Err(ErrorCode::InvalidConfig("--content or --file is required"));
                }
            };

            let mut req = manager_req(OpType::OpCreateConfig);
            req.config = Some(ConfigRequest {
                config_name: name.clone(),
                version: Some(version.clone()),
                content,
                config_type: config_type_of(config_type)?,
                all: false,
            });
            let resp = client.discovery_manager(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("created config {} {}", name, version);
        }
        ConfigCmd::Remove { name, version, all } => {
            let mut req = manager_req(OpType::OpRemoveConfig);
            req.config = Some(ConfigRequest {
                config_name: name.clone(),
                version: version.clone(),
                content: String::new(),
                config_type: ConfigType::Json,
                all: *all,
            });
            let resp = client.discovery_manager(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            println!("removed config {}", name);
        }
        ConfigCmd::Get { name, version } => {
            let mut req = query_req(QueryOpType::QueryConfig);
            req.config_name = Some(name.clone());
            req.config_version = version.clone();
            let resp = client.discovery_query(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            print_configs(&resp.configs, true);
        }
        ConfigCmd::List => {
            let resp = client
                .discovery_query(&query_req(QueryOpType::ListConfig))
                .await?;
            check(resp.errcode, &resp.errmsg)?;
            print_configs(&resp.configs, false);
        }
        ConfigCmd::Versions { name } => {
            let mut req = query_req(QueryOpType::ListConfigVersion);
            req.config_name = Some(name.clone());
            let resp = client.discovery_query(&req).await?;
            check(resp.errcode, &resp.errmsg)?;
            print_configs(&resp.configs, false);
        }
    }
    Ok(())
}
