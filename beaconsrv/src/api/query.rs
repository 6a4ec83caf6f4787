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

//! The read side. Every query runs against the local in-memory indexes
//! under the registry read lock and is served on any replica; answers on
//! a follower may trail the leader, which callers accept.

use std::sync::Arc;

use axum::extract::Extension;
use axum::Json;
use beacon_types::ErrCode;
use beacon_types::NamingRequest;
use beacon_types::NamingResponse;
use beacon_types::QueryOpType;
use beacon_types::QueryRequest;
use beacon_types::QueryResponse;
use common_base::now_secs;
use semver::Version;

use crate::meta_service::DiscoveryNode;

pub async fn discovery_query(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<QueryRequest>,
) -> Json<QueryResponse> {
    if !node.is_initialized() {
        return Json(QueryResponse::err(
            ErrCode::HaveNotInit,
            "server not initialized",
        ));
    }

    let sm = node.registry_store.state_machine.read().await;

    let resp = match req.op_type {
        QueryOpType::QueryApp => match req.app_name.as_deref() {
            None => {
                let mut r = QueryResponse::ok();
                r.apps = sm.list_apps();
                r
            }
            Some(app) => match sm.get_app(app) {
                None => QueryResponse::err(ErrCode::InputParamError, "app not exist"),
                Some(meta) => {
                    let mut r = QueryResponse::ok();
                    r.apps = vec![meta];
                    r
                }
            },
        },

        QueryOpType::QueryZone => match (req.app_name.as_deref(), req.zone_name.as_deref()) {
            (Some(app), Some(zone)) => match sm.get_zone(app, zone) {
                None => QueryResponse::err(ErrCode::InputParamError, "zone not exist"),
                Some(meta) => {
                    let mut r = QueryResponse::ok();
                    r.zones = vec![meta];
                    r
                }
            },
            (app, _) => {
                let mut r = QueryResponse::ok();
                r.zones = sm.list_zones(app);
                r
            }
        },

        QueryOpType::QueryServlet => {
            match (
                req.app_name.as_deref(),
                req.zone_name.as_deref(),
                req.servlet_name.as_deref(),
            ) {
                (Some(app), Some(zone), Some(servlet)) => match sm.get_servlet(app, zone, servlet)
                {
                    None => QueryResponse::err(ErrCode::InputParamError, "servlet not exist"),
                    Some(meta) => {
                        let mut r = QueryResponse::ok();
                        r.servlets = vec![meta];
                        r
                    }
                },
                (app, zone, _) => {
                    let mut r = QueryResponse::ok();
                    r.servlets = sm.list_servlets(app, zone);
                    r
                }
            }
        }

        QueryOpType::QueryInstance => match req.instance_address.as_deref() {
            None => QueryResponse::err(ErrCode::InputParamError, "no instance address"),
            Some(address) => match sm.get_instance(address) {
                None => QueryResponse::err(ErrCode::InputParamError, "instance not exists"),
                Some(meta) => {
                    let mut r = QueryResponse::ok();
                    r.instances = vec![meta];
                    r
                }
            },
        },

        QueryOpType::QueryInstanceFlatten => {
            let mut r = QueryResponse::ok();
            r.instances = sm.flatten_instances(
                req.app_name.as_deref(),
                req.zone_name.as_deref(),
                req.servlet_name.as_deref(),
            );
            r
        }

        QueryOpType::QueryUserPrivilege => match req.user_name.as_deref() {
            None => {
                let mut r = QueryResponse::ok();
                r.users = sm.list_users();
                r
            }
            Some(user) => match sm.get_user(user) {
                None => QueryResponse::err(ErrCode::InputParamError, "user not exist"),
                Some(meta) => {
                    let mut r = QueryResponse::ok();
                    r.users = vec![meta];
                    r
                }
            },
        },

        QueryOpType::QueryConfig => match req.config_name.as_deref() {
            None => QueryResponse::err(ErrCode::InputParamError, "config name not set"),
            Some(name) => {
                let version = match req.config_version.as_deref() {
                    None => None,
                    Some(v) => match Version::parse(v) {
                        Ok(v) => Some(v),
                        Err(e) => {
                            return Json(QueryResponse::err(
                                ErrCode::InputParamError,
                                format!("bad semver {}: {}", v, e),
                            ));
                        }
                    },
                };
                match sm.get_config(name, version.as_ref()) {
                    Ok(meta) => {
                        let mut r = QueryResponse::ok();
                        r.configs = vec![meta];
                        r
                    }
                    Err(errcode) => QueryResponse::err(errcode, "config not exist"),
                }
            }
        },

        QueryOpType::ListConfig => {
            let mut r = QueryResponse::ok();
            r.configs = sm.list_configs();
            r
        }

        QueryOpType::ListConfigVersion => match req.config_name.as_deref() {
            None => QueryResponse::err(ErrCode::InputParamError, "config name not set"),
            Some(name) => match sm.list_config_versions(name) {
                Ok(configs) => {
                    let mut r = QueryResponse::ok();
                    r.configs = configs;
                    r
                }
                Err(errcode) => QueryResponse::err(errcode, "config not exist"),
            },
        },
    };

    Json(resp)
}

pub async fn naming(
    Extension(node): Extension<Arc<DiscoveryNode>>,
    Json(req): Json<NamingRequest>,
) -> Json<NamingResponse> {
    if !node.is_initialized() {
        let mut r = NamingResponse::default();
        r.errcode = ErrCode::HaveNotInit;
        r.errmsg = "server not initialized".to_string();
        return Json(r);
    }

    let sm = node.registry_store.state_machine.read().await;
    Json(sm.naming(&req, now_secs(), node.config.liveness_window_s))
}
