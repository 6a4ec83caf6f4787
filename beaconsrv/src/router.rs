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

//! The router peer: a stateless forwarder outside the raft groups. It
//! exposes the same method surface as a replica and hides leader changes
//! behind the retrying client.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Extension;
use axum::handler::post;
use axum::AddExtensionLayer;
use axum::Json;
use axum::Router;
use axum::routing::BoxRoute;
use beacon_client::RouterClient;
use beacon_types::ErrCode;
use beacon_types::ManagerRequest;
use beacon_types::ManagerResponse;
use beacon_types::NamingRequest;
use beacon_types::NamingResponse;
use beacon_types::QueryRequest;
use beacon_types::QueryResponse;
use beacon_types::RaftControlRequest;
use beacon_types::RaftControlResponse;
use beacon_types::RegisterRequest;
use beacon_types::RegisterResponse;
use beacon_types::TsoRequest;
use beacon_types::TsoResponse;
use common_exception::ErrorCode;
use common_exception::Result;
use common_tracing::tracing;

use crate::configs::RouterConfig;

/// Each handler forwards verbatim; when every retry is exhausted the
/// failure surfaces as an InternalError reply rather than a hung call.
macro_rules! forward {
    ($name:ident, $method:ident, $req:ty, $resp:ident) => {
        async fn $name(
            Extension(client): Extension<Arc<RouterClient>>,
            Json(req): Json<$req>,
        ) -> Json<$resp> {
            match client.$method(&req).await {
                Ok(resp) => Json(resp),
                Err(e) => {
                    tracing::warn!("forward {} failed: {}", stringify!($method), e);
                    Json($resp {
                        errcode: ErrCode::InternalError,
                        errmsg: e.message(),
                        ..Default::default()
                    })
                }
            }
        }
    };
}

forward!(fwd_manager, discovery_manager, ManagerRequest, ManagerResponse);
forward!(fwd_query, discovery_query, QueryRequest, QueryResponse);
forward!(fwd_naming, naming, NamingRequest, NamingResponse);
forward!(fwd_registry, registry, RegisterRequest, RegisterResponse);
forward!(fwd_update, update, RegisterRequest, RegisterResponse);
forward!(fwd_cancel, cancel, RegisterRequest, RegisterResponse);
forward!(fwd_tso, tso, TsoRequest, TsoResponse);
forward!(fwd_raft_control, raft_control, RaftControlRequest, RaftControlResponse);

pub fn router_app(client: Arc<RouterClient>) -> Router<BoxRoute> {
    Router::new()
        .route("/discovery/manager", post(fwd_manager))
        .route("/discovery/query", post(fwd_query))
        .route("/discovery/naming", post(fwd_naming))
        .route("/discovery/registry", post(fwd_registry))
        .route("/discovery/update", post(fwd_update))
        .route("/discovery/cancel", post(fwd_cancel))
        .route("/tso", post(fwd_tso))
        .route("/raft/control", post(fwd_raft_control))
        .layer(AddExtensionLayer::new(client))
        .boxed()
}

pub async fn serve(config: RouterConfig) -> Result<()> {
    let addr: SocketAddr = config
        .listen
        .parse()
        .map_err(|e| ErrorCode::BadAddressFormat(format!("{}: {}", config.listen, e)))?;

    let client = Arc::new(RouterClient::with_options(
        config.servers.clone(),
        config.timeout_ms,
        config.retry,
        config.retry_interval_ms,
        false,
    )?);

    let app = router_app(client);

    tracing::info!("router listening on {}, forwarding to {:?}", addr, config.servers);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = common_base::tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| ErrorCode::UnknownException(format!("http server: {}", e)))?;

    Ok(())
}
