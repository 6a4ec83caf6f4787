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

use std::net::SocketAddr;
use std::sync::Arc;

use axum::handler::post;
use axum::AddExtensionLayer;
use axum::Router;
use axum::routing::BoxRoute;
use common_exception::ErrorCode;
use common_exception::Result;
use common_tracing::tracing;

use crate::api::manager;
use crate::api::query;
use crate::api::raft_control;
use crate::api::registry;
use crate::api::tso;
use crate::meta_service::raft_api;
use crate::meta_service::DiscoveryNode;

/// The full RPC surface of one replica: the client-facing methods plus
/// the peer-to-peer raft endpoints of the three groups.
pub fn api_router(node: Arc<DiscoveryNode>) -> Router<BoxRoute> {
    Router::new()
        .route("/discovery/manager", post(manager::discovery_manager))
        .route("/discovery/query", post(query::discovery_query))
        .route("/discovery/naming", post(query::naming))
        .route("/discovery/registry", post(registry::registry))
        .route("/discovery/update", post(registry::update))
        .route("/discovery/cancel", post(registry::cancel))
        .route("/tso", post(tso::tso_service))
        .route("/raft/control", post(raft_control::raft_control))
        .route(
            "/raft/registry/append-entries",
            post(raft_api::registry_append),
        )
        .route("/raft/registry/vote", post(raft_api::registry_vote))
        .route(
            "/raft/registry/install-snapshot",
            post(raft_api::registry_install_snapshot),
        )
        .route(
            "/raft/autoincr/append-entries",
            post(raft_api::autoincr_append),
        )
        .route("/raft/autoincr/vote", post(raft_api::autoincr_vote))
        .route(
            "/raft/autoincr/install-snapshot",
            post(raft_api::autoincr_install_snapshot),
        )
        .route("/raft/tso/append-entries", post(raft_api::tso_append))
        .route("/raft/tso/vote", post(raft_api::tso_vote))
        .route(
            "/raft/tso/install-snapshot",
            post(raft_api::tso_install_snapshot),
        )
        .layer(AddExtensionLayer::new(node))
        .boxed()
}

/// Serve the RPC surface until the node's shutdown flag flips.
pub async fn serve(node: Arc<DiscoveryNode>) -> Result<()> {
    let addr: SocketAddr = node
        .config
        .listen
        .parse()
        .map_err(|e| ErrorCode::BadAddressFormat(format!("{}: {}", node.config.listen, e)))?;

    let mut shutdown_rx = node.shutdown_rx.clone();
    let app = api_router(node);

    tracing::info!("rpc surface listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await
        .map_err(|e| ErrorCode::UnknownException(format!("http server: {}", e)))?;

    Ok(())
}
