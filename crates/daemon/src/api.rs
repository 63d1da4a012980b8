// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Control API (C8): a JSON-RPC 2.0 endpoint over HTTP, gated by Basic
//! auth, dispatching to the fixed [`Method`] allowlist exposed by
//! `snapd-wire`. Grounded in `original_source/http_handler.py`'s
//! single-endpoint dispatch, built on the axum stack.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{post, MethodRouter};
use axum::{Json, Router};
use base64::Engine;
use snapd_core::{ApiCredentials, Priority};
use snapd_wire::{
    BackupParams, CheckRepositoryParams, ExplainSnapshotParams, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListSnapshotsParams, Method, PruneParams, RestoreSnapshotParams,
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::orchestrator::Orchestrator;

#[derive(Clone)]
struct ApiState {
    orchestrator: Arc<Orchestrator>,
    credentials: ApiCredentials,
}

/// A running Control API listener. Drop without calling [`stop`] and the
/// server keeps running on its spawned task; call `stop` to shut it down
/// gracefully from `Lifecycle`.
///
/// [`stop`]: ApiHandle::stop
pub struct ApiHandle {
    shutdown: tokio::sync::oneshot::Sender<()>,
    join: tokio::task::JoinHandle<()>,
}

impl ApiHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.join.await;
    }
}

/// Any verb other than POST/OPTIONS on the RPC endpoint: the source
/// returns a bare 500 rather than the conventional 405.
async fn method_not_allowed() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

fn rpc_route() -> MethodRouter<ApiState> {
    post(handle_rpc).fallback(method_not_allowed)
}

fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", rpc_route())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn serve(orchestrator: Arc<Orchestrator>, port: u16, credentials: ApiCredentials) -> ApiHandle {
    let state = ApiState { orchestrator, credentials };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let join = tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(component = "api", action = "serve", status = "failure", error = %e, "failed to bind control api listener");
                return;
            }
        };
        tracing::info!(component = "api", action = "serve", status = "starting", addr = %addr, "control api listening");
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    ApiHandle { shutdown: shutdown_tx, join }
}

fn check_auth(headers: &HeaderMap, credentials: &ApiCredentials) -> bool {
    let Some(header) = headers.get(header::AUTHORIZATION) else { return false };
    let Ok(value) = header.to_str() else { return false };
    let Some(encoded) = value.strip_prefix("Basic ") else { return false };
    let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded) else { return false };
    let Ok(text) = String::from_utf8(decoded) else { return false };
    let Some((user, pass)) = text.split_once(':') else { return false };
    user == credentials.username && pass == credentials.password
}

fn unauthorized() -> Response {
    let mut response = Json(JsonRpcResponse::invalid_auth()).into_response();
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, axum::http::HeaderValue::from_static("Basic"));
    response
}

async fn handle_rpc(State(state): State<ApiState>, headers: HeaderMap, body: Bytes) -> Response {
    if !check_auth(&headers, &state.credentials) {
        return unauthorized();
    }

    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return Json(JsonRpcResponse::error(serde_json::Value::Null, JsonRpcError::invalid_params(e.to_string())))
                .into_response()
        }
    };

    let id = request.id.clone();
    let method = match Method::from_str(&request.method) {
        Ok(m) => m,
        Err(_) => return Json(JsonRpcResponse::error(id, JsonRpcError::method_not_found(&request.method))).into_response(),
    };

    match dispatch(&state.orchestrator, method, request.params).await {
        Ok(value) => Json(JsonRpcResponse::success(id, value)).into_response(),
        Err(error) => Json(JsonRpcResponse::error(id, error)).into_response(),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(value).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}

async fn dispatch(orchestrator: &Arc<Orchestrator>, method: Method, params: serde_json::Value) -> Result<serde_json::Value, JsonRpcError> {
    let accepted = || serde_json::json!({"accepted": true});

    match method {
        Method::GetConfigSummary => {
            serde_json::to_value(orchestrator.get_config_summary()).map_err(|e| JsonRpcError::internal(e.to_string()))
        }
        Method::ListSnapshots => {
            let params: ListSnapshotsParams = parse_params(params)?;
            let priority = params.priority.unwrap_or(Priority::Immediate);
            let rows = orchestrator
                .list_snapshots(params.repository_name, params.backup_name, params.sort, params.reverse, priority)
                .await
                .map_err(|e| JsonRpcError::internal(e.to_string()))?;
            serde_json::to_value(rows).map_err(|e| JsonRpcError::internal(e.to_string()))
        }
        Method::ExplainSnapshot => {
            let params: ExplainSnapshotParams = parse_params(params)?;
            let result = orchestrator
                .explain_snapshot(&params.repository_name, &params.snapshot_id)
                .await
                .map_err(|e| JsonRpcError::internal(e.to_string()))?;
            serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string()))
        }
        Method::Backup => {
            let params: BackupParams = parse_params(params)?;
            orchestrator.backup(&params.backup_name, params.priority, None);
            Ok(accepted())
        }
        Method::RestoreSnapshot => {
            let params: RestoreSnapshotParams = parse_params(params)?;
            let priority = params.priority.unwrap_or(Priority::Normal);
            orchestrator.restore_snapshot(&params.repository_name, &params.snapshot, params.target_path, priority);
            Ok(accepted())
        }
        Method::CheckRepository => {
            let params: CheckRepositoryParams = parse_params(params)?;
            orchestrator.check_repository(&params.repository_name, params.priority);
            Ok(accepted())
        }
        Method::Prune => {
            let params: PruneParams = parse_params(params)?;
            orchestrator.prune(&params.backup_name, params.priority);
            Ok(accepted())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapd_adapters::fake::FakeInvoker;
    use snapd_adapters::ProcessRegistry;
    use snapd_config::load_from_str;

    const CONFIG: &str = r#"
        hostname = "myhost"

        [repositories.r]
        location = "loc"
        password = "pw"

        [backups.nightly]
        paths = ["/data"]
        repositories = ["r"]
    "#;

    fn state() -> ApiState {
        let loaded = load_from_str(CONFIG).unwrap();
        let orchestrator = Orchestrator::new(loaded, Arc::new(FakeInvoker::new()), ProcessRegistry::new());
        ApiState {
            orchestrator,
            credentials: ApiCredentials { username: "admin".to_string(), password: "secret".to_string() },
        }
    }

    #[test]
    fn check_auth_accepts_matching_basic_credentials() {
        let s = state();
        let mut headers = HeaderMap::new();
        let token = base64::engine::general_purpose::STANDARD.encode("admin:secret");
        headers.insert(header::AUTHORIZATION, format!("Basic {token}").parse().unwrap());
        assert!(check_auth(&headers, &s.credentials));
    }

    #[test]
    fn check_auth_rejects_wrong_password() {
        let s = state();
        let mut headers = HeaderMap::new();
        let token = base64::engine::general_purpose::STANDARD.encode("admin:wrong");
        headers.insert(header::AUTHORIZATION, format!("Basic {token}").parse().unwrap());
        assert!(!check_auth(&headers, &s.credentials));
    }

    #[test]
    fn check_auth_rejects_missing_header() {
        let s = state();
        let headers = HeaderMap::new();
        assert!(!check_auth(&headers, &s.credentials));
    }

    #[tokio::test]
    async fn dispatch_unknown_repository_check_is_reported_but_not_fatal() {
        let s = state();
        let value = dispatch(
            &s.orchestrator,
            Method::CheckRepository,
            serde_json::json!({"repository_name": "does-not-exist"}),
        )
        .await
        .unwrap();
        assert_eq!(value, serde_json::json!({"accepted": true}));
    }

    #[tokio::test]
    async fn dispatch_get_config_summary_round_trips() {
        let s = state();
        let value = dispatch(&s.orchestrator, Method::GetConfigSummary, serde_json::Value::Null).await.unwrap();
        assert_eq!(value["hostname"], serde_json::json!("myhost"));
    }

    #[tokio::test]
    async fn dispatch_missing_required_param_is_invalid_params() {
        let s = state();
        let err = dispatch(&s.orchestrator, Method::Backup, serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.code, "invalid-params");
    }

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn unauthenticated_post_returns_401_with_basic_challenge() {
        let app = router(state());
        let response = app
            .oneshot(Request::builder().method("POST").uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Basic");
    }

    #[tokio::test]
    async fn options_preflight_is_answered_permissively() {
        let app = router(state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/")
                    .header(header::ORIGIN, "http://localhost:1234")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn non_post_verb_returns_500() {
        let app = router(state());
        let token = base64::engine::general_purpose::STANDARD.encode("admin:secret");
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/")
                    .header(header::AUTHORIZATION, format!("Basic {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn authenticated_post_dispatches_to_config_summary() {
        let app = router(state());
        let token = base64::engine::general_purpose::STANDARD.encode("admin:secret");
        let body = serde_json::to_vec(&JsonRpcRequest {
            jsonrpc: snapd_wire::JSONRPC_VERSION.to_string(),
            method: "get_config_summary".to_string(),
            params: serde_json::Value::Null,
            id: serde_json::json!(1),
        })
        .unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(header::AUTHORIZATION, format!("Basic {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
