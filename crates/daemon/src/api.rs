//! HTTP API
//!
//! AIP-style routes over the resource manager. Create takes an optional `id`
//! query parameter, delete an optional `allow_missing`.

use crate::manager::ResourceManager;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use nvmeof_common::{
    Error, ErrorCode, ListRequest, NvmeController, NvmeNamespace, NvmeSubsystem, Page,
    VolumeStats,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Error response carrying the mapped status code
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.code() {
            ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Unimplemented => StatusCode::NOT_IMPLEMENTED,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({"error": self.0.to_string()}))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
struct CreateParams {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeleteParams {
    #[serde(default)]
    allow_missing: bool,
}

/// Build the API router
pub fn router(manager: ResourceManager) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route(
            "/v1/subsystems",
            get(list_subsystems_handler).post(create_subsystem_handler),
        )
        .route(
            "/v1/subsystems/:name",
            get(get_subsystem_handler)
                .patch(update_subsystem_handler)
                .delete(delete_subsystem_handler),
        )
        .route("/v1/subsystems/:name/stats", get(subsystem_stats_handler))
        .route(
            "/v1/controllers",
            get(list_controllers_handler).post(create_controller_handler),
        )
        .route(
            "/v1/controllers/:name",
            get(get_controller_handler)
                .patch(update_controller_handler)
                .delete(delete_controller_handler),
        )
        .route("/v1/controllers/:name/stats", get(controller_stats_handler))
        .route(
            "/v1/namespaces",
            get(list_namespaces_handler).post(create_namespace_handler),
        )
        .route(
            "/v1/namespaces/:name",
            get(get_namespace_handler)
                .patch(update_namespace_handler)
                .delete(delete_namespace_handler),
        )
        .route("/v1/namespaces/:name/stats", get(namespace_stats_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(manager)
}

/// Serve the API until the listener fails
pub async fn serve(addr: SocketAddr, manager: ResourceManager) -> anyhow::Result<()> {
    info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(manager)).await?;

    Ok(())
}

async fn health_handler(State(manager): State<ResourceManager>) -> impl IntoResponse {
    let store = manager.store();
    Json(serde_json::json!({
        "status": "ok",
        "version": nvmeof_common::VERSION,
        "subsystems": store.subsystems.len(),
        "controllers": store.controllers.len(),
        "namespaces": store.namespaces.len(),
    }))
}

// ============================================================================
// Subsystems
// ============================================================================

async fn create_subsystem_handler(
    State(manager): State<ResourceManager>,
    Query(params): Query<CreateParams>,
    Json(subsystem): Json<NvmeSubsystem>,
) -> ApiResult<NvmeSubsystem> {
    Ok(Json(manager.create_subsystem(params.id, subsystem).await?))
}

async fn get_subsystem_handler(
    State(manager): State<ResourceManager>,
    Path(name): Path<String>,
) -> ApiResult<NvmeSubsystem> {
    Ok(Json(manager.get_subsystem(&name).await?))
}

async fn update_subsystem_handler(
    State(manager): State<ResourceManager>,
    Path(name): Path<String>,
    Json(subsystem): Json<NvmeSubsystem>,
) -> ApiResult<NvmeSubsystem> {
    Ok(Json(manager.update_subsystem(Some(name), subsystem).await?))
}

async fn delete_subsystem_handler(
    State(manager): State<ResourceManager>,
    Path(name): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError> {
    manager.delete_subsystem(&name, params.allow_missing).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_subsystems_handler(
    State(manager): State<ResourceManager>,
    Query(request): Query<ListRequest>,
) -> ApiResult<Page<NvmeSubsystem>> {
    Ok(Json(manager.list_subsystems(&request).await?))
}

async fn subsystem_stats_handler(
    State(manager): State<ResourceManager>,
    Path(name): Path<String>,
) -> ApiResult<VolumeStats> {
    Ok(Json(manager.subsystem_stats(&name).await?))
}

// ============================================================================
// Controllers
// ============================================================================

async fn create_controller_handler(
    State(manager): State<ResourceManager>,
    Query(params): Query<CreateParams>,
    Json(controller): Json<NvmeController>,
) -> ApiResult<NvmeController> {
    Ok(Json(manager.create_controller(params.id, controller).await?))
}

async fn get_controller_handler(
    State(manager): State<ResourceManager>,
    Path(name): Path<String>,
) -> ApiResult<NvmeController> {
    Ok(Json(manager.get_controller(&name).await?))
}

async fn update_controller_handler(
    State(manager): State<ResourceManager>,
    Path(name): Path<String>,
    Json(controller): Json<NvmeController>,
) -> ApiResult<NvmeController> {
    Ok(Json(manager.update_controller(Some(name), controller).await?))
}

async fn delete_controller_handler(
    State(manager): State<ResourceManager>,
    Path(name): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError> {
    manager.delete_controller(&name, params.allow_missing).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_controllers_handler(
    State(manager): State<ResourceManager>,
    Query(request): Query<ListRequest>,
) -> ApiResult<Page<NvmeController>> {
    Ok(Json(manager.list_controllers(&request).await?))
}

async fn controller_stats_handler(
    State(manager): State<ResourceManager>,
    Path(name): Path<String>,
) -> ApiResult<VolumeStats> {
    Ok(Json(manager.controller_stats(&name).await?))
}

// ============================================================================
// Namespaces
// ============================================================================

async fn create_namespace_handler(
    State(manager): State<ResourceManager>,
    Query(params): Query<CreateParams>,
    Json(namespace): Json<NvmeNamespace>,
) -> ApiResult<NvmeNamespace> {
    Ok(Json(manager.create_namespace(params.id, namespace).await?))
}

async fn get_namespace_handler(
    State(manager): State<ResourceManager>,
    Path(name): Path<String>,
) -> ApiResult<NvmeNamespace> {
    Ok(Json(manager.get_namespace(&name).await?))
}

async fn update_namespace_handler(
    State(manager): State<ResourceManager>,
    Path(name): Path<String>,
    Json(namespace): Json<NvmeNamespace>,
) -> ApiResult<NvmeNamespace> {
    Ok(Json(manager.update_namespace(Some(name), namespace).await?))
}

async fn delete_namespace_handler(
    State(manager): State<ResourceManager>,
    Path(name): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError> {
    manager.delete_namespace(&name, params.allow_missing).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_namespaces_handler(
    State(manager): State<ResourceManager>,
    Query(request): Query<ListRequest>,
) -> ApiResult<Page<NvmeNamespace>> {
    Ok(Json(manager.list_namespaces(&request).await?))
}

async fn namespace_stats_handler(
    State(manager): State<ResourceManager>,
    Path(name): Path<String>,
) -> ApiResult<VolumeStats> {
    Ok(Json(manager.namespace_stats(&name).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::test_manager;
    use crate::testing::FakeTarget;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_subsystem_lifecycle() {
        let target = FakeTarget::new();
        let router = router(test_manager(target.clone()));

        let (status, body) = send(
            &router,
            Method::POST,
            "/v1/subsystems?id=subsys-0",
            Some(json!({"nqn": "nqn.test:1", "serial_number": "SN1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "subsys-0");
        assert_eq!(body["status"]["firmware_revision"], "SPDK v23.01");

        let (status, body) = send(&router, Method::GET, "/v1/subsystems/subsys-0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nqn"], "nqn.test:1");

        let (status, body) = send(&router, Method::GET, "/v1/subsystems?page_size=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);

        let (status, _) = send(
            &router,
            Method::PATCH,
            "/v1/subsystems/subsys-0",
            Some(json!({"nqn": "nqn.test:1"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

        let (status, body) = send(&router, Method::GET, "/v1/subsystems/subsys-0/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["read_ops_count"], -1);

        let (status, _) = send(&router, Method::DELETE, "/v1/subsystems/subsys-0", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&router, Method::DELETE, "/v1/subsystems/subsys-0", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("subsys-0"));

        let (status, _) = send(
            &router,
            Method::DELETE,
            "/v1/subsystems/subsys-0?allow_missing=true",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let target = FakeTarget::new();
        let router = router(test_manager(target.clone()));

        let (status, _) = send(
            &router,
            Method::POST,
            "/v1/namespaces",
            Some(json!({"host_nsid": 1, "volume_id": "Malloc1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&router, Method::GET, "/v1/controllers?page_token=bogus", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        target.fail("nvmf_get_subsystems");
        let (status, _) = send(&router, Method::GET, "/v1/subsystems", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_controller_and_namespace_routes() {
        let target = FakeTarget::new();
        let router = router(test_manager(target.clone()));

        send(
            &router,
            Method::POST,
            "/v1/subsystems?id=subsys-0",
            Some(json!({"nqn": "nqn.test:1"})),
        )
        .await;

        let (status, body) = send(
            &router,
            Method::POST,
            "/v1/controllers?id=ctrl-0",
            Some(json!({"subsystem_id": "subsys-0"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["controller_id"], -1);
        assert_eq!(body["status"]["active"], true);

        let (status, body) = send(
            &router,
            Method::POST,
            "/v1/namespaces?id=ns-0",
            Some(json!({"subsystem_id": "subsys-0", "host_nsid": 2, "volume_id": "Malloc0"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"]["pci_state"], "enabled");

        let (status, body) = send(&router, Method::GET, "/v1/namespaces?parent=subsys-0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["host_nsid"], 2);

        let (status, body) = send(&router, Method::GET, "/v1/controllers/ctrl-0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "ctrl-0");

        let (status, _) = send(&router, Method::DELETE, "/v1/namespaces/ns-0", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&router, Method::DELETE, "/v1/controllers/ctrl-0", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_health() {
        let router = router(test_manager(FakeTarget::new()));
        let (status, body) = send(&router, Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["subsystems"], 0);
    }
}
