use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::collect::AssetCollector;
use crate::config::AppConfig;
use crate::error::{KubeGraphError, KubeGraphResult};
use crate::model::asset::AssetKind;
use crate::model::graph::PropertyMap;
use crate::query::QueryService;
use crate::store::Channel;

#[derive(Clone)]
pub struct AppState {
    pub collector: AssetCollector,
    pub service: QueryService,
}

#[derive(Debug, Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
    timestamp: DateTime<Utc>,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<KubeGraphError> for ApiError {
    fn from(err: KubeGraphError) -> Self {
        let status = match &err {
            KubeGraphError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            KubeGraphError::StoreUnavailable { .. } | KubeGraphError::Timeout { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            KubeGraphError::QueryFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, "Request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            success: false,
            error: self.message,
            timestamp: Utc::now(),
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn channel(raw: &str) -> Result<Channel, ApiError> {
    raw.parse::<Channel>().map_err(ApiError::from)
}

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    #[serde(alias = "statement", alias = "query")]
    pub cypher: Option<String>,
    #[serde(default, alias = "parameters")]
    pub params: PropertyMap,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackPathBody {
    pub start_node: Option<String>,
    pub end_node: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/k8s/assets", get(list_assets))
        .route("/k8s/assets/:kind", get(list_assets_of_kind))
        .route("/k8s/relationships", get(list_relationships))
        .route("/k8s/health", get(cluster_health))
        .route("/graph/health", get(graph_health))
        .route("/graph/:channel/import", post(import_graph))
        .route("/graph/:channel/clear", delete(clear_graph))
        .route("/graph/:channel/query", post(query_graph))
        .route("/graph/:channel/attack-paths", post(attack_paths))
        .route("/graph/:channel/vulnerabilities", get(vulnerabilities))
        .route("/graph/:channel/stats", get(graph_stats))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

pub async fn run_http_server(config: AppConfig) -> KubeGraphResult<()> {
    let collector = AssetCollector::from_config(&config.cluster).await?;
    let service = QueryService::from_config(&config.store)?;
    let app = router(AppState { collector, service });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|err| KubeGraphError::ConfigError(format!("invalid server address: {err}")))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| KubeGraphError::Internal(format!("failed to bind server: {err}")))?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .await
        .map_err(|err| KubeGraphError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    ok(serde_json::json!({
        "status": "ok",
        "source": state.collector.source_name(),
    }))
}

async fn list_assets(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.collector.collect_all_assets().await)
}

async fn list_assets_of_kind(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let kind: AssetKind = kind.parse()?;
    Ok(ok(state.collector.collect_kind(kind).await))
}

async fn list_relationships(State(state): State<AppState>) -> impl IntoResponse {
    let relationships = state.collector.collect_asset_relationships().await;
    ok(serde_json::json!({ "relationships": relationships }))
}

async fn cluster_health(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state
        .collector
        .health_check()
        .await
        .map_err(|err| ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: err.to_string(),
        })?;
    Ok(ok(serde_json::json!({ "status": "connected" })))
}

async fn graph_health(State(state): State<AppState>) -> Response {
    let health = state.service.health().await;
    let healthy = health.rest.healthy && health.session.healthy;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = Json(Envelope {
        success: healthy,
        data: health,
        timestamp: Utc::now(),
    });
    (status, body).into_response()
}

async fn import_graph(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let channel = channel(&raw)?;
    let snapshot = state.collector.collect_snapshot().await;
    let report = state.service.import(channel, &snapshot).await?;
    Ok(ok(report))
}

async fn clear_graph(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let channel = channel(&raw)?;
    state.service.clear(channel).await?;
    Ok(ok(serde_json::json!({ "cleared": true, "channel": channel })))
}

async fn query_graph(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Json(body): Json<QueryBody>,
) -> ApiResult<impl IntoResponse> {
    let channel = channel(&raw)?;
    let slice = state
        .service
        .query(channel, body.cypher.as_deref(), body.params)
        .await?;
    Ok(ok(slice))
}

async fn attack_paths(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Json(body): Json<AttackPathBody>,
) -> ApiResult<impl IntoResponse> {
    let channel = channel(&raw)?;
    let paths = state
        .service
        .shortest_path(channel, body.start_node.as_deref(), body.end_node.as_deref())
        .await?;
    Ok(ok(paths))
}

async fn vulnerabilities(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let channel = channel(&raw)?;
    Ok(ok(state.service.vulnerabilities(channel).await?))
}

async fn graph_stats(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let channel = channel(&raw)?;
    Ok(ok(state.service.stats(channel).await?))
}
