//! Explorer HTTP API.
//!
//! - GET /nodes/{node_id}
//! - PATCH /nodes/{node_id}
//! - GET /nodes/{node_id}/members
//! - POST /nodes/{node_id}/members
//! - POST /nodes/{node_id}/adopt_members
//! - POST /nodes/{node_id}/classify
//! - GET /nodes/{node_id}/n_sorted
//! - GET /nodes/{node_id}/recommended_children
//! - GET /nodes/{node_id}/recommended_objects
//! - GET /health
//! - GET /metrics
//!
//! Arrangement and tree writes run on the blocking pool so a long fit never
//! stalls the executor.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::compressor::PageCompressor;
use crate::cache::key::to_params;
use crate::cache::metrics::CacheMetrics;
use crate::cache::pager::{Page, PageCache, PageLinks, PageRequest};
use crate::cache::store::{ListStore, MemoryListStore, StoreStats};
use crate::config::Config;
use crate::engine::arrange::{ArrangeMode, Arranger};
use crate::engine::member::NodeId;
use crate::error::ExploreError;
use crate::explore::classify::{classify_members, ClassifyOutcome, ClassifyRequest};
use crate::explore::edit::{self, AdoptOutcome, AdoptRequest, MemberRef};
use crate::explore::members::{self, MembersQuery};
use crate::explore::records::{MemberRecord, NodeView};
use crate::explore::recommend::{self, RecommendQuery};
use crate::server::error::ApiError;
use crate::server::params::{self, RawQuery};
use crate::tree::memory::{MemoryTree, SharedTree};
use crate::tree::{NodeUpdate, Tree};

/// Application state shared across handlers.
pub struct AppState {
    pub tree: SharedTree,
    pub cache: PageCache<dyn ListStore>,
    pub arranger: Arranger,
    pub config: Arc<Config>,
    pub start_time: Instant,
}

impl AppState {
    /// State backed by the in-process list store.
    pub fn new(tree: SharedTree, config: Arc<Config>) -> Result<Self, prometheus::Error> {
        let store = Arc::new(MemoryListStore::from_config(&config));
        Self::with_store(tree, config, store)
    }

    /// State backed by any list store.
    pub fn with_store(
        tree: SharedTree,
        config: Arc<Config>,
        store: Arc<dyn ListStore>,
    ) -> Result<Self, prometheus::Error> {
        let cache = PageCache::new(store, PageCompressor::new(&config.cache), CacheMetrics::new()?);
        Ok(Self {
            tree,
            cache,
            arranger: Arranger::new(&config.arrange, &config.classify),
            config,
            start_time: Instant::now(),
        })
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/nodes/{node_id}", get(get_node).patch(patch_node))
        .route("/nodes/{node_id}/members", get(node_members).post(post_members))
        .route("/nodes/{node_id}/adopt_members", post(adopt_members))
        .route("/nodes/{node_id}/classify", post(classify))
        .route("/nodes/{node_id}/n_sorted", get(n_sorted))
        .route("/nodes/{node_id}/recommended_children", get(recommended_children))
        .route("/nodes/{node_id}/recommended_objects", get(recommended_objects))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Response Types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStatsResponse,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    #[serde(flatten)]
    pub store: Option<StoreStats>,
    pub hits: u64,
    pub misses: u64,
    pub store_errors: u64,
}

// ─── Tree Access ───────────────────────────────────────────────────────────

/// Run `f` against a read view of the tree on the blocking pool.
async fn with_tree<T, F>(tree: SharedTree, f: F) -> Result<T, ExploreError>
where
    T: Send + 'static,
    F: FnOnce(&MemoryTree) -> Result<T, ExploreError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&tree.blocking_read())).await?
}

/// Run `f` as one tree transaction on the blocking pool.
async fn with_tree_mut<T, F>(tree: SharedTree, f: F) -> Result<T, ExploreError>
where
    T: Send + 'static,
    F: FnOnce(&mut MemoryTree) -> Result<T, ExploreError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || tree.blocking_write().transaction(f)).await?
}

// ─── Paged Responses ───────────────────────────────────────────────────────

const MEMBERS_PARAMS: [&str; 6] = ["nodes", "objects", "arrange_by", "page", "request_id", "starred_first"];
const RECOMMEND_PARAMS: [&str; 3] = ["page", "max_n", "request_id"];
const CLASSIFY_PARAMS: [&str; 4] = ["nodes", "objects", "safe", "subnode"];

/// Serve one page of `operation` for `key`, computing the result on a miss.
async fn serve_page<K, F, Fut>(
    state: &AppState,
    uri: &Uri,
    raw: &RawQuery,
    operation: &str,
    key: &K,
    page_size: usize,
    compute: F,
) -> Result<Response, ApiError>
where
    K: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<MemberRecord>, ExploreError>>,
{
    let page = params::page(raw)?;
    let session = params::session(raw);
    let key_params = to_params(key).map_err(ExploreError::from)?;

    let request = PageRequest {
        operation,
        params: &key_params,
        session: &session,
        page,
        page_size,
    };
    let result = state.cache.paginate_and_cache(&request, compute).await?;

    Ok(page_response(uri.path(), raw, &session, result))
}

fn page_response(path: &str, raw: &RawQuery, session: &str, page: Page) -> Response {
    let links = PageLinks::new(path, &params::link_query(raw), session, page.page, page.n_pages);
    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::LINK, links.to_header()),
        ],
        page.body,
    )
        .into_response()
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn get_node(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<NodeId>,
) -> Result<Json<NodeView>, ApiError> {
    let tree = state.tree.read().await;
    let node = tree.get_node(node_id)?;
    Ok(Json(NodeView::load(&*tree, &node)?))
}

async fn patch_node(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<NodeId>,
    Json(body): Json<Value>,
) -> Result<Json<NodeView>, ApiError> {
    let update: NodeUpdate = params::body(body)?;
    let view = with_tree_mut(state.tree.clone(), move |t| {
        let node = edit::update_node(t, node_id, &update)?;
        Ok(NodeView::load(&*t, &node)?)
    })
    .await?;
    Ok(Json(view))
}

async fn node_members(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<NodeId>,
    uri: Uri,
    Query(raw): Query<RawQuery>,
) -> Result<Response, ApiError> {
    params::reject_unknown(&raw, &MEMBERS_PARAMS)?;
    let query = MembersQuery {
        node_id,
        nodes: params::flag(&raw, "nodes", false)?,
        objects: params::flag(&raw, "objects", false)?,
        arrange_by: ArrangeMode::from(raw.get("arrange_by").cloned().unwrap_or_default()),
        starred_first: params::flag(&raw, "starred_first", true)?,
    };

    let (tree, arranger, owned) = (state.tree.clone(), state.arranger.clone(), query.clone());
    serve_page(
        &state,
        &uri,
        &raw,
        members::OPERATION,
        &query,
        state.config.cache.page_size,
        move || with_tree(tree, move |t| members::node_members(t, &arranger, &owned)),
    )
    .await
}

async fn post_members(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<NodeId>,
    Json(body): Json<Value>,
) -> Result<Json<AdoptOutcome>, ApiError> {
    let members: Vec<MemberRef> = params::body(body)?;
    adopt(&state, node_id, members).await
}

async fn adopt_members(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<NodeId>,
    Json(body): Json<Value>,
) -> Result<Json<AdoptOutcome>, ApiError> {
    let request: AdoptRequest = params::body(body)?;
    adopt(&state, node_id, request.members).await
}

async fn adopt(state: &AppState, node_id: NodeId, members: Vec<MemberRef>) -> Result<Json<AdoptOutcome>, ApiError> {
    let outcome = with_tree_mut(state.tree.clone(), move |t| edit::adopt_members(t, node_id, &members)).await?;
    Ok(Json(outcome))
}

async fn n_sorted(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<NodeId>,
) -> Result<Json<usize>, ApiError> {
    let tree = state.tree.read().await;
    Ok(Json(edit::n_sorted(&*tree, node_id)?))
}

fn recommend_query(state: &AppState, node_id: NodeId, raw: &RawQuery) -> Result<RecommendQuery, ApiError> {
    params::reject_unknown(raw, &RECOMMEND_PARAMS)?;
    Ok(RecommendQuery::new(
        node_id,
        params::number(raw, "max_n")?,
        state.config.recommend.default_max_n,
        state.config.recommend.max_n_limit,
    ))
}

async fn recommended_children(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<NodeId>,
    uri: Uri,
    Query(raw): Query<RawQuery>,
) -> Result<Response, ApiError> {
    let query = recommend_query(&state, node_id, &raw)?;

    let (tree, owned) = (state.tree.clone(), query.clone());
    serve_page(
        &state,
        &uri,
        &raw,
        recommend::CHILDREN_OPERATION,
        &query,
        state.config.cache.recommendation_page_size,
        move || with_tree(tree, move |t| recommend::recommended_children(t, &owned)),
    )
    .await
}

async fn recommended_objects(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<NodeId>,
    uri: Uri,
    Query(raw): Query<RawQuery>,
) -> Result<Response, ApiError> {
    let query = recommend_query(&state, node_id, &raw)?;

    let (tree, owned) = (state.tree.clone(), query.clone());
    serve_page(
        &state,
        &uri,
        &raw,
        recommend::OBJECTS_OPERATION,
        &query,
        state.config.cache.recommendation_page_size,
        move || with_tree(tree, move |t| recommend::recommended_objects(t, &owned)),
    )
    .await
}

async fn classify(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<NodeId>,
    Query(raw): Query<RawQuery>,
) -> Result<Json<ClassifyOutcome>, ApiError> {
    params::reject_unknown(&raw, &CLASSIFY_PARAMS)?;
    let request = ClassifyRequest {
        nodes: params::flag(&raw, "nodes", false)?,
        objects: params::flag(&raw, "objects", false)?,
        safe: params::flag(&raw, "safe", false)?,
        subnode: params::flag(&raw, "subnode", false)?,
    };

    let config = state.config.clone();
    let outcome = with_tree_mut(state.tree.clone(), move |t| {
        classify_members(t, node_id, &request, &config.classify)
    })
    .await?;

    info!(
        node_id,
        n_predicted_children = outcome.n_predicted_children,
        n_predicted_objects = outcome.n_predicted_objects,
        "Classified members"
    );
    Ok(Json(outcome))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let metrics = state.cache.metrics();
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        cache: CacheStatsResponse {
            store: state.cache.store().stats().await,
            hits: metrics.hits.get(),
            misses: metrics.misses.get(),
            store_errors: metrics.store_errors.get(),
        },
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = state.cache.metrics().render()?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::tree::memory::{new_shared_tree, MemoryTree};

    fn app() -> Router {
        let mut tree = MemoryTree::new();
        let root = tree.add_project("p");
        let child = tree.add_node(root, Some("c"), false).unwrap();
        tree.add_object(child, "x", vec![1.0, 2.0]).unwrap();
        let state = AppState::new(new_shared_tree(tree), Arc::new(Config::default())).unwrap();
        build_router(Arc::new(state))
    }

    async fn call(app: Router, method: &str, uri: &str) -> Response {
        app.oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn call_json(app: Router, method: &str, uri: &str, body: serde_json::Value) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.oneshot(request).await.unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_members_page_with_links() {
        let response = call(app(), "GET", "/nodes/1/members?nodes=1&request_id=s1").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(
            response.headers()[header::LINK],
            "</nodes/1/members?nodes=1&request_id=s1&page=0>; rel=\"last\""
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let records: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(records[0]["text"], "c (0)");
    }

    #[tokio::test]
    async fn test_bad_page_is_400() {
        let response = call(app(), "GET", "/nodes/1/members?page=null").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_parameter_is_400() {
        let response = call(app(), "GET", "/nodes/1/recommended_children?bogus=1").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_node_is_404() {
        assert_eq!(call(app(), "GET", "/nodes/42").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            call(app(), "POST", "/nodes/42/classify?nodes=1").await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        let response = call(app(), "GET", "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("page_cache_hits_total"));
    }

    #[tokio::test]
    async fn test_patch_node_sets_flags() {
        let app = app();
        let response = call_json(app.clone(), "PATCH", "/nodes/2", serde_json::json!({ "starred": true })).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["starred"], true);

        let view = json(call(app.clone(), "GET", "/nodes/2").await).await;
        assert_eq!(view["starred"], true);
        assert_eq!(json(call(app, "GET", "/nodes/1/n_sorted").await).await, 1);
    }

    #[tokio::test]
    async fn test_patch_node_rejects_parent_change() {
        let response = call_json(app(), "PATCH", "/nodes/2", serde_json::json!({ "parent_id": 1 })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_adopt_members_and_member_list_body() {
        let app = app();
        let response = call_json(
            app.clone(),
            "POST",
            "/nodes/1/adopt_members",
            serde_json::json!({ "members": [{ "object_id": "x" }] }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await, serde_json::json!({ "n_nodes": 0, "n_objects": 1 }));

        let listed = json(call(app.clone(), "GET", "/nodes/1/members?objects=1&request_id=a").await).await;
        assert_eq!(listed[0]["object_id"], "x");

        let response = call_json(app.clone(), "POST", "/nodes/2/members", serde_json::json!([{ "object_id": "x" }])).await;
        assert_eq!(json(response).await["n_objects"], 1);

        let missing = call_json(app, "POST", "/nodes/2/members", serde_json::json!([{ "object_id": "nope" }])).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_arrangement_does_not_stall_other_requests() {
        let mut tree = MemoryTree::new();
        let root = tree.add_project("p");
        for i in 0..400 {
            let t = i as f32 / 10.0;
            tree.add_object(root, &format!("o{i}"), vec![t.cos() * t, t.sin() * t, t]).unwrap();
        }
        let state = AppState::new(new_shared_tree(tree), Arc::new(Config::default())).unwrap();
        let app = build_router(Arc::new(state));

        // Single-threaded runtime: the health request can only finish first
        // if the members request yields while the embedding is computed.
        let members = async {
            let response = call(app.clone(), "GET", "/nodes/1/members?objects=1&arrange_by=similarity").await;
            (response.status(), Instant::now())
        };
        let health = async {
            let response = call(app.clone(), "GET", "/health").await;
            (response.status(), Instant::now())
        };
        let ((members_status, members_done), (health_status, health_done)) = tokio::join!(members, health);

        assert_eq!(members_status, StatusCode::OK);
        assert_eq!(health_status, StatusCode::OK);
        assert!(health_done < members_done);
    }
}
