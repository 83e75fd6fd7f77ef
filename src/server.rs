//! Dataset HTTP API.
//!
//! Serves the knowledge-base store and the scrape pipeline over JSON.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/v1/datasets` | Create a dataset (`{name?, description?}`) |
//! | `GET`  | `/api/v1/datasets` | List datasets (`?name=&id=&page_size=`) |
//! | `GET`  | `/api/v1/datasets/{id}` | Dataset summary |
//! | `POST` | `/api/v1/datasets/{id}/documents` | Upload a document (multipart) |
//! | `POST` | `/api/v1/datasets/{id}/documents/text` | Same as above |
//! | `GET`  | `/api/v1/datasets/{id}/documents` | List a dataset's documents |
//! | `POST` | `/api/v1/datasets/{id}/chunks` | Chunk documents (`{document_ids}`) |
//! | `POST` | `/api/v1/retrieval` | Keyword retrieval (`{dataset_ids, question}`) |
//! | `POST` | `/api/v1/scrape` | Fetch and extract a URL (`{url, kb_id}`) |
//! | `GET`  | `/health`, `/healthz` | Health check |
//!
//! # Response conventions
//!
//! Dataset endpoints answer `{"code": 0, "data": ...}`; a missing dataset is
//! a 404 with `{"err": 1, "msg": "..."}`. Scrape always answers 200 with
//! `{"err": 0, "msg": "success", "data": {"title", "markdown"}}`, encoding
//! failures in the document itself. Malformed JSON bodies are treated as
//! empty requests.
//!
//! Unknown routes acknowledge mutating verbs with a generic success body
//! and answer reads with 404, so callers probing undocumented paths keep
//! working.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::fetch::{self, Fetcher, HttpFetcher};
use crate::store::{DatasetFilter, KnowledgeBaseStore, NewDataset, StoreError};

/// Largest accepted request body (uploads included).
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<KnowledgeBaseStore>,
    pub fetcher: Arc<dyn Fetcher>,
    /// `page_size` used when a list request does not give one.
    pub default_page_size: usize,
}

impl AppState {
    pub fn new(store: Arc<KnowledgeBaseStore>, fetcher: Arc<dyn Fetcher>, config: &Config) -> Self {
        Self {
            store,
            fetcher,
            default_page_size: config.datasets.default_page_size,
        }
    }
}

/// Starts the HTTP server on `[server].bind` over the snapshot at
/// `[store].path`. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = Arc::new(KnowledgeBaseStore::open(&config.store.path));
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::from_config(&config.fetch)?);
    let app = router(AppState::new(store, fetcher, config));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "dataset API listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the full router. Exposed so tests can drive it in-process.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/datasets", post(create_dataset).get(list_datasets))
        .route("/api/v1/datasets/{id}", get(get_dataset))
        .route(
            "/api/v1/datasets/{id}/documents",
            post(upload_document).get(list_documents),
        )
        .route("/api/v1/datasets/{id}/documents/text", post(upload_document))
        .route("/api/v1/datasets/{id}/chunks", post(parse_chunks))
        .route("/api/v1/retrieval", post(retrieval))
        .route("/api/v1/scrape", post(scrape))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .fallback(fallback)
        .method_not_allowed_fallback(fallback)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "err": 1, "msg": self.message }))).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError {
            status: StatusCode::NOT_FOUND,
            message: e.to_string(),
        }
    }
}

/// `{"code": 0, "data": ...}` envelope.
#[derive(Serialize)]
struct Envelope<T> {
    code: i32,
    data: T,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { code: 0, data })
}

/// Parses a JSON body, falling back to the default value when the body is
/// empty or malformed.
fn lenient_json<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    if body.is_empty() {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "ignoring malformed JSON body");
        T::default()
    })
}

// ============ Datasets ============

async fn create_dataset(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let params: NewDataset = lenient_json(&body);
    ok(state.store.create_dataset(params).summary())
}

async fn list_datasets(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let filter = DatasetFilter {
        name: params.get("name").cloned(),
        id: params.get("id").cloned(),
    };
    let page_size = params
        .get("page_size")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(state.default_page_size);
    ok(state.store.list_datasets(&filter, page_size))
}

async fn get_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.store.get_dataset(&id)?.summary()))
}

// ============ Documents ============

async fn upload_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let document = state.store.create_document(&id, &body, content_type)?;
    Ok(ok(vec![document]))
}

async fn list_documents(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.store.list_documents(&id)?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChunkRequest {
    document_ids: Vec<String>,
}

async fn parse_chunks(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let req: ChunkRequest = lenient_json(&body);
    state.store.append_chunks(&id, &req.document_ids)?;
    Ok(Json(json!({ "code": 0 })))
}

// ============ Retrieval ============

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RetrievalRequest {
    dataset_ids: Vec<String>,
    question: String,
}

async fn retrieval(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let req: RetrievalRequest = lenient_json(&body);
    ok(state.store.retrieve(&req.dataset_ids, &req.question))
}

// ============ Scrape ============

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScrapeRequest {
    url: String,
    kb_id: String,
}

async fn scrape(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let req: ScrapeRequest = lenient_json(&body);
    tracing::info!(url = %req.url, kb_id = %req.kb_id, "scrape requested");
    let document = fetch::scrape(state.fetcher.as_ref(), &req.url).await;
    Json(json!({ "err": 0, "msg": "success", "data": document }))
}

// ============ Health / fallback ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

async fn fallback(method: Method) -> Response {
    let message = match method {
        Method::POST => "Operation completed",
        Method::PUT => "Update completed",
        Method::DELETE => "Delete completed",
        Method::OPTIONS => return StatusCode::OK.into_response(),
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    Json(json!({ "success": true, "message": message })).into_response()
}
