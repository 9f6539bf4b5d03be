use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ircore::persist::{load_index, IndexPaths};
use ircore::{DocId, DocMeta, QueryError, SearchIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Deserialize)]
pub struct BooleanParams {
    pub q: String,
}

#[derive(Deserialize)]
pub struct WildcardParams {
    pub pattern: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Serialize)]
pub struct BooleanResponse {
    pub query: String,
    pub total: usize,
    pub doc_ids: Vec<DocId>,
}

#[derive(Serialize)]
pub struct WildcardTerm {
    pub term: String,
    pub df: u32,
}

#[derive(Serialize)]
pub struct WildcardResponse {
    pub pattern: String,
    pub nodes_visited: usize,
    pub terms: Vec<WildcardTerm>,
}

/// Errors surfaced to HTTP clients as `{ "error": ... }`.
pub enum ApiError {
    Query(QueryError),
    NotFound(String),
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::Query(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Query(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub index_root: PathBuf,
    pub index: Arc<SearchIndex<DocId>>,
    pub docs: Arc<HashMap<DocId, DocMeta>>,
}

pub fn build_app(index_dir: String) -> Result<Router> {
    let index_paths = IndexPaths::new(&index_dir);
    let (index, docs, meta) = load_index(&index_paths)?;
    tracing::info!(num_docs = meta.num_docs, num_terms = meta.num_terms, "index loaded");
    let app_state = AppState { index_root: PathBuf::from(&index_dir), index: Arc::new(index), docs: Arc::new(docs) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/boolean", get(boolean_handler))
        .route("/wildcard", get(wildcard_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let scored = state.index.rank(&params.q)?;
    let k = params.k.clamp(1, 100);
    let total_hits = scored.len();

    // Highlight the words as typed, not their stems
    let raw_terms: Vec<String> = params
        .q
        .split_whitespace()
        .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let results = scored
        .into_iter()
        .take(k)
        .map(|(doc_id, score)| {
            let meta = state.docs.get(&doc_id);
            let snippet = meta
                .and_then(|m| m.text_path.as_ref())
                .and_then(|rel| snippet_from_file(&state.index_root.join(rel), &raw_terms));
            SearchHit { title: meta.and_then(|m| m.title.clone()), doc_id, score, snippet }
        })
        .collect();

    Ok(Json(SearchResponse { query: params.q, took_s: start.elapsed().as_secs_f64(), total_hits, results }))
}

pub async fn boolean_handler(
    State(state): State<AppState>,
    Query(params): Query<BooleanParams>,
) -> Result<Json<BooleanResponse>, ApiError> {
    let doc_ids: Vec<DocId> = state.index.boolean(&params.q)?.into_iter().collect();
    Ok(Json(BooleanResponse { query: params.q, total: doc_ids.len(), doc_ids }))
}

pub async fn wildcard_handler(
    State(state): State<AppState>,
    Query(params): Query<WildcardParams>,
) -> Result<Json<WildcardResponse>, ApiError> {
    let expansion = state.index.expand_wildcard(&params.pattern)?;
    let terms = expansion
        .terms
        .into_iter()
        .map(|term| WildcardTerm { df: state.index.inverted().document_frequency(&term), term })
        .collect();
    Ok(Json(WildcardResponse { pattern: params.pattern, nodes_visited: expansion.nodes_visited, terms }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<DocId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let meta = state.docs.get(&doc_id).ok_or_else(|| ApiError::NotFound(format!("document {doc_id}")))?;
    let mut obj = serde_json::json!({
        "doc_id": doc_id,
        "title": meta.title,
    });
    if let Some(rel) = &meta.text_path {
        if let Ok(text) = std::fs::read_to_string(state.index_root.join(rel)) {
            obj["text"] = serde_json::Value::String(text);
        }
    }
    Ok(Json(obj))
}

fn snippet_from_file(path: &FsPath, raw_terms: &[String]) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    if text.is_empty() { return None; }
    // find first match (case-insensitive) of any raw term
    let first_idx = raw_terms.iter().find_map(|term| find_case_insensitive(&text, term));
    let snippet = match first_idx {
        Some(idx) => {
            let start = floor_char_boundary(&text, idx.saturating_sub(100));
            let end = floor_char_boundary(&text, (idx + 200).min(text.len()));
            text[start..end].to_string()
        }
        None => text.chars().take(200).collect(),
    };
    Some(highlight_terms(&snippet, raw_terms))
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Byte offset of `needle` in `haystack`, ignoring ASCII case so offsets stay
/// valid in the original text.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.to_ascii_lowercase();
    let n = needle.to_ascii_lowercase();
    h.find(&n)
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        let built = regex::RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build();
        if let Ok(pat) = built {
            s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
        }
    }
    s
}
