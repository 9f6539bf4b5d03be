use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use ircore::persist::{save_index, IndexPaths};
use ircore::{DocId, DocMeta, IndexBuilder, IndexConfig};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use tempfile::tempdir;
use tower::ServiceExt;

const DOCS: &[(&str, &str, &str)] = &[
    ("doc0", "Doc 0", "Rust is great. rust systems programming with rust."),
    ("doc1", "Doc 1", "Learning rust and python programming."),
    ("doc2", "Doc 2", "Python notebooks for data science."),
];

fn build_tiny_index(dir: &std::path::Path) {
    let paths = IndexPaths::new(dir);
    fs::create_dir_all(paths.texts_dir()).unwrap();

    let mut builder = IndexBuilder::<DocId>::new(IndexConfig::default());
    let mut docs: HashMap<DocId, DocMeta> = HashMap::new();
    for (i, (id, title, text)) in DOCS.iter().enumerate() {
        let rel = format!("texts/{i}.txt");
        fs::write(dir.join(&rel), text).unwrap();
        builder.add_document(id.to_string(), text);
        docs.insert(id.to_string(), DocMeta { title: Some(title.to_string()), text_path: Some(rel) });
    }
    save_index(&paths, &builder.build(), &docs).unwrap();
}

fn app() -> (tempfile::TempDir, Router) {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = server::build_app(dir.path().to_string_lossy().to_string()).unwrap();
    (dir, app)
}

async fn call(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn call_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = call(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_is_ok() {
    let (_dir, app) = app();
    let (status, body) = call(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let (_dir, app) = app();
    let (status, json) = call_json(app, "/search?q=rust&k=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["doc_id"], "doc0");
    assert_eq!(arr[1]["doc_id"], "doc1");
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
    assert_eq!(arr[0]["title"], "Doc 0");
    assert!(arr[0]["snippet"].as_str().unwrap().contains("<em>Rust</em>"));
}

#[tokio::test]
async fn search_clamps_k() {
    let (_dir, app) = app();
    let (status, json) = call_json(app, "/search?q=programming&k=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn boolean_returns_sorted_ids() {
    let (_dir, app) = app();
    let (status, json) = call_json(app.clone(), "/boolean?q=python%20OR%20rust").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 3);
    assert_eq!(json["doc_ids"], serde_json::json!(["doc0", "doc1", "doc2"]));

    let (_, json) = call_json(app, "/boolean?q=python%20AND%20NOT%20rust").await;
    assert_eq!(json["doc_ids"], serde_json::json!(["doc2"]));
}

#[tokio::test]
async fn wildcard_lists_terms_with_df() {
    let (_dir, app) = app();
    let (status, json) = call_json(app, "/wildcard?pattern=pyth*").await;
    assert_eq!(status, StatusCode::OK);
    let terms = json["terms"].as_array().unwrap();
    assert_eq!(terms.len(), 1);
    assert_eq!(terms[0]["term"], "python");
    assert_eq!(terms[0]["df"], 2);
}

#[tokio::test]
async fn malformed_queries_are_bad_requests() {
    let (_dir, app) = app();
    let (status, json) = call_json(app.clone(), "/wildcard?pattern=a*b*").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().is_some());

    let (status, _) = call_json(app, "/boolean?q=rust%20AND").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn doc_endpoint_returns_text_or_404() {
    let (_dir, app) = app();
    let (status, json) = call_json(app.clone(), "/doc/doc1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "Doc 1");
    assert_eq!(json["text"], DOCS[1].2);

    let (status, _) = call_json(app, "/doc/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
