use crate::{create_router, AppState};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use lectern_common::{
    config::AppConfig,
    context::Generators,
    store::{HashingEmbedder, LocalVectorStore, VectorStore},
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "lectern-test-boundary";

struct TestApp {
    router: Router,
    store: Arc<dyn VectorStore>,
    config: Arc<AppConfig>,
    _dir: tempfile::TempDir,
}

fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.storage.data_dir = dir.path().join("data");
    config.storage.store_dir = dir.path().join("store");
    let config = Arc::new(config);

    let store: Arc<dyn VectorStore> =
        Arc::new(LocalVectorStore::in_memory(Arc::new(HashingEmbedder::new(256))));
    let state = AppState::new(config.clone(), store.clone(), Generators::offline()).unwrap();

    TestApp {
        router: create_router(state),
        store,
        config,
        _dir: dir,
    }
}

fn pdf_bytes(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("TL", vec![14.into()]),
        Operation::new("Td", vec![72.into(), 720.into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn handbook_pdf() -> Vec<u8> {
    pdf_bytes(&[
        "The annual tuition fee for the physics programme is 1200 dollars per semester.",
        "Hostel accommodation is available to all first year students on request.",
    ])
}

fn revised_handbook_pdf() -> Vec<u8> {
    pdf_bytes(&[
        "From next year the tuition fee for the physics programme rises to 1350 dollars.",
        "Hostel rooms are allocated by lottery among first year students.",
    ])
}

fn upload_request(filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/documents/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn mapping(config: &AppConfig) -> Option<String> {
    std::fs::read_to_string(config.mapping_path()).ok()
}

fn data_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let app = test_app();
    let (status, body) = send(&app.router, empty_request("GET", "/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], lectern_common::VERSION);
    assert_eq!(body["endpoints"]["query"], "POST /api/query");
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app.router, empty_request("GET", "/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_non_pdf_upload_rejected() {
    let app = test_app();
    let (status, body) = send(&app.router, upload_request("notes.txt", b"hello")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Only PDF files are supported");
    assert!(data_files(&app.config.storage.data_dir).is_empty());
}

#[tokio::test]
async fn test_broken_pdf_rolled_back() {
    let app = test_app();
    let (status, _) = send(&app.router, upload_request("broken.pdf", b"%PDF-1.5 garbage")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(data_files(&app.config.storage.data_dir).is_empty());
    assert!(app.store.get_all_sources().await.unwrap().is_empty());
    assert_eq!(mapping(&app.config), None);
}

#[tokio::test]
async fn test_upload_then_reupload_is_already_indexed() {
    let app = test_app();
    let pdf = handbook_pdf();

    let (status, first) = send(&app.router, upload_request("handbook.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "indexed");
    assert_eq!(first["filename"], "handbook.pdf");
    let chunks = first["chunks_created"].as_u64().unwrap();
    assert!(chunks > 0);

    let (status, second) = send(&app.router, upload_request("copy.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["status"], "already_indexed");
    assert_eq!(second["chunks_created"], 0);
    assert_eq!(second["document_id"], first["document_id"]);

    let sources = app.store.get_all_sources().await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].chunk_count as u64, chunks);
    let stored = format!("{}.pdf", first["document_id"].as_str().unwrap());
    assert_eq!(data_files(&app.config.storage.data_dir), vec![stored]);
    assert!(mapping(&app.config).unwrap().contains("\"handbook.pdf\""));

    let (status, stats) = send(&app.router, empty_request("GET", "/api/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_documents"], 1);
    assert_eq!(stats["total_chunks"].as_u64(), Some(chunks));
}

#[tokio::test]
async fn test_list_documents() {
    let app = test_app();
    let (_, uploaded) = send(&app.router, upload_request("handbook.pdf", &handbook_pdf())).await;

    let (status, body) = send(&app.router, empty_request("GET", "/api/documents")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["documents"][0]["document_id"], uploaded["document_id"]);
    assert_eq!(body["documents"][0]["filename"], "handbook.pdf");
}

#[tokio::test]
async fn test_delete_unknown_document() {
    let app = test_app();
    send(&app.router, upload_request("handbook.pdf", &handbook_pdf())).await;
    let before = mapping(&app.config);

    let (status, body) = send(&app.router, empty_request("DELETE", "/api/documents/deadbeef")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Document not found");
    assert_eq!(mapping(&app.config), before);
}

#[tokio::test]
async fn test_delete_document() {
    let app = test_app();
    let (_, uploaded) = send(&app.router, upload_request("handbook.pdf", &handbook_pdf())).await;
    let id = uploaded["document_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app.router,
        empty_request("DELETE", &format!("/api/documents/{id}")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Document deleted successfully");
    assert_eq!(body["document_id"], id.as_str());
    assert!(app.store.get_all_sources().await.unwrap().is_empty());
    assert!(data_files(&app.config.storage.data_dir).is_empty());
    assert_eq!(mapping(&app.config).as_deref().map(str::trim), Some("{}"));
}

#[tokio::test]
async fn test_same_filename_documents_keep_separate_files() {
    let app = test_app();
    let (_, first) = send(&app.router, upload_request("handbook.pdf", &handbook_pdf())).await;
    let (status, second) =
        send(&app.router, upload_request("handbook.pdf", &revised_handbook_pdf())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["status"], "indexed");
    assert_ne!(first["document_id"], second["document_id"]);
    assert_eq!(data_files(&app.config.storage.data_dir).len(), 2);

    let first_id = first["document_id"].as_str().unwrap();
    let second_id = second["document_id"].as_str().unwrap();
    let (status, _) = send(
        &app.router,
        empty_request("DELETE", &format!("/api/documents/{first_id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        data_files(&app.config.storage.data_dir),
        vec![format!("{second_id}.pdf")]
    );
    assert!(app.config.document_path(second_id).exists());

    let (_, listed) = send(&app.router, empty_request("GET", "/api/documents")).await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["documents"][0]["document_id"], second_id);
    assert_eq!(listed["documents"][0]["filename"], "handbook.pdf");
}

#[tokio::test]
async fn test_mapping_write_failure_rolls_back_upload() {
    let app = test_app();
    // A directory where the mapping file belongs makes every registry write fail
    std::fs::create_dir_all(app.config.mapping_path()).unwrap();

    let (status, _) = send(&app.router, upload_request("handbook.pdf", &handbook_pdf())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.store.get_all_sources().await.unwrap().is_empty());
    assert!(data_files(&app.config.storage.data_dir).is_empty());
}

#[tokio::test]
async fn test_query_unknown_document_is_404() {
    let app = test_app();
    send(&app.router, upload_request("handbook.pdf", &handbook_pdf())).await;

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/query",
            json!({"query": "tuition fee", "document_id": "missing"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Document not found");
}

#[tokio::test]
async fn test_query_on_empty_index_is_404() {
    let app = test_app();
    let (status, _) = send(
        &app.router,
        json_request("POST", "/api/query", json!({"query": "tuition fee"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_query_validation() {
    let app = test_app();
    for body in [
        json!({"query": "fees", "top_k": 0}),
        json!({"query": "fees", "top_k": 21}),
        json!({"query": ""}),
    ] {
        let (status, _) = send(&app.router, json_request("POST", "/api/query", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_query_answers_with_sources() {
    let app = test_app();
    let (_, uploaded) = send(&app.router, upload_request("handbook.pdf", &handbook_pdf())).await;

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/query",
            json!({
                "query": "What is the tuition fee for physics?",
                "document_id": uploaded["document_id"],
                "top_k": 3
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body["answer"].as_str().unwrap().is_empty());
    assert!(!body["reasoning"].as_str().unwrap().is_empty());
    let sources = body["sources"].as_array().unwrap();
    assert!(!sources.is_empty() && sources.len() <= 5);
    assert_eq!(sources[0]["document"], "handbook.pdf");
    assert_eq!(sources[0]["page"], 1);
    assert!(body["processing_time_ms"].is_u64());
    assert!(body["entities"].is_object());
}
