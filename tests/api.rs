use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tempfile::TempDir;

use ragbot::chatbot::{Chatbot, ChatbotOptions};
use ragbot::extract::Extractor;
use ragbot::index::IndexStore;
use ragbot::media::{FfmpegSampler, MediaBackends, OllamaCaptioner, TesseractOcr};
use ragbot::server::{build_router, AppState};
use ragbot::testing::{EchoGenerator, HashEmbedder, StaticSearcher};
use ragbot::uploads::{UploadRegistry, Uploads};
use ragbot::{db, migrate};
use ragbot_core::cache::MemoryCache;
use ragbot_core::models::{SourceKind, TextUnit, WebSnippet};
use ragbot_core::store::memory::InMemoryStore;

struct TestServer {
    base: String,
    generator: Arc<EchoGenerator>,
    _tmp: TempDir,
}

async fn start_server() -> TestServer {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect_path(&tmp.path().join("ragbot.sqlite"))
        .await
        .unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    let index = IndexStore::new(
        Arc::new(HashEmbedder::default()),
        Arc::new(InMemoryStore::new()),
        16,
    );
    index
        .index(&[
            TextUnit::new(
                "Humanitarian aid report covering relief operations",
                SourceKind::Pdf,
                "sample.pdf",
            ),
            TextUnit::new(
                "Student grades: Ada math A Alan science B",
                SourceKind::Csv,
                "sample.csv",
            ),
        ])
        .await
        .unwrap();

    // Media tools are pointed at missing binaries; uploads here are documents.
    let media = MediaBackends {
        ocr: Box::new(TesseractOcr::new("ragbot-test-missing-tesseract")),
        captioner: Box::new(
            OllamaCaptioner::new("http://127.0.0.1:9/api/generate", "llava", Duration::from_secs(1))
                .unwrap(),
        ),
        sampler: Box::new(FfmpegSampler::new("ragbot-test-missing-ffmpeg")),
        frame_interval_secs: 5,
    };
    let extractor = Extractor::new(Arc::new(media));

    let generator = Arc::new(EchoGenerator::default());
    let chatbot = Chatbot::new(
        index.clone(),
        Arc::new(MemoryCache::new()),
        generator.clone(),
        Arc::new(StaticSearcher::new(vec![WebSnippet {
            title: "Relief".to_string(),
            snippet: "aid figures".to_string(),
            link: "https://example.org/relief".to_string(),
        }])),
        ChatbotOptions::default(),
    );
    let uploads = Uploads::new(
        tmp.path().join("uploads"),
        UploadRegistry::new(pool),
        extractor,
        index,
    );

    let state = AppState::new(
        Arc::new(chatbot),
        Arc::new(uploads),
        vec!["sample.pdf".to_string(), "sample.csv".to_string()],
        1024 * 1024,
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        generator,
        _tmp: tmp,
    }
}

async fn post_query(server: &TestServer, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/query", server.base))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn upload(server: &TestServer, name: &str, bytes: &[u8]) -> (u16, Value) {
    let form = Form::new().part("file", Part::bytes(bytes.to_vec()).file_name(name.to_string()));
    let resp = reqwest::Client::new()
        .post(format!("{}/upload", server.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_ok() {
    let server = start_server().await;
    let body: Value = reqwest::get(format!("{}/health", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn files_lists_all_files_first() {
    let server = start_server().await;
    let body: Value = reqwest::get(format!("{}/files", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        body["files"],
        serde_json::json!(["all_files", "sample.pdf", "sample.csv"])
    );
}

#[tokio::test]
async fn empty_query_is_bad_request() {
    let server = start_server().await;
    let (status, body) = post_query(&server, serde_json::json!({ "query_text": "  " })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn unknown_file_scope_is_not_found() {
    let server = start_server().await;
    let (status, body) = post_query(
        &server,
        serde_json::json!({
            "query_text": "Tell me about my resume",
            "file_to_query": "resume.docx"
        }),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(server.generator.calls(), 0);
}

#[tokio::test]
async fn overview_query_and_cache_hit() {
    let server = start_server().await;
    let body = serde_json::json!({ "query_text": "What's in the files?" });

    let (status, first) = post_query(&server, body.clone()).await;
    assert_eq!(status, 200);
    let response = first["response"].as_str().unwrap();
    assert!(response.contains("Summarize the content from all file types:"));
    assert!(response.contains("pdf: Humanitarian"));
    assert!(response.contains("csv: Student grades"));

    let (_, second) = post_query(&server, body).await;
    assert_eq!(first, second);
    assert_eq!(server.generator.calls(), 1);
}

#[tokio::test]
async fn web_search_adds_web_source() {
    let server = start_server().await;
    let (status, body) = post_query(
        &server,
        serde_json::json!({
            "query_text": "What's the humanitarian data about?",
            "file_to_query": "pdf",
            "use_web_search": true
        }),
    )
    .await;
    assert_eq!(status, 200);
    let response = body["response"].as_str().unwrap();
    assert!(response.contains("From pdf, web: Summarize pdf content:"));
    assert!(response.contains("Web Results: Web: Relief - aid figures"));
}

#[tokio::test]
async fn uploaded_file_is_listed_and_queryable_alone() {
    let server = start_server().await;

    let (status, body) = upload(&server, "marks.csv", b"student,grade\nGrace,A\nLinus,C\n").await;
    assert_eq!(status, 200, "{}", body);
    assert!(body["message"].as_str().unwrap().contains("marks.csv"));

    let files: Value = reqwest::get(format!("{}/files", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(*files["files"].as_array().unwrap().last().unwrap(), "marks.csv");

    let (status, body) = post_query(
        &server,
        serde_json::json!({ "query_text": "Who got an A?", "file_to_query": "marks.csv" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(
        body["response"],
        "summary of: From csv: Summarize marks.csv content: Grace A Linus C"
    );
}

#[tokio::test]
async fn upload_rejects_unsupported_and_missing_files() {
    let server = start_server().await;

    let (status, body) = upload(&server, "notes.txt", b"hello").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "unsupported_type");

    let form = Form::new().text("comment", "no file here");
    let resp = reqwest::Client::new()
        .post(format!("{}/upload", server.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn corrupt_upload_is_server_error() {
    let server = start_server().await;
    let (status, body) = upload(&server, "broken.docx", b"definitely not a zip").await;
    assert_eq!(status, 500);
    assert_eq!(body["error"]["code"], "internal");
}
