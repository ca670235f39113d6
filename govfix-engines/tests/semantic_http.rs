//! The semantic engine against a local HTTP stub speaking the generate API.

use camino::Utf8PathBuf;
use fs_err as fs;
use govfix_engines::{
    Engine, EngineAdapter, EngineError, HttpModel, ModelConfig, ModelError, SemanticEngine,
    SemanticModel,
};
use govfix_types::violation::{Category, EngineId};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve a single canned response and hand back the raw request.
async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let len = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + len {
                    break;
                }
            }
        }
        let resp = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(resp.as_bytes()).await.unwrap();
        sock.shutdown().await.ok();
        String::from_utf8_lossy(&buf).into_owned()
    });
    (format!("http://{addr}"), handle)
}

fn config(endpoint: String) -> ModelConfig {
    ModelConfig {
        endpoint: Some(endpoint),
        model: "stub-model".to_string(),
        timeout: Duration::from_secs(10),
        api_key: Some("secret".to_string()),
    }
}

fn project() -> (TempDir, Utf8PathBuf) {
    let td = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).unwrap();
    fs::write(
        root.join("openapi.yaml"),
        "openapi: 3.0.0\npaths:\n  /api/getUsers:\n    get: {}\n",
    )
    .unwrap();
    (td, root)
}

#[tokio::test]
async fn generate_posts_prompt_and_returns_response() {
    let body = serde_json::json!({"response": "  hello  ", "done": true}).to_string();
    let (url, server) = serve_once("200 OK", body).await;
    let model = HttpModel::new(&config(url)).unwrap();

    let reply = model.generate("say hello").await.unwrap();
    assert_eq!(reply, "hello");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/generate"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
    assert!(request.contains("\"stream\":false"));
    assert!(request.contains("\"model\":\"stub-model\""));
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let (url, _server) = serve_once("500 Internal Server Error", "{}".to_string()).await;
    let model = HttpModel::new(&config(url)).unwrap();
    assert_eq!(model.generate("x").await.unwrap_err(), ModelError::Status(500));
}

#[tokio::test]
async fn bad_json_is_invalid_response() {
    let (url, _server) = serve_once("200 OK", "not json".to_string()).await;
    let model = HttpModel::new(&config(url)).unwrap();
    assert!(matches!(
        model.generate("x").await.unwrap_err(),
        ModelError::InvalidResponse(_)
    ));
}

#[tokio::test]
async fn connection_refused_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let model = HttpModel::new(&config(format!("http://{addr}"))).unwrap();
    assert!(matches!(
        model.generate("x").await.unwrap_err(),
        ModelError::Unavailable(_)
    ));
}

#[tokio::test]
async fn semantic_engine_end_to_end() {
    let (_td, root) = project();
    let reply = "Findings:\n[{\"rule\": \"no-verbs-in-url\", \"message\": \"getUsers is a verb\", \"severity\": \"warning\", \"path\": \"paths./api/getUsers\"}]";
    let body = serde_json::json!({ "response": reply }).to_string();
    let (url, server) = serve_once("200 OK", body).await;

    let model: Arc<dyn SemanticModel> = Arc::new(HttpModel::new(&config(url)).unwrap());
    let engine = Engine::Semantic(SemanticEngine {
        model: Some(model),
        ..SemanticEngine::default()
    });

    let raw = engine.run(&root).await.unwrap();
    let violations = engine.normalize(&root, &raw).unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].engine, EngineId::Semantic);
    assert_eq!(violations[0].category, Category::ResourceNaming);
    assert_eq!(violations[0].file, "openapi.yaml");

    let request = server.await.unwrap();
    assert!(request.contains("/api/getUsers"));
}

#[tokio::test]
async fn semantic_engine_times_out() {
    let (_td, root) = project();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept and never answer.
    let _hold = tokio::spawn(async move {
        let (_sock, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let model: Arc<dyn SemanticModel> =
        Arc::new(HttpModel::new(&config(format!("http://{addr}"))).unwrap());
    let engine = Engine::Semantic(SemanticEngine {
        model: Some(model),
        spec: None,
        timeout: Duration::from_millis(300),
    });
    let err = engine.run(&root).await.unwrap_err();
    assert!(matches!(err, EngineError::Timeout { engine: EngineId::Semantic, .. }));
}
