//! HttpGateway against a one-shot local HTTP responder
//!
//! The responder accepts a single connection, records the raw request, and
//! answers with a canned status and body.

use audit_gateway::{
    BackendGateway, ContextFlags, GatewayConfig, GatewayError, HttpGateway, UploadFile,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (format!("http://{addr}"), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn gateway(base: &str) -> HttpGateway {
    let config = GatewayConfig::new(base)
        .unwrap()
        .with_timeout(Duration::from_secs(5));
    HttpGateway::new(config).unwrap()
}

#[tokio::test]
async fn analyze_query_posts_flags_and_decodes_reply() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"can_proceed": false, "agent_request": {"type": "need_kb"}, "reasoning": "no knowledge base loaded"}"#,
    )
    .await;

    let analysis = gateway(&base)
        .analyze_query("What is our policy on X?", ContextFlags::none().with_evidence(true))
        .await
        .unwrap();

    assert!(analysis.requires_clarification());
    assert_eq!(analysis.reasoning.as_deref(), Some("no knowledge base loaded"));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /analyze-query HTTP/1.1"));
    assert!(request.contains(r#""user_input":"What is our policy on X?""#));
    assert!(request.contains(r#""evidence_loaded":true"#));
}

#[tokio::test]
async fn upload_script_sends_multipart_file() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"session_id": "abc", "controls_found": 1, "evidence_checklist": [{"control_id": "AC-1"}], "warnings": ["AC-1: Evidence requirement is vague"]}"#,
    )
    .await;

    let file = UploadFile::new("script.xlsx", b"PK..".to_vec());
    let analysis = gateway(&base).upload_script(&file).await.unwrap();

    assert_eq!(analysis.session_id, "abc");
    assert_eq!(analysis.warnings.len(), 1);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /audit/upload-script HTTP/1.1"));
    assert!(request.contains("multipart/form-data"));
    assert!(request.contains(r#"filename="script.xlsx""#));
}

#[tokio::test]
async fn upload_evidence_sends_session_and_every_file() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"files_processed": [], "evidence_summary": {"total_controls": 1, "received": 1, "pending": 0, "rejected": 0}, "pending_controls": []}"#,
    )
    .await;

    let files = vec![
        UploadFile::new("a.pdf", b"a".to_vec()),
        UploadFile::new("b.csv", b"b".to_vec()).with_content_type("text/csv"),
    ];
    let validation = gateway(&base).upload_evidence("abc", &files).await.unwrap();
    assert!(validation.evidence_summary.unwrap().reconciles());

    let request = server.await.unwrap();
    assert!(request.contains(r#"name="session_id""#));
    assert!(request.contains(r#"filename="a.pdf""#));
    assert!(request.contains(r#"filename="b.csv""#));
    assert!(request.contains("text/csv"));
}

#[tokio::test]
async fn error_status_maps_to_status_error() {
    let (base, server) = serve_once("500 Internal Server Error", r#"{"detail": "boom"}"#).await;

    let err = gateway(&base).generate_workpaper("abc").await.unwrap_err();
    match &err {
        GatewayError::Status { endpoint, status, body } => {
            assert_eq!(*endpoint, "/audit/generate-workpaper");
            assert_eq!(*status, 500);
            assert!(body.contains("boom"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_retryable());
    server.await.unwrap();
}

#[tokio::test]
async fn undecodable_body_maps_to_malformed() {
    let (base, server) = serve_once("200 OK", "<html>proxy login</html>").await;

    let err = gateway(&base)
        .analyze_query("hello", ContextFlags::none())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Malformed { .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn download_workpaper_encodes_filename_query() {
    let (base, server) = serve_once("200 OK", "binary-ish").await;

    let bytes = gateway(&base)
        .download_workpaper("Q3 workpaper.xlsx")
        .await
        .unwrap();
    assert_eq!(bytes, b"binary-ish");

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /download-report?filename=Q3+workpaper.xlsx HTTP/1.1"));
}

#[tokio::test]
async fn connection_refused_is_transport_error() {
    // Bind then drop so the port is very likely closed.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = gateway(&format!("http://{addr}")).health().await.unwrap_err();
    assert!(matches!(err, GatewayError::Transport { .. }));
    assert!(err.is_retryable());
}
