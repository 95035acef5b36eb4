//! Mock HTTP tests for RestTransport.
//!
//! These tests cover:
//! - Image generation requests and response scanning
//! - Video job submission and status polling endpoints
//! - Media downloads by file id and direct URI
//! - Error mapping for non-success responses

use animated_image::genai::{
    resolve, ConditioningImage, GenAiError, GenerationRequest, MediaReference, MediaTransport,
    OutputConfig, RestTransport,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG_HEADER: [u8; 4] = [0x89, 0x50, 0x4e, 0x47];

fn transport(server: &MockServer) -> RestTransport {
    RestTransport::with_base_url("test-key".to_string(), server.uri()).unwrap()
}

fn video_request() -> GenerationRequest {
    GenerationRequest::new(
        "roll the ball",
        Some(ConditioningImage {
            bytes: PNG_HEADER.to_vec(),
            mime_type: "image/png".to_string(),
        }),
        "veo-3.1-generate-preview",
        OutputConfig::default(),
    )
}

// === Image Generation ===

#[tokio::test]
async fn test_generate_image_returns_first_inline_image() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash-image:generateContent"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "a wooden ball"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                {"content": {"parts": [{"text": "Here is your image"}]}},
                {"content": {"parts": [
                    {"text": "again"},
                    {"inlineData": {"mimeType": "image/png", "data": "iVBORw=="}}
                ]}}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let image = transport(&mock_server)
        .generate_image("a wooden ball", "gemini-2.5-flash-image")
        .await
        .unwrap();

    assert_eq!(image.bytes, PNG_HEADER.to_vec());
    assert_eq!(image.mime_type, "image/png");
}

#[tokio::test]
async fn test_generate_image_without_image_part_is_empty_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash-image:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "I cannot draw that"}]}}]
        })))
        .mount(&mock_server)
        .await;

    let result = transport(&mock_server)
        .generate_image("a wooden ball", "gemini-2.5-flash-image")
        .await;

    assert!(matches!(result, Err(GenAiError::EmptyResult(_))));
}

#[tokio::test]
async fn test_generate_image_error_status_keeps_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash-image:generateContent"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&mock_server)
        .await;

    let result = transport(&mock_server)
        .generate_image("a wooden ball", "gemini-2.5-flash-image")
        .await;

    match result {
        Err(GenAiError::Transport { status, body }) => {
            assert_eq!(status, 403);
            assert_eq!(body, "API key not valid");
        }
        other => panic!("expected Transport error, got {:?}", other),
    }
}

// === Video Submission ===

#[tokio::test]
async fn test_submit_video_job_sends_image_and_config() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/veo-3.1-generate-preview:generateVideo"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "videoConfig": {"durationSeconds": 8, "resolution": "720p", "aspectRatio": "16:9"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "operations/op-1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let operation = transport(&mock_server)
        .submit_video_job(&video_request())
        .await
        .unwrap();

    assert_eq!(operation.name, "operations/op-1");
    assert!(!operation.done);

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body["contents"][0]["parts"][1]["inlineData"],
        json!({"mimeType": "image/png", "data": "iVBORw=="})
    );
}

#[tokio::test]
async fn test_submit_video_job_without_name_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/veo-3.1-generate-preview:generateVideo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": false})))
        .mount(&mock_server)
        .await;

    let result = transport(&mock_server).submit_video_job(&video_request()).await;

    assert!(matches!(result, Err(GenAiError::MalformedResponse(_))));
}

#[tokio::test]
async fn test_submit_video_job_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/veo-3.1-generate-preview:generateVideo"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&mock_server)
        .await;

    let error = transport(&mock_server)
        .submit_video_job(&video_request())
        .await
        .unwrap_err();

    assert_eq!(error.to_string(), "Request failed with status 429: quota exceeded");
}

// === Status Polling ===

#[tokio::test]
async fn test_fetch_status_bare_name_uses_operations_path() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/operations/op-1"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "op-1",
            "done": true,
            "response": {"generatedVideos": [{"video": {"uri": "https://cdn.example/v.mp4"}}]}
        })))
        .mount(&mock_server)
        .await;

    let operation = transport(&mock_server).fetch_status("op-1").await.unwrap();

    assert!(operation.done);
    assert!(operation.response.is_some());
}

#[tokio::test]
async fn test_fetch_status_qualified_name_used_as_path() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models/veo-3.1-generate-preview/operations/xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": false})))
        .mount(&mock_server)
        .await;

    let operation = transport(&mock_server)
        .fetch_status("models/veo-3.1-generate-preview/operations/xyz")
        .await
        .unwrap();

    assert_eq!(operation.name, "models/veo-3.1-generate-preview/operations/xyz");
    assert!(!operation.done);
}

#[tokio::test]
async fn test_fetch_status_not_json_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&mock_server)
        .await;

    let result = transport(&mock_server).fetch_status("op-1").await;

    assert!(matches!(result, Err(GenAiError::MalformedResponse(_))));
}

#[tokio::test]
async fn test_fetch_status_server_error_keeps_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/operations/op-1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend unavailable"))
        .mount(&mock_server)
        .await;

    let result = transport(&mock_server).fetch_status("op-1").await;

    match result {
        Err(GenAiError::Transport { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "backend unavailable");
        }
        other => panic!("expected Transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_status_generated_samples_resolve_to_uri() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models/veo/operations/op-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "models/veo/operations/op-9",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [{"video": {"uri": "https://cdn/v.mp4"}}]
                }
            }
        })))
        .mount(&mock_server)
        .await;

    let operation = transport(&mock_server)
        .fetch_status("models/veo/operations/op-9")
        .await
        .unwrap();

    assert_eq!(
        resolve(&operation).unwrap(),
        MediaReference::DirectUri("https://cdn/v.mp4".to_string())
    );
}

// === Downloads ===

#[tokio::test]
async fn test_fetch_bytes_file_id_uses_media_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files/abc"))
        .and(query_param("alt", "media"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let bytes = transport(&mock_server)
        .fetch_bytes(&MediaReference::FileId("files/abc".to_string()))
        .await
        .unwrap();

    assert_eq!(bytes, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_fetch_bytes_direct_uri_sends_no_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/media/v.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 16]))
        .mount(&mock_server)
        .await;

    let uri = format!("{}/media/v.mp4", mock_server.uri());
    let bytes = transport(&mock_server)
        .fetch_bytes(&MediaReference::DirectUri(uri))
        .await
        .unwrap();

    assert_eq!(bytes.len(), 16);
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].url.query().is_none());
}

#[tokio::test]
async fn test_fetch_bytes_missing_file_is_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&mock_server)
        .await;

    let result = transport(&mock_server)
        .fetch_bytes(&MediaReference::FileId("gone".to_string()))
        .await;

    assert!(matches!(result, Err(GenAiError::Transport { status: 404, .. })));
}
