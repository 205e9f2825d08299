mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{analyze_body, deck_json, scripted_state, Failing, FixedDeck, RecordingVideo};
use raw2ready::config::Settings;
use raw2ready::server::{router, AppState};
use raw2ready::tools::llm::ModelRouter;

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, bytes) = send_raw(app, method, uri, body).await;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn send_raw(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(serde_json::to_string(&body).unwrap()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, bytes.to_vec())
}

fn context_fields() -> Value {
    json!({
        "business_name": "Pain Paris",
        "location_city": "Paris",
        "country": "France",
        "raw_idea": "organic bakery"
    })
}

fn deck_request(num_slides: u32, duration_minutes: u32) -> Value {
    let mut body = context_fields();
    body["num_slides"] = json!(num_slides);
    body["duration_minutes"] = json!(duration_minutes);
    body
}

#[tokio::test]
async fn test_health_endpoint() {
    let (status, body) = send(router(scripted_state()), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_models_endpoint() {
    let (status, body) = send(router(scripted_state()), Method::GET, "/api/models", None).await;
    assert_eq!(status, StatusCode::OK);

    let models = body["models"].as_array().unwrap();
    assert_eq!(models.len(), 2);
    assert!(models
        .iter()
        .any(|m| m["id"] == "google-gemini-flash" && m["model_id"] == "gemini-2.5-flash"));
}

#[tokio::test]
async fn test_analyze_normalizes_model_output() {
    let (status, body) = send(
        router(scripted_state()),
        Method::POST,
        "/api/analyze",
        Some(analyze_body("chatgpt-latest")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let players = body["competing_players"].as_array().unwrap();
    assert_eq!(players.len(), 2);
    assert_eq!(players[0]["url"], "https://dupainetdesidees.com");
    assert_eq!(players[0]["year_established"], "2002");
    assert_eq!(players[1]["name"], "Poilane");
    assert_eq!(body["market_cap_or_target_revenue"], "450000");
    assert_eq!(body["target_audience"], json!(["Health-conscious locals"]));
    assert!(body["disclaimer"].as_str().unwrap().contains("AI-generated"));
    assert!(body["prompt"].as_str().unwrap().contains("organic bakery"));
}

#[tokio::test]
async fn test_analyze_missing_field_is_422() {
    let mut request = analyze_body("chatgpt-latest");
    request.as_object_mut().unwrap().remove("country");

    let (status, body) = send(router(scripted_state()), Method::POST, "/api/analyze", Some(request)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("country"));
}

#[tokio::test]
async fn test_analyze_unknown_model_is_400() {
    let (status, body) = send(
        router(scripted_state()),
        Method::POST,
        "/api/analyze",
        Some(analyze_body("invalid-model")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Unknown model: invalid-model. Available:"));
}

#[tokio::test]
async fn test_analyze_without_provider_key_is_400() {
    let settings = Settings::from_lookup(|_| None).unwrap();
    let state = AppState::new(Arc::new(ModelRouter::from_settings(&settings)), "chatgpt-latest");

    let (status, body) = send(router(state), Method::POST, "/api/analyze", Some(analyze_body("google-gemini-flash"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("Google API key"));
}

#[tokio::test]
async fn test_analyze_model_failure_is_500() {
    let state = AppState::new(
        Arc::new(ModelRouter::fixed(Arc::new(Failing("quota exceeded")))),
        "chatgpt-latest",
    );

    let (status, body) = send(router(state), Method::POST, "/api/analyze", Some(analyze_body("chatgpt-latest"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Model query failed"));
    assert!(detail.contains("quota exceeded"));
}

#[tokio::test]
async fn test_generate_presentation_truncates_and_renumbers() {
    let (status, body) = send(
        router(scripted_state()),
        Method::POST,
        "/api/presentation/generate",
        Some(deck_request(10, 5)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let slides = body["slides"].as_array().unwrap();
    assert_eq!(slides.len(), 10);
    let numbers: Vec<u64> = slides.iter().map(|s| s["slide_number"].as_u64().unwrap()).collect();
    assert_eq!(numbers, (1..=10).collect::<Vec<u64>>());
    assert_eq!(body["total_duration_minutes"], 5.0);
    assert_eq!(body["presentation_title"], "Pain Paris");
}

#[tokio::test]
async fn test_generate_presentation_short_deck_is_500() {
    let state = AppState::new(Arc::new(ModelRouter::fixed(Arc::new(FixedDeck(3)))), "chatgpt-latest");

    let (status, body) = send(
        router(state),
        Method::POST,
        "/api/presentation/generate",
        Some(deck_request(10, 5)),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Presentation generation failed"));
    assert!(detail.contains("model returned 3 of 10 slides"));
}

#[tokio::test]
async fn test_generate_presentation_out_of_range_is_400() {
    for (slides, minutes) in [(4, 5), (16, 5), (10, 2), (10, 16)] {
        let (status, _) = send(
            router(scripted_state()),
            Method::POST,
            "/api/presentation/generate",
            Some(deck_request(slides, minutes)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{slides} slides / {minutes} min");
    }
}

#[tokio::test]
async fn test_edit_presentation_returns_full_deck() {
    let current = deck_json(10)["slides"].clone();
    let body = json!({
        "current_presentation": current,
        "edit_request": "Merge everything into three slides",
        "business_context": context_fields()
    });

    let (status, body) = send(router(scripted_state()), Method::POST, "/api/presentation/edit", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slides"].as_array().unwrap().len(), 3);
    assert_eq!(body["slides"][2]["slide_number"], 3);
}

#[tokio::test]
async fn test_edit_presentation_requires_instruction() {
    let body = json!({
        "current_presentation": deck_json(5)["slides"].clone(),
        "edit_request": "   ",
        "business_context": context_fields()
    });

    let (status, body) = send(router(scripted_state()), Method::POST, "/api/presentation/edit", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "edit_request must not be empty");
}

#[tokio::test]
async fn test_export_sets_download_headers() {
    let body = json!({
        "presentation": {
            "presentation_title": "Pain Paris",
            "total_duration_minutes": 5,
            "slides": [{"slide_number": 1, "title": "Hook", "content": ["Fresh bread"]}]
        },
        "business_name": "Pain Paris"
    });

    let (status, headers, bytes) =
        send_raw(router(scripted_state()), Method::POST, "/api/presentation/export-pptx", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"pain-paris-pitch-deck.md\""
    );
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/markdown"));
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("## 1. Hook"));
}

#[tokio::test]
async fn test_video_without_provider_is_503() {
    let body = json!({"time": 0.1, "prompt": "Fresh bread at dawn"});
    let (status, _) = send(router(scripted_state()), Method::POST, "/api/generate-video", Some(body)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_video_converts_minutes_to_seconds() {
    let provider = Arc::new(RecordingVideo::default());
    let state = scripted_state().with_video(provider.clone());
    let body = json!({
        "time": 0.15,
        "prompt": "Fresh bread at dawn",
        "business_name": "Pain Paris"
    });

    let (status, body) = send(router(state), Method::POST, "/api/generate-video", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["video_url"], "https://cdn.test/videos/pain-paris.mp4");

    let calls = provider.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!((calls[0].1 - 9.0).abs() < 1e-9);
    assert!(calls[0].0.contains("Fresh bread at dawn"));
}

#[tokio::test]
async fn test_video_rejects_empty_prompt() {
    let state = scripted_state().with_video(Arc::new(RecordingVideo::default()));
    let body = json!({"time": 0.1, "prompt": ""});
    let (status, _) = send(router(state), Method::POST, "/api/generate-video", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
