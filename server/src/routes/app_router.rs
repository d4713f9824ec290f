use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

use crate::{error::AppError, request_tracing, server_config::HttpServerConfig, ServerState};

use super::handlers::{health, process, samples};

pub struct AppRouter;

impl AppRouter {
    pub fn create(state: ServerState) -> Router {
        let cors_layer = cors_layer(&state.config.server);
        let max_body_bytes = state.config.server.max_body_bytes;

        Router::new()
            .route("/", get(|| async { "Email triage server" }))
            .nest(
                "/api",
                Router::new()
                    .route(
                        "/process",
                        post(process::handler_process_email)
                            .layer(DefaultBodyLimit::max(max_body_bytes)),
                    )
                    .route("/samples", get(samples::handler_list_samples))
                    .route("/sample/:key", get(samples::handler_get_sample))
                    .route("/health", get(health::handler_health))
                    .with_state(state.clone()),
            )
            .layer(request_tracing::trace_with_request_id_layer())
            .layer(cors_layer)
            .with_state(state)
            .fallback(handler_404)
    }
}

fn cors_layer(config: &HttpServerConfig) -> CorsLayer {
    if config.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub async fn handler_404() -> AppError {
    AppError::NotFound("Route does not exist".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::json;
    use tower::ServiceExt;

    use crate::{
        email::samples::SAMPLE_EMAILS,
        testing::common::{body_json, state_with, test_state, unreachable_remote_state},
    };

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_process_email() {
        let router = AppRouter::create(test_state());
        let raw = "Subject: Budget\nFrom: pat@corp.com\nTo: a@corp.com, b@corp.com\n\nURGENT: please respond by end of day.";
        let response = router
            .oneshot(post_json("/api/process", json!({ "email_text": raw })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let data = &body["data"];
        assert_eq!(body["success"], true);
        assert_eq!(data["metadata"]["subject"], "Budget");
        assert_eq!(data["metadata"]["to"], json!(["a@corp.com", "b@corp.com"]));
        assert_eq!(data["original_text"], raw);
        assert_eq!(data["cleaned_text"], "URGENT: please respond by end of day.");
        assert!(data["priority"]["score"].as_u64().unwrap() <= 100);
        assert!(data["priority"]["breakdown"]["time_sensitivity"].is_u64());
        assert!(data["priority"]["color"].as_str().unwrap().starts_with('#'));
        assert!(data["summary"]["summary"].is_string());
        assert!(data["action_items"].is_array());
        assert!(data["focus_mode_text"].is_string());
    }

    #[tokio::test]
    async fn test_process_rejects_empty_text() {
        let router = AppRouter::create(test_state());
        let response = router
            .oneshot(post_json("/api/process", json!({ "email_text": "   " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Email text is empty");
    }

    #[tokio::test]
    async fn test_process_rejects_missing_field() {
        let router = AppRouter::create(test_state());
        let response = router
            .oneshot(post_json("/api/process", json!({ "text": "hello" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "No email text provided");
    }

    #[tokio::test]
    async fn test_process_rejects_non_json() {
        let router = AppRouter::create(test_state());
        let request = Request::builder()
            .method("POST")
            .uri("/api/process")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_process_rejects_oversized_body() {
        let mut config = crate::server_config::ServerConfig::default();
        config.server.max_body_bytes = 64;
        let analyzer = std::sync::Arc::new(crate::prompt::LocalAnalyzer::default());
        let router = AppRouter::create(state_with(config, analyzer));

        let response = router
            .oneshot(post_json(
                "/api/process",
                json!({ "email_text": "x".repeat(1024) }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_unreachable_ai_falls_back() {
        let router = AppRouter::create(unreachable_remote_state());
        let response = router
            .oneshot(post_json(
                "/api/process",
                json!({ "email_text": SAMPLE_EMAILS["urgent_deadline"] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert!(!body["data"]["summary"]["summary"]
            .as_str()
            .unwrap()
            .is_empty());
        assert!(!body["data"]["action_items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_samples_keeps_order() {
        let router = AppRouter::create(test_state());
        let response = router.oneshot(get_request("/api/samples")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        let samples = body["samples"].as_object().unwrap();
        assert_eq!(samples.len(), SAMPLE_EMAILS.len());
        assert_eq!(samples["urgent_deadline"]["name"], "Urgent Deadline");
        assert_eq!(
            samples["casual_quick"]["content"],
            SAMPLE_EMAILS["casual_quick"]
        );
    }

    #[tokio::test]
    async fn test_get_sample() {
        let router = AppRouter::create(test_state());
        let response = router
            .clone()
            .oneshot(get_request("/api/sample/fyi_update"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["sample"], SAMPLE_EMAILS["fyi_update"]);

        let response = router
            .oneshot(get_request("/api/sample/nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Sample not found");
    }

    #[tokio::test]
    async fn test_health() {
        let response = AppRouter::create(test_state())
            .oneshot(get_request("/api/health"))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({ "status": "healthy", "ai_enabled": false, "analyzer": "local" })
        );

        let response = AppRouter::create(unreachable_remote_state())
            .oneshot(get_request("/api/health"))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["ai_enabled"], true);
        assert_eq!(body["analyzer"], "mistral");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = AppRouter::create(test_state())
            .oneshot(get_request("/nowhere"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({ "success": false, "error": "Route does not exist" })
        );
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method("OPTIONS")
            .uri("/api/process")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origins() {
        let mut config = crate::server_config::ServerConfig::default();
        config.server.cors_origins = vec![
            "http://localhost:3000".to_string(),
            "bad\norigin".to_string(),
        ];
        let analyzer = std::sync::Arc::new(crate::prompt::LocalAnalyzer::default());
        let router = AppRouter::create(state_with(config, analyzer));

        let response = router
            .clone()
            .oneshot(preflight("http://localhost:3000"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );

        let response = router
            .oneshot(preflight("http://evil.example"))
            .await
            .unwrap();
        assert!(!response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn test_cors_wildcard_allows_any_origin() {
        let response = AppRouter::create(test_state())
            .oneshot(preflight("http://anywhere.example"))
            .await
            .unwrap();
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
