pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::{ServeDir, ServeFile};

use crate::orchestration::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let ui_dir = state.config.ui_dir.clone();

    Router::new()
        .route("/health", get(health::health_handler))
        // Run Control API
        .route("/api/start", post(handlers::handle_start))
        .route("/api/stop", post(handlers::handle_stop))
        .route("/api/status", get(handlers::handle_status))
        .route("/api/events", get(handlers::handle_events))
        .route("/api/agent/:name", get(handlers::handle_agent_detail))
        .route("/api/config", get(handlers::handle_config))
        // Front end
        .route_service("/", ServeFile::new(format!("{ui_dir}/index.html")))
        .nest_service("/ui", ServeDir::new(&ui_dir))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::orchestration::run::RunController;

    fn test_state(config: Config) -> AppState {
        AppState {
            config,
            agent_client: None,
            runs: RunController::new(),
        }
    }

    async fn send(router: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let router = build_router(test_state(Config::for_tests()));
        let (status, body) = send(router, Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_start_without_agent_service_is_refused() {
        let state = test_state(Config::for_tests());
        let runs = state.runs.clone();
        let router = build_router(state);

        let (status, body) = send(router, Method::POST, "/api/start").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "CONFIGURATION_ERROR");
        assert!(runs.snapshot().run_id.is_none());
    }

    #[tokio::test]
    async fn test_status_when_idle() {
        let router = build_router(test_state(Config::for_tests()));
        let (status, body) = send(router, Method::GET, "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "idle");
        assert_eq!(body["messages"].as_array().unwrap().len(), 0);
        assert_eq!(body["agents"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_stop_without_run_conflicts() {
        let router = build_router(test_state(Config::for_tests()));
        let (status, body) = send(router, Method::POST, "/api/stop").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_agent_detail_for_known_agent() {
        let mut config = Config::for_tests();
        config
            .agent_ids
            .insert("recruiter".to_string(), "asst_42".to_string());
        config.playground_url_prefix = Some("https://playground/".to_string());
        let router = build_router(test_state(config));

        let (status, body) = send(router, Method::GET, "/api/agent/recruiter").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "recruiter");
        assert_eq!(body["id"], "asst_42");
        assert_eq!(body["playground_url"], "https://playground/asst_42");
        assert_eq!(body["statistics"]["invocations"], 0);
        assert_eq!(body["messages"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_agent_detail_for_unknown_agent() {
        let router = build_router(test_state(Config::for_tests()));
        let (status, body) = send(router, Method::GET, "/api/agent/nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_config_reports_empty_strings_when_unset() {
        let router = build_router(test_state(Config::for_tests()));
        let (status, body) = send(router, Method::GET, "/api/config").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["agent_endpoint"], "");
        assert_eq!(body["model_deployment"], "");
    }
}
