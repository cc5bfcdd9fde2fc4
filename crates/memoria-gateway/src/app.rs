use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use memoria_compaction::CompactionService;
use memoria_core::MemoriaConfig;

/// Shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: MemoriaConfig,
    pub compaction: Arc<CompactionService>,
}

impl AppState {
    pub fn new(config: MemoriaConfig, compaction: Arc<CompactionService>) -> Self {
        Self { config, compaction }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    use crate::http::{compaction, conversations, health};

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/conversations/{id}",
            get(conversations::get_conversation).delete(conversations::delete_conversation),
        )
        .route(
            "/api/conversations/{id}/messages",
            post(conversations::append_messages),
        )
        .route(
            "/api/conversations/{id}/compact",
            post(conversations::compact_conversation),
        )
        .route("/api/compression/trigger", post(compaction::trigger_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use async_trait::async_trait;
    use memoria_agent::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
    use memoria_compaction::Summarizer;
    use memoria_core::CompressionConfig;
    use memoria_store::ConversationStore;

    struct Canned;

    #[async_trait]
    impl LlmProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "Patient reported fever; prescribed ibuprofen 200mg.".to_string(),
                model: req.model.clone(),
                tokens_in: 0,
                tokens_out: 0,
                stop_reason: "stop".to_string(),
            })
        }
    }

    fn state_with(config: MemoriaConfig) -> Arc<AppState> {
        let store = Arc::new(
            ConversationStore::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap(),
        );
        let summarizer = Summarizer::new(Arc::new(Canned), &config.compression);
        let compaction = Arc::new(CompactionService::new(
            store,
            summarizer,
            config.compression.clone(),
        ));
        Arc::new(AppState::new(config, compaction))
    }

    fn router() -> Router {
        build_router(state_with(MemoriaConfig::default()))
    }

    async fn call(router: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn user_turns(n: usize) -> Value {
        let messages: Vec<Value> = (0..n)
            .map(|i| json!({ "role": "user", "content": format!("symptom report {i}") }))
            .collect();
        json!({ "messages": messages })
    }

    #[tokio::test]
    async fn health_reports_store_and_schedule() {
        let (status, body) = call(router(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["conversations"], 0);
        assert_eq!(body["compaction"]["enabled"], true);
        assert_eq!(body["compaction"]["running"], false);
    }

    #[tokio::test]
    async fn append_then_read_back() {
        let router = router();
        let (status, body) = call(
            router.clone(),
            post(
                "/api/conversations/p-1/messages",
                json!({ "messages": [
                    { "role": "system", "content": "Triage assistant." },
                    { "role": "user", "content": "I have a fever." },
                    { "role": "tool_result", "content": "slot booked", "tool_name": "booking" }
                ]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["conversation_id"], "p-1");
        assert_eq!(body["messages"], 3);
        assert!(body["compaction"].is_null());

        let (status, body) = call(router, get("/api/conversations/p-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], 1);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["tool_name"], "booking");
    }

    #[tokio::test]
    async fn append_over_threshold_compacts() {
        let router = router();
        let (status, body) = call(
            router.clone(),
            post("/api/conversations/p-1/messages", user_turns(11)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"], 4);
        assert_eq!(body["compaction"]["outcome"], "compacted");
        assert_eq!(body["compaction"]["before"], 11);

        let (_, body) = call(router, get("/api/conversations/p-1")).await;
        let last = &body["messages"][3]["content"];
        assert!(last.as_str().unwrap().starts_with("[History summary]\n"));
    }

    #[tokio::test]
    async fn empty_append_is_rejected() {
        let (status, body) = call(
            router(),
            post("/api/conversations/p-1/messages", json!({ "messages": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "messages cannot be empty");
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let (status, _) = call(router(), get("/api/conversations/nobody")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_clears_history() {
        let router = router();
        call(
            router.clone(),
            post("/api/conversations/p-1/messages", user_turns(2)),
        )
        .await;

        let delete = Request::builder()
            .method("DELETE")
            .uri("/api/conversations/p-1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(router.clone(), delete).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], true);

        let (status, _) = call(router, get("/api/conversations/p-1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn compact_endpoint_reports_outcome() {
        let state = state_with(MemoriaConfig::default());
        let history: Vec<memoria_core::Message> = (0..15)
            .map(|i| memoria_core::Message::user(format!("turn {i}")))
            .collect();
        state.compaction.store().replace("p-1", &history).unwrap();

        let (status, body) = call(
            build_router(state),
            post("/api/conversations/p-1/compact", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "compacted");
        assert_eq!(body["before"], 15);
        assert_eq!(body["after"], 4);
    }

    #[tokio::test]
    async fn trigger_runs_a_batch_pass() {
        let state = state_with(MemoriaConfig::default());
        let history: Vec<memoria_core::Message> = (0..15)
            .map(|i| memoria_core::Message::user(format!("turn {i}")))
            .collect();
        state.compaction.store().replace("p-1", &history).unwrap();
        state.compaction.store().replace("p-2", &history[..3]).unwrap();

        let (status, body) = call(
            build_router(state),
            post("/api/compression/trigger", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["report"]["total"], 2);
        assert_eq!(body["report"]["compacted"], 1);
        assert_eq!(body["report"]["skipped"], 1);
        assert!(body["duration_ms"].is_u64());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn trigger_when_disabled_is_skipped() {
        let mut config = MemoriaConfig::default();
        config.compression = CompressionConfig {
            enabled: false,
            ..Default::default()
        };
        let (status, body) = call(
            build_router(state_with(config)),
            post("/api/compression/trigger", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["message"].as_str().unwrap().contains("skipped"));
        assert!(body.get("report").is_none());
    }

    #[tokio::test]
    async fn token_is_required_when_configured() {
        let mut config = MemoriaConfig::default();
        config.gateway.auth_token = Some("s3cret".to_string());
        let router = build_router(state_with(config));

        let (status, _) = call(router.clone(), get("/api/conversations/p-1")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let authed = Request::builder()
            .uri("/api/conversations/p-1")
            .header("authorization", "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(router.clone(), authed).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Health stays open for probes.
        let (status, _) = call(router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
