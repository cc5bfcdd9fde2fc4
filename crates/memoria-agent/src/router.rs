use async_trait::async_trait;
use tracing::{info, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// One provider inside a [`ProviderRouter`].
pub struct ProviderSlot {
    pub provider: Box<dyn LlmProvider>,
    /// Extra attempts on this provider before moving to the next one.
    pub max_retries: u32,
}

impl ProviderSlot {
    pub fn new(provider: Box<dyn LlmProvider>, max_retries: u32) -> Self {
        Self {
            provider,
            max_retries,
        }
    }
}

/// Tries providers in priority order (index 0 first) with per-slot retries.
///
/// Only the last error is returned when every slot fails; the caller decides
/// what a failed summarization means.
pub struct ProviderRouter {
    slots: Vec<ProviderSlot>,
}

impl ProviderRouter {
    /// Build a router over priority-ordered slots. Returns `None` for an
    /// empty list.
    pub fn new(slots: Vec<ProviderSlot>) -> Option<Self> {
        if slots.is_empty() {
            return None;
        }
        Some(Self { slots })
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[async_trait]
impl LlmProvider for ProviderRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        for slot in &self.slots {
            let provider_name = slot.provider.name();

            for attempt in 0..=slot.max_retries {
                match slot.provider.send(req).await {
                    Ok(resp) => {
                        if attempt > 0 {
                            info!(provider = %provider_name, attempt, "request succeeded after retry");
                        }
                        return Ok(resp);
                    }
                    Err(e) => {
                        warn!(provider = %provider_name, attempt, err = %e, "provider send failed");

                        // Retrying a rate-limited provider immediately is pointless.
                        let rate_limited = matches!(e, ProviderError::RateLimited { .. });
                        last_err = Some(e);
                        if rate_limited {
                            break;
                        }

                        if attempt < slot.max_retries {
                            tokio::time::sleep(tokio::time::Duration::from_millis(
                                200 * (attempt as u64 + 1),
                            ))
                            .await;
                        }
                    }
                }
            }

            info!(provider = %provider_name, "provider exhausted, trying next provider");
        }

        Err(last_err
            .unwrap_or_else(|| ProviderError::Unavailable("all providers failed".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct AlwaysFail {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LlmProvider for AlwaysFail {
        fn name(&self) -> &str {
            "always-fail"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Unavailable("intentional failure".to_string()))
        }
    }

    struct RateLimited;

    #[async_trait]
    impl LlmProvider for RateLimited {
        fn name(&self) -> &str {
            "rate-limited"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::RateLimited {
                retry_after_ms: 1000,
            })
        }
    }

    struct AlwaysOk;

    #[async_trait]
    impl LlmProvider for AlwaysOk {
        fn name(&self) -> &str {
            "always-ok"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: "ok".to_string(),
                model: req.model.clone(),
                tokens_in: 1,
                tokens_out: 1,
                stop_reason: "stop".to_string(),
            })
        }
    }

    fn dummy_request() -> ChatRequest {
        ChatRequest::single("test-model", "hello", 64)
    }

    #[test]
    fn empty_router_is_rejected() {
        assert!(ProviderRouter::new(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn router_falls_back_to_second_provider() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(AlwaysFail { calls: calls.clone() }), 1),
            ProviderSlot::new(Box::new(AlwaysOk), 0),
        ])
        .unwrap();

        let resp = router.send(&dummy_request()).await.unwrap();
        assert_eq!(resp.content, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2, "one try plus one retry");
    }

    #[tokio::test]
    async fn rate_limit_skips_remaining_retries() {
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(RateLimited), 5),
            ProviderSlot::new(Box::new(AlwaysOk), 0),
        ])
        .unwrap();
        assert!(router.send(&dummy_request()).await.is_ok());
    }

    #[tokio::test]
    async fn router_errors_when_all_fail() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = ProviderRouter::new(vec![
            ProviderSlot::new(Box::new(AlwaysFail { calls: calls.clone() }), 0),
            ProviderSlot::new(Box::new(AlwaysFail { calls: calls.clone() }), 0),
        ])
        .unwrap();

        let result = router.send(&dummy_request()).await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
