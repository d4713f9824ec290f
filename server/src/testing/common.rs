use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use axum::{async_trait, body::Body, response::Response};

use crate::{
    email::{metadata::EmailMetadata, processor::EmailProcessor},
    error::{AppError, AppResult},
    model::analysis::{AnalysisSource, EmailAnalysis, EmailSummary},
    prompt::{select_analyzer, EmailAnalyzer, LocalAnalyzer, SharedAnalyzer},
    rate_limiters::RateLimiters,
    server_config::ServerConfig,
    HttpClient, ServerState,
};

/// Always errors, like a remote API that is down
pub struct FailingAnalyzer;

#[async_trait]
impl EmailAnalyzer for FailingAnalyzer {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn analyze(&self, _body: &str, _metadata: &EmailMetadata) -> AppResult<EmailAnalysis> {
        Err(AppError::Internal(anyhow!("analyzer unavailable")))
    }
}

/// Answers after the given delay with a fixed remote analysis
pub struct SlowAnalyzer(pub Duration);

#[async_trait]
impl EmailAnalyzer for SlowAnalyzer {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn analyze(&self, _body: &str, _metadata: &EmailMetadata) -> AppResult<EmailAnalysis> {
        tokio::time::sleep(self.0).await;
        Ok(EmailAnalysis {
            summary: EmailSummary {
                summary: "slow".to_string(),
                key_points: vec![],
                tone: "professional".to_string(),
            },
            action_items: vec![],
            source: AnalysisSource::Remote,
        })
    }
}

pub fn state_with(config: ServerConfig, analyzer: SharedAnalyzer) -> ServerState {
    let processor = EmailProcessor::new(&config, analyzer.clone());

    ServerState {
        config: Arc::new(config),
        processor,
        analyzer,
    }
}

/// State backed by the local analyzer only
pub fn test_state() -> ServerState {
    let config = ServerConfig::default();
    let analyzer = Arc::new(LocalAnalyzer::new(&config.processing));
    state_with(config, analyzer)
}

/// State whose remote analyzer points at a port nothing listens on
pub fn unreachable_remote_state() -> ServerState {
    let mut config = ServerConfig::default();
    config.ai.api_key = Some("test-key".to_string());
    config.ai.timeout_secs = 5;
    config.ai.endpoint = "http://127.0.0.1:1/v1/chat/completions".parse().unwrap();

    let http_client = HttpClient::new();
    let rate_limiters = RateLimiters::new(&config.ai.prompt_limits);
    let analyzer = select_analyzer(&config, http_client, rate_limiters);
    state_with(config, analyzer)
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
