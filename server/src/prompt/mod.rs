pub(crate) mod fallback;
pub(crate) mod mistral;

use std::{sync::Arc, time::Duration};

use axum::async_trait;

use crate::{
    email::metadata::EmailMetadata, error::AppResult, model::analysis::EmailAnalysis,
    rate_limiters::RateLimiters, server_config::ServerConfig, HttpClient,
};

pub use fallback::LocalAnalyzer;
pub use mistral::MistralAnalyzer;

/// Produces a summary and action items for a cleaned email body
#[async_trait]
pub trait EmailAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_remote(&self) -> bool {
        false
    }

    async fn analyze(&self, body: &str, metadata: &EmailMetadata) -> AppResult<EmailAnalysis>;
}

pub type SharedAnalyzer = Arc<dyn EmailAnalyzer>;

/// Runs `primary` under a deadline and answers with the local analysis when it
/// fails. Never returns an error.
pub struct FallbackAnalyzer<A> {
    primary: A,
    local: LocalAnalyzer,
    timeout: Duration,
}

impl<A: EmailAnalyzer> FallbackAnalyzer<A> {
    pub fn new(primary: A, local: LocalAnalyzer, timeout: Duration) -> Self {
        Self {
            primary,
            local,
            timeout,
        }
    }
}

#[async_trait]
impl<A: EmailAnalyzer> EmailAnalyzer for FallbackAnalyzer<A> {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    fn is_remote(&self) -> bool {
        self.primary.is_remote()
    }

    async fn analyze(&self, body: &str, metadata: &EmailMetadata) -> AppResult<EmailAnalysis> {
        match tokio::time::timeout(self.timeout, self.primary.analyze(body, metadata)).await {
            Ok(Ok(analysis)) => return Ok(analysis),
            Ok(Err(e)) => {
                tracing::warn!(
                    "{} analyzer failed, using local analysis: {}",
                    self.primary.name(),
                    e
                );
            }
            Err(_) => {
                tracing::warn!(
                    "{} analyzer timed out after {:?}, using local analysis",
                    self.primary.name(),
                    self.timeout
                );
            }
        }

        Ok(self.local.analyze_text(body, metadata))
    }
}

/// Pick the analyzer for the process: remote with a local fallback when an
/// API key is configured, local only otherwise.
pub fn select_analyzer(
    config: &ServerConfig,
    http_client: HttpClient,
    rate_limiters: RateLimiters,
) -> SharedAnalyzer {
    let local = LocalAnalyzer::new(&config.processing);

    match config.ai.api_key.as_deref() {
        Some(api_key) if config.ai.is_configured() => {
            let remote = MistralAnalyzer::new(
                &config.ai,
                api_key,
                http_client,
                rate_limiters,
                config.processing.max_action_items,
            );
            tracing::info!(
                "Using {} analyzer with model {}, local fallback after {}s",
                remote.name(),
                config.ai.model,
                config.ai.timeout_secs
            );
            Arc::new(FallbackAnalyzer::new(
                remote,
                local,
                Duration::from_secs(config.ai.timeout_secs),
            ))
        }
        _ => {
            tracing::info!("No AI API key configured, using {} analyzer", local.name());
            Arc::new(local)
        }
    }
}
