use std::sync::atomic::Ordering::Relaxed;
use std::sync::{atomic::AtomicBool, Arc};
use tokio::time::Duration;

use leaky_bucket::RateLimiter;

use crate::server_config::PromptLimits;

#[derive(Clone)]
pub struct RateLimiters {
    prompt: Arc<RateLimiter>,
    backoff: Arc<AtomicBool>,
    backoff_duration: Duration,
}

impl RateLimiters {
    pub fn new(limits: &PromptLimits) -> Self {
        let prompt = RateLimiter::builder()
            .initial(limits.rate_limit_per_sec)
            .interval(Duration::from_millis(limits.refill_interval_ms as u64))
            .max(limits.rate_limit_per_sec)
            .refill(limits.refill_amount)
            .build();

        Self {
            prompt: Arc::new(prompt),
            backoff: Arc::new(AtomicBool::new(false)),
            backoff_duration: Duration::from_secs(limits.backoff_secs),
        }
    }

    pub fn in_backoff(&self) -> bool {
        self.backoff.load(Relaxed)
    }

    pub async fn acquire_one(&self) {
        self.prompt.acquire_one().await;
    }

    pub fn trigger_backoff(&self) {
        if self.backoff.swap(true, Relaxed) {
            return;
        }
        tracing::info!("Triggering backoff for {:?}...", self.backoff_duration);
        let self_ = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(self_.backoff_duration).await;
            tracing::info!("Backoff expired");
            self_.backoff.store(false, Relaxed);
        });
    }

    pub fn get_status(&self) -> String {
        let prompt_bucket = format!("{}/{}", self.prompt.balance(), self.prompt.max());
        if self.in_backoff() {
            format!("prompts: {} (BACKOFF)", prompt_bucket)
        } else {
            format!("prompts: {}", prompt_bucket)
        }
    }
}
