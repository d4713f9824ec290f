use anyhow::Context;

use crate::{
    error::{AppError, AppResult},
    model::analysis::AnalysisResult,
    prompt::SharedAnalyzer,
    server_config::ServerConfig,
};

use super::{cleaner::clean_and_extract, focus_mode::render_focus_mode, priority::PriorityScorer};

/// Runs one raw email through extraction, scoring and analysis
#[derive(Clone)]
pub struct EmailProcessor {
    scorer: PriorityScorer,
    analyzer: SharedAnalyzer,
    focus_action_items: usize,
}

impl EmailProcessor {
    pub fn new(config: &ServerConfig, analyzer: SharedAnalyzer) -> Self {
        Self {
            scorer: PriorityScorer::new(&config.scoring),
            analyzer,
            focus_action_items: config.processing.focus_action_items,
        }
    }

    pub async fn process(&self, raw: &str) -> AppResult<AnalysisResult> {
        if raw.trim().is_empty() {
            return Err(AppError::BadRequest("Email text is empty".to_string()));
        }

        // HTML conversion and regex work are CPU bound, keep them off the runtime
        let scorer = self.scorer;
        let input = raw.to_string();
        let (metadata, cleaned_text, priority) = tokio::task::spawn_blocking(move || {
            let (metadata, cleaned_text) = clean_and_extract(&input);
            // Relative dates are read against the email's own date when it has one
            let priority = scorer.score(&cleaned_text, &metadata, metadata.reference_date());
            (metadata, cleaned_text, priority)
        })
        .await
        .context("Email extraction task failed")?;
        if metadata.is_empty() {
            tracing::debug!("No header block found, scored body only");
        }

        let analysis = self.analyzer.analyze(&cleaned_text, &metadata).await?;
        tracing::debug!(
            "Processed email {:?}: score {} ({}), {} action items from {} analysis",
            metadata.subject,
            priority.score,
            priority.level,
            analysis.action_items.len(),
            analysis.source
        );

        let focus_mode_text = render_focus_mode(
            &priority,
            &analysis.summary,
            &analysis.action_items,
            self.focus_action_items,
        )?;

        Ok(AnalysisResult {
            priority,
            summary: analysis.summary,
            action_items: analysis.action_items,
            metadata,
            focus_mode_text,
            cleaned_text,
            original_text: raw.to_string(),
        })
    }
}
