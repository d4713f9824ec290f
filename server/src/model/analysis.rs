use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::email::{metadata::EmailMetadata, priority::PriorityResult};

pub const UNSPECIFIED_ASSIGNEE: &str = "unspecified";
pub const NO_DEADLINE: &str = "none";

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    /// Unknown values read as medium
    pub fn parse_lenient(value: &str) -> Self {
        value.trim().parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub text: String,
    pub assignee: String,
    pub deadline: String,
    pub confidence: Confidence,
}

impl ActionItem {
    /// Blank or missing assignee and deadline fall back to the sentinels
    pub fn new(
        text: impl Into<String>,
        assignee: Option<String>,
        deadline: Option<String>,
        confidence: Confidence,
    ) -> Self {
        let or_sentinel = |value: Option<String>, sentinel: &str| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| sentinel.to_string())
        };

        Self {
            text: text.into().trim().to_string(),
            assignee: or_sentinel(assignee, UNSPECIFIED_ASSIGNEE),
            deadline: or_sentinel(deadline, NO_DEADLINE),
            confidence,
        }
    }

    pub fn has_assignee(&self) -> bool {
        !self.assignee.eq_ignore_ascii_case(UNSPECIFIED_ASSIGNEE)
    }

    pub fn has_deadline(&self) -> bool {
        !self.deadline.eq_ignore_ascii_case(NO_DEADLINE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSummary {
    pub summary: String,
    pub key_points: Vec<String>,
    pub tone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AnalysisSource {
    #[display("remote")]
    Remote,
    #[display("fallback")]
    Fallback,
}

/// What an analyzer produces for one email
#[derive(Debug, Clone)]
pub struct EmailAnalysis {
    pub summary: EmailSummary,
    pub action_items: Vec<ActionItem>,
    pub source: AnalysisSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub priority: PriorityResult,
    pub summary: EmailSummary,
    pub action_items: Vec<ActionItem>,
    pub metadata: EmailMetadata,
    pub focus_mode_text: String,
    pub cleaned_text: String,
    pub original_text: String,
}
