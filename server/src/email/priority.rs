//! Heuristic priority scoring.
//!
//! Five independent sub-metrics, each 0-100, are combined by a fixed weighted
//! sum into a 0-100 score, and the score maps onto a level through monotonic
//! thresholds. Everything here is a pure function of its inputs.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::server_config::{LevelThresholds, ScoringConfig, ScoringWeights};

use super::{
    dates::{days_until_nearest, days_until_nearest_undated},
    metadata::EmailMetadata,
};

/// Diminishing returns for keyword hit counts: 0, 1, 2, 3, 4, 5+ hits
const SATURATION_SCALE: [u8; 6] = [0, 45, 70, 85, 95, 100];
const SUBJECT_URGENCY_HITS: usize = 2;
const SENIORITY_BONUS: u32 = 15;
const EXCLAMATION_POINTS: u32 = 5;
const MAX_EXCLAMATION_BONUS: u32 = 20;
const NEUTRAL_SENDER: u8 = 50;
const EXECUTIVE_SENDER: u8 = 85;
const AUTOMATED_SENDER: u8 = 20;
const DEADLINE_WORD_POINTS: u8 = 20;
const MAX_DEADLINE_WORD_SCORE: u8 = 40;

lazy_static! {
    static ref URGENCY_SET: RegexSet = RegexSet::new([
        r"(?i)\burgent(ly)?\b",
        r"(?i)\basap\b",
        r"(?i)\bas soon as possible\b",
        r"(?i)\bimmediately\b",
        r"(?i)\bright away\b",
        r"(?i)\bemergency\b",
        r"(?i)\btime[- ]sensitive\b",
        r"(?i)\bhigh priority\b",
        r"(?i)\btop priority\b",
        r"(?i)\bend of (the )?day\b",
        r"(?i)\beod\b",
    ])
    .unwrap();
    static ref IMPORTANCE_SET: RegexSet = RegexSet::new([
        r"(?i)\bimportant\b",
        r"(?i)\bcritical\b",
        r"(?i)\bpriority\b",
        r"(?i)\brequired\b",
        r"(?i)\bmust\b",
        r"(?i)\baction required\b",
        r"(?i)\bplease review\b",
        r"(?i)\bapproval needed\b",
        r"(?i)\bmandatory\b",
        r"(?i)\bescalat\w*",
        r"(?i)\bboard meeting\b",
    ])
    .unwrap();
    static ref DEADLINE_WORD_SET: RegexSet = RegexSet::new([
        r"(?i)\bdeadline\b",
        r"(?i)\bdue\b",
        r"(?i)\bby end of\b",
        r"(?i)\bbefore\b",
        r"(?i)\buntil\b",
    ])
    .unwrap();
    static ref RE_SENIORITY: Regex = Regex::new(
        r"(?i)\b(ceo|cto|cfo|coo|president|director|vp|vice president|head of|executive|escalat\w*)\b"
    )
    .unwrap();
    static ref RE_EXECUTIVE_SENDER: Regex = Regex::new(
        r"(?i)\b(ceo|cto|cfo|coo|president|director|vp|vice president|head of|manager|lead|chief)\b"
    )
    .unwrap();
    static ref RE_AUTOMATED_SENDER: Regex = Regex::new(
        r"(?i)(no-?reply|newsletter|notifications?|mailer-daemon|marketing)"
    )
    .unwrap();
    static ref RE_SENTENCE: Regex = Regex::new(r"[^.!?\n]+[.!?]?").unwrap();
    static ref RE_LIST_MARKER: Regex = Regex::new(r"^([-*•]|\d+[.)])\s*").unwrap();
    static ref RE_NAME_PREFIX: Regex = Regex::new(r"^[A-Z][a-z]+\s*[-–:]\s+").unwrap();
    static ref RE_REQUEST_PHRASE: Regex = Regex::new(
        r"(?i)\b(please|can you|could you|would you|need you to|let me know)\b"
    )
    .unwrap();
}

const IMPERATIVE_VERBS: &[&str] = &[
    "please", "send", "review", "respond", "reply", "confirm", "update", "prepare", "call",
    "schedule", "book", "submit", "complete", "approve", "sign", "check", "fix", "provide",
    "share", "remember", "forward", "finish", "let", "make", "ensure", "join", "read", "attend",
    "register", "contact", "follow", "bring", "add", "create", "set", "take", "log", "pass",
];

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub fn from_score(score: u8, thresholds: &LevelThresholds) -> Self {
        if score >= thresholds.critical {
            PriorityLevel::Critical
        } else if score >= thresholds.high {
            PriorityLevel::High
        } else if score >= thresholds.medium {
            PriorityLevel::Medium
        } else {
            PriorityLevel::Low
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            PriorityLevel::Critical => "#ef4444",
            PriorityLevel::High => "#f59e0b",
            PriorityLevel::Medium => "#3b82f6",
            PriorityLevel::Low => "#6b7280",
        }
    }

    /// Upper-case label used in focus mode
    pub fn label(self) -> &'static str {
        match self {
            PriorityLevel::Critical => "CRITICAL",
            PriorityLevel::High => "HIGH",
            PriorityLevel::Medium => "MEDIUM",
            PriorityLevel::Low => "LOW",
        }
    }

    pub fn needs_attention(self) -> bool {
        self >= PriorityLevel::High
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriorityBreakdown {
    pub urgency: u8,
    pub importance: u8,
    pub action_density: u8,
    pub sender_weight: u8,
    pub time_sensitivity: u8,
}

impl PriorityBreakdown {
    fn weighted(&self, weights: &ScoringWeights) -> f64 {
        weights.urgency * f64::from(self.urgency)
            + weights.importance * f64::from(self.importance)
            + weights.action_density * f64::from(self.action_density)
            + weights.sender_weight * f64::from(self.sender_weight)
            + weights.time_sensitivity * f64::from(self.time_sensitivity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityResult {
    pub score: u8,
    pub level: PriorityLevel,
    pub color: &'static str,
    pub breakdown: PriorityBreakdown,
}

impl PriorityResult {
    fn new(score: u8, level: PriorityLevel, breakdown: PriorityBreakdown) -> Self {
        Self {
            score,
            level,
            color: level.color(),
            breakdown,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, PriorityLevel::Low, PriorityBreakdown::default())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityScorer {
    weights: ScoringWeights,
    thresholds: LevelThresholds,
}

impl PriorityScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            weights: config.weights,
            thresholds: config.thresholds,
        }
    }

    /// Score a cleaned body. `reference` is the day time expressions are
    /// measured from, normally the email's own `Date`. Without one, time
    /// expressions are scored on their wording alone.
    pub fn score(
        &self,
        body: &str,
        metadata: &EmailMetadata,
        reference: Option<NaiveDate>,
    ) -> PriorityResult {
        if body.trim().is_empty() {
            return PriorityResult::empty();
        }

        let subject = metadata.subject.as_deref().unwrap_or_default();
        let from = metadata.from.as_deref();
        let breakdown = PriorityBreakdown {
            urgency: urgency_score(body, subject),
            importance: importance_score(body, subject, from),
            action_density: action_density_score(body),
            sender_weight: sender_score(from),
            time_sensitivity: time_sensitivity_score(body, reference),
        };

        let score = breakdown.weighted(&self.weights).round().clamp(0.0, 100.0) as u8;
        let level = PriorityLevel::from_score(score, &self.thresholds);

        PriorityResult::new(score, level, breakdown)
    }
}

fn saturate(hits: usize) -> u8 {
    SATURATION_SCALE[hits.min(SATURATION_SCALE.len() - 1)]
}

fn urgency_score(body: &str, subject: &str) -> u8 {
    let mut hits = URGENCY_SET.matches(body).iter().count();
    if URGENCY_SET.is_match(subject) {
        hits += SUBJECT_URGENCY_HITS;
    }
    saturate(hits)
}

fn importance_score(body: &str, subject: &str, from: Option<&str>) -> u8 {
    let mut score = u32::from(saturate(IMPORTANCE_SET.matches(body).iter().count()));

    if RE_SENIORITY.is_match(subject) || from.is_some_and(|f| RE_SENIORITY.is_match(f)) {
        score += SENIORITY_BONUS;
    }
    let exclamations = body.matches('!').count() as u32;
    score += (exclamations * EXCLAMATION_POINTS).min(MAX_EXCLAMATION_BONUS);

    score.min(100) as u8
}

fn action_density_score(body: &str) -> u8 {
    let sentences: Vec<&str> = RE_SENTENCE
        .find_iter(body)
        .map(|m| m.as_str().trim())
        .filter(|s| s.chars().any(char::is_alphabetic))
        .collect();
    if sentences.is_empty() {
        return 0;
    }

    let requests = sentences.iter().filter(|s| is_request(s)).count();
    (100.0 * requests as f64 / sentences.len() as f64).round() as u8
}

/// Imperative verb lead, a request phrase, or a question
pub(crate) fn is_request(sentence: &str) -> bool {
    let sentence = sentence.trim();
    let sentence = RE_LIST_MARKER.replace(sentence, "");
    let sentence = RE_NAME_PREFIX.replace(&sentence, "");

    let first_word = sentence
        .split(|c: char| !c.is_alphabetic())
        .next()
        .unwrap_or_default()
        .to_lowercase();

    IMPERATIVE_VERBS.contains(&first_word.as_str())
        || RE_REQUEST_PHRASE.is_match(&sentence)
        || sentence.ends_with('?')
}

fn sender_score(from: Option<&str>) -> u8 {
    match from {
        Some(from) if RE_AUTOMATED_SENDER.is_match(from) => AUTOMATED_SENDER,
        Some(from) if RE_EXECUTIVE_SENDER.is_match(from) => EXECUTIVE_SENDER,
        _ => NEUTRAL_SENDER,
    }
}

fn time_sensitivity_score(body: &str, reference: Option<NaiveDate>) -> u8 {
    let nearest = match reference {
        Some(reference) => days_until_nearest(body, reference),
        None => days_until_nearest_undated(body),
    };
    match nearest {
        Some(0) => 100,
        Some(1) => 90,
        Some(2) => 80,
        Some(3..=7) => 55,
        Some(8..=14) => 35,
        Some(_) => 15,
        None => {
            let words = DEADLINE_WORD_SET.matches(body).iter().count();
            (words as u8)
                .saturating_mul(DEADLINE_WORD_POINTS)
                .min(MAX_DEADLINE_WORD_SCORE)
        }
    }
}
