use axum::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    email::{dates::deadline_phrase, metadata::EmailMetadata, priority::is_request},
    error::AppResult,
    model::analysis::{ActionItem, AnalysisSource, Confidence, EmailAnalysis, EmailSummary},
    server_config::ProcessingConfig,
};

use super::EmailAnalyzer;

const KEY_POINT_COUNT: usize = 3;
const EMPTY_SUMMARY: &str = "No content to summarize.";

static RE_LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[-*•]|\d+[.)])\s+").unwrap());
static RE_ACTION_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(please|could you|can you|need to|needs to|should|must|required|action|todo|to-do|tasks?|make sure|let me know)\b",
    )
    .unwrap()
});
static RE_NAME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z][a-z]+)\s*(?:-|–|:)\s+").unwrap());
static RE_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)@([A-Za-z][\w.-]*)").unwrap());
static RE_URGENT_TONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(urgent|asap|immediately|emergency|right away|end of (the )?day|eod)\b")
        .unwrap()
});
static RE_CASUAL_TONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\bhey\b|\bcoffee\b|\blol\b|\bno worries\b|:\))").unwrap());
static RE_FRIENDLY_TONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(thanks|thank you|appreciate\w*|great|awesome|glad)\b").unwrap()
});

// Capitalised words that open a line like a name prefix but are not people
const NOT_NAMES: &[&str] = &[
    "Note", "Reminder", "Update", "Action", "Fyi", "Ps", "Re", "Subject", "Timeline", "Todo",
    "Launch", "Staging", "Status", "Agenda", "Summary",
];

/// Keyword-driven analysis that runs without credentials or network
#[derive(Debug, Clone)]
pub struct LocalAnalyzer {
    max_action_items: usize,
    summary_max_chars: usize,
}

impl Default for LocalAnalyzer {
    fn default() -> Self {
        Self::new(&ProcessingConfig::default())
    }
}

impl LocalAnalyzer {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            max_action_items: config.max_action_items,
            summary_max_chars: config.summary_max_chars,
        }
    }

    pub fn analyze_text(&self, body: &str, metadata: &EmailMetadata) -> EmailAnalysis {
        EmailAnalysis {
            summary: EmailSummary {
                summary: self.summary(body, metadata),
                key_points: key_points(body),
                tone: tone(body).to_string(),
            },
            action_items: self.action_items(body),
            source: AnalysisSource::Fallback,
        }
    }

    fn summary(&self, body: &str, metadata: &EmailMetadata) -> String {
        let mut joined = String::new();
        for line in non_empty_lines(body) {
            if joined.chars().count() >= self.summary_max_chars {
                break;
            }
            if !joined.is_empty() {
                joined.push(' ');
            }
            joined.push_str(line);
        }

        if joined.is_empty() {
            return metadata
                .subject
                .clone()
                .unwrap_or_else(|| EMPTY_SUMMARY.to_string());
        }
        truncate_chars(&joined, self.summary_max_chars)
    }

    fn action_items(&self, body: &str) -> Vec<ActionItem> {
        non_empty_lines(body)
            .filter(|line| !line.ends_with(':'))
            .filter(|line| {
                RE_ACTION_KEYWORD.is_match(line)
                    || (RE_LIST_ITEM.is_match(line) && is_request(line))
            })
            .map(action_item_from_line)
            .take(self.max_action_items)
            .collect()
    }
}

#[async_trait]
impl EmailAnalyzer for LocalAnalyzer {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn analyze(&self, body: &str, metadata: &EmailMetadata) -> AppResult<EmailAnalysis> {
        Ok(self.analyze_text(body, metadata))
    }
}

fn non_empty_lines(body: &str) -> impl Iterator<Item = &str> {
    body.lines().map(str::trim).filter(|line| !line.is_empty())
}

fn strip_list_marker(line: &str) -> &str {
    match RE_LIST_ITEM.find(line) {
        Some(m) => line[m.end()..].trim(),
        None => line.trim(),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

fn key_points(body: &str) -> Vec<String> {
    let listed: Vec<String> = non_empty_lines(body)
        .filter(|line| RE_LIST_ITEM.is_match(line))
        .map(|line| strip_list_marker(line).to_string())
        .filter(|point| !point.is_empty())
        .take(KEY_POINT_COUNT)
        .collect();
    if !listed.is_empty() {
        return listed;
    }

    non_empty_lines(body)
        .take(KEY_POINT_COUNT)
        .map(str::to_string)
        .collect()
}

fn tone(body: &str) -> &'static str {
    if RE_URGENT_TONE.is_match(body) {
        "urgent"
    } else if RE_CASUAL_TONE.is_match(body) {
        "casual"
    } else if RE_FRIENDLY_TONE.is_match(body) && body.contains('!') {
        "friendly"
    } else {
        "professional"
    }
}

fn action_item_from_line(line: &str) -> ActionItem {
    let text = strip_list_marker(line);
    let assignee = assignee(text);
    let deadline = deadline_phrase(text);
    let confidence = match (assignee.is_some(), deadline.is_some()) {
        (true, true) => Confidence::High,
        (true, false) | (false, true) => Confidence::Medium,
        (false, false) => Confidence::Low,
    };

    ActionItem::new(text, assignee, deadline, confidence)
}

fn assignee(text: &str) -> Option<String> {
    if let Some(caps) = RE_NAME_PREFIX.captures(text) {
        let name = &caps[1];
        if !NOT_NAMES.contains(&name) {
            return Some(name.to_string());
        }
    }
    RE_MENTION.captures(text).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        email::{cleaner::clean_and_extract, samples::SAMPLE_EMAILS},
        model::analysis::{NO_DEADLINE, UNSPECIFIED_ASSIGNEE},
    };

    fn analyze(body: &str) -> EmailAnalysis {
        LocalAnalyzer::default().analyze_text(body, &EmailMetadata::default())
    }

    fn analyze_sample(key: &str) -> EmailAnalysis {
        let (metadata, body) = clean_and_extract(SAMPLE_EMAILS[key]);
        LocalAnalyzer::default().analyze_text(&body, &metadata)
    }

    #[test]
    fn test_summary_joins_leading_lines() {
        let analysis = analyze("Hi team,\n\nThe release is out.\nNotes follow.");
        assert_eq!(
            analysis.summary.summary,
            "Hi team, The release is out. Notes follow."
        );
        assert_eq!(analysis.source, AnalysisSource::Fallback);
    }

    #[test]
    fn test_summary_truncates_on_char_boundary() {
        let analyzer = LocalAnalyzer::new(&ProcessingConfig {
            summary_max_chars: 5,
            ..Default::default()
        });
        let analysis = analyzer.analyze_text("héllo wörld", &EmailMetadata::default());
        assert_eq!(analysis.summary.summary, "héllo...");

        let analysis = analyzer.analyze_text("short", &EmailMetadata::default());
        assert_eq!(analysis.summary.summary, "short");
    }

    #[test]
    fn test_empty_body_summary() {
        assert_eq!(analyze("").summary.summary, EMPTY_SUMMARY);

        let metadata = EmailMetadata {
            subject: Some("Quarterly numbers".to_string()),
            ..Default::default()
        };
        let analysis = LocalAnalyzer::default().analyze_text("  ", &metadata);
        assert_eq!(analysis.summary.summary, "Quarterly numbers");
        assert!(analysis.action_items.is_empty());
        assert!(analysis.summary.key_points.is_empty());
    }

    #[test]
    fn test_key_points_prefer_list_items() {
        let analysis = analyze("Agenda below.\n- First\n* Second\n3. Third\n- Fourth");
        assert_eq!(analysis.summary.key_points, vec!["First", "Second", "Third"]);

        let analysis = analyze("One.\nTwo.\nThree.\nFour.");
        assert_eq!(analysis.summary.key_points, vec!["One.", "Two.", "Three."]);
    }

    #[test]
    fn test_tone() {
        assert_eq!(tone("Please handle this ASAP"), "urgent");
        assert_eq!(tone("Hey, coffee later?"), "casual");
        assert_eq!(tone("Thanks so much for the help!"), "friendly");
        assert_eq!(tone("Thanks for the report."), "professional");
        assert_eq!(tone("The report is attached."), "professional");
    }

    #[test]
    fn test_action_item_confidence() {
        let analysis = analyze(
            "1. Alex - please review the projections by 5 PM today\n\
             Could you book the room?\n\
             Please ping @jordan about the invoice\n\
             We need to pick a venue by Friday",
        );
        let items = &analysis.action_items;
        assert_eq!(items.len(), 4);

        assert_eq!(items[0].text, "Alex - please review the projections by 5 PM today");
        assert_eq!(items[0].assignee, "Alex");
        assert_eq!(items[0].deadline, "5 PM today");
        assert_eq!(items[0].confidence, Confidence::High);

        assert_eq!(items[1].assignee, UNSPECIFIED_ASSIGNEE);
        assert_eq!(items[1].deadline, NO_DEADLINE);
        assert_eq!(items[1].confidence, Confidence::Low);

        assert_eq!(items[2].assignee, "jordan");
        assert_eq!(items[2].confidence, Confidence::Medium);

        assert_eq!(items[3].deadline, "Friday");
        assert_eq!(items[3].confidence, Confidence::Medium);
    }

    #[test]
    fn test_headings_and_non_names_are_skipped() {
        let analysis = analyze("Action items:\nNote: please send the draft");
        assert_eq!(analysis.action_items.len(), 1);
        assert_eq!(analysis.action_items[0].assignee, UNSPECIFIED_ASSIGNEE);
    }

    #[test]
    fn test_action_items_are_capped() {
        let body = (0..10)
            .map(|i| format!("Please file report {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(analyze(&body).action_items.len(), 5);
    }

    #[test]
    fn test_urgent_sample() {
        let analysis = analyze_sample("urgent_deadline");
        let assignees: Vec<_> = analysis
            .action_items
            .iter()
            .map(|item| item.assignee.as_str())
            .collect();

        assert_eq!(analysis.summary.tone, "urgent");
        assert!(assignees.contains(&"Alex"));
        assert!(assignees.contains(&"Maria"));
        assert!(assignees.contains(&"John"));
        assert!(analysis.action_items.len() <= 5);
    }

    #[test]
    fn test_casual_sample() {
        let analysis = analyze_sample("casual_quick");
        assert_eq!(analysis.summary.tone, "casual");
        assert!(!analysis.action_items.is_empty());
    }
}
