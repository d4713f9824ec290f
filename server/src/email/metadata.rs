use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::dates::parse_header_date;

/// Only the leading block of the text is searched for headers
pub const HEADER_WINDOW: usize = 20;

lazy_static! {
    static ref RE_METADATA_LINE: Regex =
        Regex::new(r"(?i)^(subject|from|to|date)\s*:\s*(.*)$").unwrap();
    static ref RE_RECIPIENT_SEPARATOR: Regex = Regex::new(r"[,;]").unwrap();
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl EmailMetadata {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.from.is_none() && self.to.is_empty() && self.date.is_none()
    }

    /// The `Date` header as a calendar date, when it can be read
    pub fn reference_date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_header_date)
    }
}

/// Lines from the first non-blank line up to the next blank line
pub(crate) fn leading_block(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .skip_while(|line| line.trim().is_empty())
        .take_while(|line| !line.trim().is_empty())
        .take(HEADER_WINDOW)
}

/// Pull `Subject`, `From`, `To` and `Date` out of the leading header block.
/// The first occurrence of each label wins; missing labels stay unset.
pub fn extract_metadata(text: &str) -> EmailMetadata {
    let mut metadata = EmailMetadata::default();
    let mut seen_to = false;

    for line in leading_block(text) {
        let Some(caps) = RE_METADATA_LINE.captures(line.trim()) else {
            continue;
        };
        let value = caps[2].trim();
        if value.is_empty() {
            continue;
        }

        match caps[1].to_ascii_lowercase().as_str() {
            "subject" if metadata.subject.is_none() => metadata.subject = Some(value.to_string()),
            "from" if metadata.from.is_none() => metadata.from = Some(value.to_string()),
            "date" if metadata.date.is_none() => metadata.date = Some(value.to_string()),
            "to" if !seen_to => {
                seen_to = true;
                metadata.to = split_recipients(value);
            }
            _ => {}
        }
    }

    metadata
}

fn split_recipients(value: &str) -> Vec<String> {
    RE_RECIPIENT_SEPARATOR
        .split(value)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}
