use std::borrow::Cow;

use html2text::render::text_renderer::TrivialDecorator;
use regex::Regex;

use super::metadata::{extract_metadata, EmailMetadata};

// Wide enough that html2text never wraps a paragraph on its own
const HTML_TEXT_WIDTH: usize = 1000;
/// A sign-off is only a signature when at most this many lines follow it
const MAX_SIGNATURE_TAIL: usize = 4;
// html2text slows down quadratically with nesting, past these limits tags are stripped instead
const MAX_HTML_DEPTH: usize = 200;
const MAX_HTML_BYTES: usize = 1024 * 1024;
const MAX_CLEAN_PASSES: usize = 4;
// Tags that never hold content, or that the parser closes on its own
const UNNESTED_TAGS: [&str; 14] = [
    "br", "hr", "img", "meta", "link", "input", "wbr", "col", "p", "li", "td", "th", "tr", "option",
];
const HTML_ENTITIES: [(&str, &str); 6] = [
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&amp;", "&"),
];

const RE_HTML_MARKER_STR: &str = r"(?i)<(html|body|br|p|div|table|span|td|li)\b";
const RE_HTML_NOISE_STR: &str = r"(?is)<!--.*?-->|<script\b.*?</script\s*>|<style\b.*?</style\s*>";
const RE_HEADER_LINE_STR: &str = r"(?i)^(subject|from|to|cc|bcc|date|reply-to|sent|message-id|mime-version|content-type|content-transfer-encoding|received|return-path|x-[a-z0-9-]+)\s*:";
const RE_REPLY_HEADER_STR: &str = r"(?i)^on\s.+\bwrote:$";
const RE_FORWARD_MARKER_STR: &str = r"(?i)^-+\s*(forwarded message|original message)\s*-+$";
const RE_SIGNATURE_SEPARATOR_STR: &str = r"^--\s*$";
const RE_SIGN_OFF_STR: &str = r"(?i)^(thanks|thank you|many thanks|best|best regards|kind regards|warm regards|regards|cheers|sincerely)\s*[,!.]?$";
const RE_MOBILE_FOOTER_STR: &str = r"(?i)^(sent from my \w+.*|get outlook for \w+.*)$";
const RE_INLINE_SPACE_STR: &str = r"[ \t]+";
const RE_HTML_TAG_STR: &str = r"<(/?)([a-zA-Z][a-zA-Z0-9]*)\b[^>]*?(/?)>";
const RE_HTML_BLOCK_BOUNDARY_STR: &str =
    r"(?i)<br\s*/?>|</?(p|div|blockquote|li|ul|ol|tr|table|h[1-6])\b[^>]*>";
const RE_ANY_TAG_STR: &str = r"(?s)<[^>]*>";

lazy_static::lazy_static!(
    static ref RE_HTML_MARKER: Regex = Regex::new(RE_HTML_MARKER_STR).unwrap();
    static ref RE_HTML_NOISE: Regex = Regex::new(RE_HTML_NOISE_STR).unwrap();
    static ref RE_HEADER_LINE: Regex = Regex::new(RE_HEADER_LINE_STR).unwrap();
    static ref RE_REPLY_HEADER: Regex = Regex::new(RE_REPLY_HEADER_STR).unwrap();
    static ref RE_FORWARD_MARKER: Regex = Regex::new(RE_FORWARD_MARKER_STR).unwrap();
    static ref RE_SIGNATURE_SEPARATOR: Regex = Regex::new(RE_SIGNATURE_SEPARATOR_STR).unwrap();
    static ref RE_SIGN_OFF: Regex = Regex::new(RE_SIGN_OFF_STR).unwrap();
    static ref RE_MOBILE_FOOTER: Regex = Regex::new(RE_MOBILE_FOOTER_STR).unwrap();
    static ref RE_INLINE_SPACE: Regex = Regex::new(RE_INLINE_SPACE_STR).unwrap();
    static ref RE_HTML_TAG: Regex = Regex::new(RE_HTML_TAG_STR).unwrap();
    static ref RE_HTML_BLOCK_BOUNDARY: Regex = Regex::new(RE_HTML_BLOCK_BOUNDARY_STR).unwrap();
    static ref RE_ANY_TAG: Regex = Regex::new(RE_ANY_TAG_STR).unwrap();
);

/// Extract metadata and the cleaned body in one pass over the raw text
pub fn clean_and_extract(raw: &str) -> (EmailMetadata, String) {
    let text = html_to_text(raw);
    let metadata = extract_metadata(&text);
    let mut body = clean_text(&text);

    // A pass can surface new noise, such as decoded entities that read as markup
    for _ in 0..MAX_CLEAN_PASSES {
        let next = clean_text(&html_to_text(&body));
        if next == body {
            break;
        }
        body = next;
    }

    (metadata, body)
}

/// Convert HTML to plain text, keeping block boundaries as line breaks.
/// Plain text is passed through untouched.
pub fn html_to_text(raw: &str) -> Cow<'_, str> {
    if !RE_HTML_MARKER.is_match(raw) {
        return Cow::Borrowed(raw);
    }
    let stripped = RE_HTML_NOISE.replace_all(raw, "");
    if stripped.len() > MAX_HTML_BYTES || nesting_depth(&stripped) > MAX_HTML_DEPTH {
        tracing::debug!("HTML too large or deep to render, stripping tags");
        return Cow::Owned(strip_tags(&stripped));
    }
    let text = html2text::from_read_with_decorator(
        stripped.as_bytes(),
        HTML_TEXT_WIDTH,
        TrivialDecorator::new(),
    );

    Cow::Owned(text)
}

/// Deepest element nesting, not counting tags that cannot hold children
fn nesting_depth(html: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0usize;
    for caps in RE_HTML_TAG.captures_iter(html) {
        let name = &caps[2];
        let self_closing = !caps[3].is_empty();
        if self_closing || UNNESTED_TAGS.iter().any(|tag| tag.eq_ignore_ascii_case(name)) {
            continue;
        }
        if caps[1].is_empty() {
            depth += 1;
            deepest = deepest.max(depth);
        } else {
            depth = depth.saturating_sub(1);
        }
    }
    deepest
}

/// Linear fallback for markup html2text would take too long on
fn strip_tags(html: &str) -> String {
    let text = RE_HTML_BLOCK_BOUNDARY.replace_all(html, "\n");
    let mut text = RE_ANY_TAG.replace_all(&text, "").into_owned();
    for (entity, decoded) in HTML_ENTITIES {
        text = text.replace(entity, decoded);
    }
    text
}

fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    // Collapsed first so sign-offs match however they were spaced
    let text = RE_INLINE_SPACE.replace_all(&text, " ");
    let lines: Vec<&str> = text.lines().collect();

    let lines = strip_header_block(lines);
    let lines = strip_quoted_replies(lines);
    let lines = strip_forward_markers(lines);
    let lines = strip_signature(lines);

    normalize_whitespace(&lines)
}

fn strip_header_block(lines: Vec<&str>) -> Vec<&str> {
    let start = lines
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(lines.len());

    let mut end = start;
    while end < lines.len() {
        let line = lines[end];
        let is_header = RE_HEADER_LINE.is_match(line.trim_start());
        // Folded continuation of the previous header
        let is_continuation =
            end > start && line.starts_with([' ', '\t']) && !line.trim().is_empty();
        if !(is_header || is_continuation) {
            break;
        }
        end += 1;
    }

    if end == start {
        return lines;
    }
    lines[end..].to_vec()
}

fn strip_quoted_replies(mut lines: Vec<&str>) -> Vec<&str> {
    if let Some(idx) = reply_header_start(&lines) {
        lines.truncate(idx);
    }
    lines.retain(|line| !line.trim_start().starts_with('>'));
    lines
}

/// `On <date>, <name> wrote:`, possibly wrapped over two lines
fn reply_header_start(lines: &[&str]) -> Option<usize> {
    lines.iter().enumerate().find_map(|(idx, line)| {
        let line = line.trim();
        if RE_REPLY_HEADER.is_match(line) {
            return Some(idx);
        }
        let starts_reply = line
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("on "));
        let wrapped = lines
            .get(idx + 1)
            .is_some_and(|next| next.trim().to_ascii_lowercase().ends_with("wrote:"));
        (starts_reply && wrapped && !line.ends_with('.')).then_some(idx)
    })
}

fn strip_forward_markers(lines: Vec<&str>) -> Vec<&str> {
    let mut kept = Vec::with_capacity(lines.len());
    let mut skipping = false;
    for line in lines {
        if RE_FORWARD_MARKER.is_match(line.trim()) {
            skipping = true;
            continue;
        }
        if skipping {
            if line.trim().is_empty() {
                skipping = false;
            } else {
                continue;
            }
        }
        kept.push(line);
    }
    kept
}

/// Drop separators, sign-offs and mobile footers until nothing changes
fn strip_signature(mut lines: Vec<&str>) -> Vec<&str> {
    loop {
        let before = lines.len();

        lines.retain(|line| !RE_MOBILE_FOOTER.is_match(line.trim()));
        if let Some(idx) = lines
            .iter()
            .position(|line| RE_SIGNATURE_SEPARATOR.is_match(line.trim_end()))
        {
            lines.truncate(idx);
        }
        if let Some(idx) = sign_off_start(&lines) {
            lines.truncate(idx);
        }

        if lines.len() == before {
            return lines;
        }
    }
}

fn sign_off_start(lines: &[&str]) -> Option<usize> {
    let mut tail = 0;
    let mut start = None;
    for (idx, line) in lines.iter().enumerate().rev() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if RE_SIGN_OFF.is_match(line) {
            start = Some(idx);
        }
        tail += 1;
        if tail > MAX_SIGNATURE_TAIL {
            break;
        }
    }
    start
}

fn normalize_whitespace(lines: &[&str]) -> String {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        let line = RE_INLINE_SPACE.replace_all(line.trim(), " ");
        if line.is_empty() && out.last().map_or(true, |prev| prev.is_empty()) {
            continue;
        }
        out.push(line.into_owned());
    }
    while out.last().is_some_and(|line| line.is_empty()) {
        out.pop();
    }
    out.join("\n")
}
