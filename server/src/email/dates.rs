use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Weekday};
use lazy_static::lazy_static;
use regex::Regex;

const MONTHS: &str = r"jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";
const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

// A year-less date more than this far in the past is read as next year's
const YEAR_ROLLOVER_DAYS: i64 = 180;
// Distances assumed when there is no calendar to measure against
const UNDATED_WEEK_DAYS: i64 = 3;
const UNDATED_EXPLICIT_DAYS: i64 = 8;

const HEADER_DATETIME_FORMATS: [&str; 3] =
    ["%d %b %Y %H:%M:%S", "%d %b %Y %H:%M", "%Y-%m-%d %H:%M:%S"];
const HEADER_DATE_FORMATS: [&str; 5] = ["%d %b %Y", "%b %d, %Y", "%B %d, %Y", "%Y-%m-%d", "%m/%d/%Y"];

lazy_static! {
    static ref RE_WEEKDAY_PREFIX: Regex =
        Regex::new(r"(?i)^(mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+").unwrap();
    static ref RE_SAME_DAY: Regex = Regex::new(
        r"(?i)\b(today|tonight|end of (the )?day|eod|cob|close of business|this (morning|afternoon|evening))\b"
    )
    .unwrap();
    static ref RE_TOMORROW: Regex = Regex::new(r"(?i)\btomorrow\b").unwrap();
    static ref RE_THIS_WEEK: Regex = Regex::new(r"(?i)\b(this|end of (the )?) ?week\b").unwrap();
    static ref RE_NEXT_WEEK: Regex = Regex::new(r"(?i)\bnext week\b").unwrap();
    static ref RE_WEEKDAY: Regex =
        Regex::new(r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b").unwrap();
    static ref RE_MONTH_DAY: Regex = Regex::new(&format!(
        r"(?i)\b({MONTHS})[a-z]*\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s+(\d{{4}}))?"
    ))
    .unwrap();
    static ref RE_DAY_MONTH: Regex = Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTHS})[a-z]*\.?(?:,?\s+(\d{{4}}))?\b"
    ))
    .unwrap();
    static ref RE_NUMERIC_DATE: Regex =
        Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2}|\d{4}))?\b").unwrap();
    static ref RE_ISO_DATE: Regex = Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap();
    static ref RE_DEADLINE_PHRASE: Regex = Regex::new(&format!(
        r"(?i)\b(?:by|before|until|due)\s+((?:the\s+)?end of (?:the\s+)?(?:day|week|month)|eod|cob|today|tonight|tomorrow|this week|next week|(?:next\s+)?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)|\d{{1,2}}(?::\d{{2}})?\s*(?:am|pm)(?:\s+(?:today|tomorrow|tonight))?|(?:{MONTHS})[a-z]*\.?\s+\d{{1,2}}(?:st|nd|rd|th)?(?:,?\s+\d{{4}})?|\d{{1,2}}/\d{{1,2}}(?:/\d{{2,4}})?)"
    ))
    .unwrap();
    static ref RE_BARE_DEADLINE: Regex = Regex::new(
        r"(?i)\b(today|tonight|tomorrow|end of (?:the )?day|eod|this week|next week)\b"
    )
    .unwrap();
}

/// Best-effort parse of a `Date:` header value.
///
/// Weekday prefixes are dropped before the fallback formats are tried, so a
/// header whose weekday disagrees with its date still parses.
pub fn parse_header_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    let stripped = RE_WEEKDAY_PREFIX.replace(value, "");
    let stripped = stripped.trim();
    for fmt in HEADER_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(stripped, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in HEADER_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(stripped, fmt) {
            return Some(date);
        }
    }

    // Trailing time zones and comments: retry on the leading date tokens
    let leading = stripped
        .split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join(" ");
    HEADER_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&leading, fmt).ok())
}

/// Smallest number of days between `reference` and any time expression in
/// `text`. Expressions that resolve to the past are ignored.
pub fn days_until_nearest(text: &str, reference: NaiveDate) -> Option<i64> {
    let mut distances = relative_distances(text);

    for caps in RE_WEEKDAY.captures_iter(text) {
        if let Some(target) = weekday_from_name(&caps[1]) {
            distances.push(days_to_weekday(reference, target));
        }
    }

    for caps in RE_MONTH_DAY.captures_iter(text) {
        let month = month_from_name(&caps[1]);
        let day = caps[2].parse::<u32>().ok();
        let year = caps.get(3).and_then(|y| y.as_str().parse::<i32>().ok());
        distances.extend(month.zip(day).and_then(|(m, d)| resolve(reference, year, m, d)));
    }

    for caps in RE_DAY_MONTH.captures_iter(text) {
        let day = caps[1].parse::<u32>().ok();
        let month = month_from_name(&caps[2]);
        let year = caps.get(3).and_then(|y| y.as_str().parse::<i32>().ok());
        distances.extend(month.zip(day).and_then(|(m, d)| resolve(reference, year, m, d)));
    }

    for caps in RE_NUMERIC_DATE.captures_iter(text) {
        let month = caps[1].parse::<u32>().ok();
        let day = caps[2].parse::<u32>().ok();
        let year = caps.get(3).and_then(|y| parse_year(y.as_str()));
        distances.extend(month.zip(day).and_then(|(m, d)| resolve(reference, year, m, d)));
    }

    for caps in RE_ISO_DATE.captures_iter(text) {
        let year = caps[1].parse::<i32>().ok();
        let month = caps[2].parse::<u32>().ok();
        let day = caps[3].parse::<u32>().ok();
        distances.extend(month.zip(day).and_then(|(m, d)| resolve(reference, year, m, d)));
    }

    distances.into_iter().filter(|d| *d >= 0).min()
}

/// Like [`days_until_nearest`] for text with no reference day.
///
/// Only the wording counts: weekdays read as later this week and explicit
/// calendar dates as a fixed distance, so the result never depends on the
/// current date.
pub fn days_until_nearest_undated(text: &str) -> Option<i64> {
    let mut distances = relative_distances(text);
    if RE_WEEKDAY.is_match(text) {
        distances.push(UNDATED_WEEK_DAYS);
    }
    let explicit = [&*RE_MONTH_DAY, &*RE_DAY_MONTH, &*RE_NUMERIC_DATE, &*RE_ISO_DATE]
        .iter()
        .any(|re| re.is_match(text));
    if explicit {
        distances.push(UNDATED_EXPLICIT_DAYS);
    }

    distances.into_iter().min()
}

fn relative_distances(text: &str) -> Vec<i64> {
    [
        (&*RE_SAME_DAY, 0),
        (&*RE_TOMORROW, 1),
        (&*RE_THIS_WEEK, UNDATED_WEEK_DAYS),
        (&*RE_NEXT_WEEK, 7),
    ]
    .into_iter()
    .filter(|(re, _)| re.is_match(text))
    .map(|(_, days)| days)
    .collect()
}

/// The deadline a single line of text mentions, as written
pub fn deadline_phrase(line: &str) -> Option<String> {
    if let Some(caps) = RE_DEADLINE_PHRASE.captures(line) {
        return Some(caps[1].trim().to_string());
    }
    RE_BARE_DEADLINE
        .captures(line)
        .map(|caps| caps[1].trim().to_string())
}

fn resolve(reference: NaiveDate, year: Option<i32>, month: u32, day: u32) -> Option<i64> {
    let date = match year {
        Some(year) => NaiveDate::from_ymd_opt(year, month, day)?,
        None => {
            let date = NaiveDate::from_ymd_opt(reference.year(), month, day)?;
            if (reference - date).num_days() > YEAR_ROLLOVER_DAYS {
                NaiveDate::from_ymd_opt(reference.year() + 1, month, day)?
            } else {
                date
            }
        }
    };
    let days = (date - reference).num_days();
    (days >= 0).then_some(days)
}

fn parse_year(value: &str) -> Option<i32> {
    let year = value.parse::<i32>().ok()?;
    Some(if value.len() == 2 { 2000 + year } else { year })
}

fn month_from_name(name: &str) -> Option<u32> {
    let prefix = name.get(..3)?.to_ascii_lowercase();
    MONTHS
        .split('|')
        .position(|m| m == prefix)
        .map(|idx| idx as u32 + 1)
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    let name = name.to_ascii_lowercase();
    WEEKDAYS
        .iter()
        .find(|(day, _)| *day == name)
        .map(|(_, weekday)| *weekday)
}

fn days_to_weekday(reference: NaiveDate, target: Weekday) -> i64 {
    let from = reference.weekday().num_days_from_monday() as i64;
    let to = target.num_days_from_monday() as i64;
    (to - from).rem_euclid(7)
}
