//! Heuristic normalization of scraped date text.
//!
//! News sites publish dates in wildly inconsistent shapes: `"Apr 12, 2025,
//! 09:14 PM IST"`, `"2 hours ago"`, `"Updated: 12 April 2025"`, RFC-5322
//! strings out of feeds, bare ISO timestamps. [`normalize`] converts any of
//! them into a calendar date, or `None` when nothing recognizable is found.
//!
//! The policy is deliberately best-effort rather than exact: a fixed list of
//! formats is tried in order after some light cleanup, and a last-resort
//! check accepts "today" when today's year, month name, and day number all
//! appear in the text. That last heuristic can false-positive on pages that
//! happen to mention the current date (a copyright year next to an unrelated
//! day number), which is an accepted approximation — tightening it would
//! silently drop valid same-day articles in unanticipated formats.
//!
//! Only the date portion is ever used; downstream stages compare by
//! calendar-day equality against the run's "today", never by timestamp.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Any of these words means the text is a relative reference to today.
const RELATIVE_TODAY_WORDS: &[&str] = &["hour", "minute", "today", "just now"];

/// Label prefixes stripped before parsing (lowercase, longest first).
const LABEL_PREFIXES: &[&str] = &["updated :", "published :", "updated:", "published:"];

/// A trailing all-caps token like `IST`, `GMT`, `PDT`. AM/PM are excluded:
/// they are part of twelve-hour times, not timezones.
static TRAILING_TZ_ABBREV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+[A-Z]{2,4}$").expect("valid regex"));

/// Fixed formats tried in order, most common first. The flag marks formats
/// that carry a time component and must parse as a datetime.
const FORMATS: &[(&str, bool)] = &[
    ("%b %d, %Y", false),
    ("%d %b %Y", false),
    ("%B %d, %Y", false),
    ("%d %B %Y", false),
    ("%Y-%m-%d", false),
    ("%d-%m-%Y", false),
    ("%m/%d/%Y", false),
    ("%d/%m/%Y", false),
    // With time; the time part is discarded.
    ("%a, %d %b %Y %H:%M:%S", true), // RFC-5322-like, common in feeds and meta tags
    ("%Y-%m-%dT%H:%M:%S", true),
    ("%b %d, %Y, %I:%M %p", true),
    ("%B %d, %Y %I:%M %p", true),
    ("%d %b %Y %H:%M", true),
    // Less common
    ("%Y%m%d", false),
    ("%Y-%m-%dT%H:%M:%S%.fZ", true),
];

/// Normalize a scraped date string into a calendar date.
///
/// `context` names the source (and extraction site) for diagnostics;
/// `today` is the run's fixed start date.
///
/// Returns `None` when the text is empty, explicitly says "yesterday"
/// (yesterday is never accepted, even though it is resolvable — a deliberate
/// same-day filter, not a parsing gap), or defeats every format and the
/// today-components fallback.
pub fn normalize(text: &str, context: &str, today: NaiveDate) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();

    if RELATIVE_TODAY_WORDS.iter().any(|w| lower.contains(w)) {
        return Some(today);
    }
    if lower.contains("yesterday") {
        debug!(source = context, text = trimmed, "Rejecting yesterday-dated text");
        return None;
    }

    let mut cleaned = trimmed.to_string();
    for prefix in LABEL_PREFIXES {
        if let Some(head) = cleaned.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                cleaned = cleaned[prefix.len()..].trim().to_string();
                break;
            }
        }
    }
    cleaned = strip_timezone_abbrev(&cleaned);
    cleaned = strip_offset_token(&cleaned);

    if let Some(date) = try_formats(&cleaned) {
        return Some(date);
    }

    if today_components_present(&cleaned.to_lowercase(), today) {
        warn!(
            source = context,
            original = trimmed,
            "Fallback date match on today's components"
        );
        return Some(today);
    }

    debug!(
        source = context,
        original = trimmed,
        cleaned = %cleaned,
        "Failed to normalize date text"
    );
    None
}

/// Drop a trailing all-caps timezone abbreviation (`IST`, `GMT`, ...).
fn strip_timezone_abbrev(text: &str) -> String {
    if let Some(m) = TRAILING_TZ_ABBREV.find(text) {
        let token = m.as_str().trim_start();
        if token != "AM" && token != "PM" {
            return text[..m.start()].to_string();
        }
    }
    text.to_string()
}

/// Drop a trailing numeric UTC-offset token such as `+0530`.
///
/// A 5-character digits-and-dashes token is kept: it could be part of a
/// date rather than an offset.
fn strip_offset_token(text: &str) -> String {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() > 1 {
        let last = parts[parts.len() - 1];
        let offset_like = last.starts_with('+') || (last.starts_with('-') && !last.contains(':'));
        let date_like =
            last.len() == 5 && last.chars().filter(|c| *c != '-').all(|c| c.is_ascii_digit());
        if offset_like && !date_like {
            return parts[..parts.len() - 1].join(" ");
        }
    }
    text.to_string()
}

/// Try the fixed format list against the cleaned text.
///
/// Each attempt is also retried against the substring before the first comma
/// and the substring before a literal `T`, to tolerate a trailing time
/// component the primary attempt didn't strip.
fn try_formats(cleaned: &str) -> Option<NaiveDate> {
    for (fmt, has_time) in FORMATS {
        // The plain ISO format tolerates a trailing `Z` the format string
        // doesn't mention.
        let candidate = if *fmt == "%Y-%m-%dT%H:%M:%S" {
            cleaned.strip_suffix('Z').unwrap_or(cleaned)
        } else {
            cleaned
        };

        if let Some(date) = parse_with(candidate, fmt, *has_time) {
            return Some(date);
        }

        if let Some((before_comma, _)) = candidate.split_once(',') {
            if let Some(date) = parse_with(before_comma.trim(), fmt, *has_time) {
                return Some(date);
            }
        }
        if let Some((before_t, rest)) = candidate.split_once('T') {
            if !rest.is_empty() {
                if let Some(date) = parse_with(before_t, "%Y-%m-%d", false) {
                    return Some(date);
                }
            }
        }
    }
    None
}

fn parse_with(text: &str, fmt: &str, has_time: bool) -> Option<NaiveDate> {
    if has_time {
        NaiveDateTime::parse_from_str(text, fmt).ok().map(|dt| dt.date())
    } else {
        NaiveDate::parse_from_str(text, fmt).ok()
    }
}

/// Last-resort check: today's year, month name (short or long), and day
/// number all appear as recognizable tokens.
fn today_components_present(lower: &str, today: NaiveDate) -> bool {
    let year = today.format("%Y").to_string();
    let month_short = today.format("%b").to_string().to_lowercase();
    let month_long = today.format("%B").to_string().to_lowercase();
    let day = today.day().to_string();

    lower.contains(&year)
        && (lower.contains(&month_short) || lower.contains(&month_long))
        && (lower.contains(&format!(" {day} "))
            || lower.contains(&format!(" {day},"))
            || lower.ends_with(&format!(" {day}")))
}
