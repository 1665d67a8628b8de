//! Year token parsing.
//!
//! Upstream time axes come in several shapes: bulk-download column headers
//! (`Y2004`), plain years (`2004`), multi-year windows (`2001-2003`) and survey
//! identifiers that embed the country (`Ghana - 1998-1999`). Windows collapse
//! to a single representative year under one of two conventions, and the
//! choice matters because downstream joins key on the year.

use std::sync::OnceLock;

use log::warn;
use regex::Regex;

/// How a multi-year window collapses to one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRule {
    /// 3-year averages are reported as the year after the window (`2001-2003` -> 2004).
    FollowingYear,
    /// Survey windows are reported as their last year (`1998-1999` -> 1999).
    WindowEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyKey {
    pub country: String,
    pub year: i32,
}

fn year_column_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Y(\d{4})$").expect("valid year column regex"))
}

/// Year encoded in a bulk-download column header such as `Y2004`.
pub fn year_from_column(header: &str) -> Option<i32> {
    year_column_regex()
        .captures(header.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Collapses a year or window token.
///
/// Returns `None` (after logging) when the token is neither a year nor a
/// two-part window; the caller decides whether to skip the row.
pub fn collapse_year(token: &str, rule: WindowRule) -> Option<i32> {
    let trimmed = token.trim();
    if let Ok(year) = trimmed.parse::<i32>() {
        return Some(year);
    }
    let parts = trimmed.split('-').map(str::trim).collect::<Vec<_>>();
    if parts.len() != 2 {
        warn!("Skipping malformed year token '{trimmed}'");
        return None;
    }
    let (Ok(start), Ok(end)) = (parts[0].parse::<i32>(), parts[1].parse::<i32>()) else {
        warn!("Skipping malformed year window '{trimmed}'");
        return None;
    };
    if end < start {
        warn!("Year window '{trimmed}' ends before it starts");
    }
    Some(match rule {
        WindowRule::FollowingYear => end + 1,
        WindowRule::WindowEnd => end,
    })
}

/// Splits a survey identifier into country and year.
///
/// The identifier is `{country} - {year}` or `{country} - {year}-{year}`.
/// Country names may themselves contain hyphens (`Guinea-Bissau - 2010`), so
/// every token before the first numeric one belongs to the country and the
/// rest is the period, collapsed with [`WindowRule::WindowEnd`].
pub fn parse_survey_key(raw: &str) -> Option<SurveyKey> {
    let tokens = raw.split('-').map(str::trim).collect::<Vec<_>>();
    let Some(first_numeric) = tokens
        .iter()
        .position(|token| !token.is_empty() && token.parse::<i32>().is_ok())
    else {
        warn!("Survey identifier '{raw}' carries no year");
        return None;
    };
    let country = tokens[..first_numeric]
        .iter()
        .filter(|t| !t.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-");
    if country.is_empty() {
        warn!("Survey identifier '{raw}' carries no country");
        return None;
    }
    let year = collapse_year(&tokens[first_numeric..].join("-"), WindowRule::WindowEnd)?;
    Some(SurveyKey { country, year })
}
