use std::{cmp::Ordering, fmt};

use log::warn;
use serde::{Deserialize, Serialize};

/// One observation in the canonical long format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndicatorRecord {
    pub country: String,
    pub year: i32,
    pub indicator: String,
    pub value: Option<f64>,
}

impl IndicatorRecord {
    pub fn new(
        country: impl Into<String>,
        year: i32,
        indicator: impl Into<String>,
        value: Option<f64>,
    ) -> Self {
        Self {
            country: country.into(),
            year,
            indicator: indicator.into(),
            value,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            country: self.country.clone(),
            year: self.year,
            indicator: self.indicator.clone(),
        }
    }

    /// Ordering used by the `Final` table.
    pub fn cmp_final(&self, other: &Self) -> Ordering {
        self.country
            .cmp(&other.country)
            .then(self.year.cmp(&other.year))
            .then_with(|| self.indicator.cmp(&other.indicator))
    }

    /// Ordering that lays each (Country, Indicator) series out chronologically.
    pub fn cmp_series(&self, other: &Self) -> Ordering {
        self.country
            .cmp(&other.country)
            .then_with(|| self.indicator.cmp(&other.indicator))
            .then(self.year.cmp(&other.year))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub country: String,
    pub year: i32,
    pub indicator: String,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.country, self.year, self.indicator)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalTable {
    pub records: Vec<IndicatorRecord>,
}

impl CanonicalTable {
    pub fn new(records: Vec<IndicatorRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn sort_final(&mut self) {
        self.records.sort_by(IndicatorRecord::cmp_final);
    }

    pub fn sort_series(&mut self) {
        self.records.sort_by(IndicatorRecord::cmp_series);
    }

    /// Explicit null filter: rows without a value are removed, zeros are kept.
    pub fn drop_missing(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.value.is_some());
        before - self.records.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndicatorRecord> {
        self.records.iter()
    }
}

impl FromIterator<IndicatorRecord> for CanonicalTable {
    fn from_iter<T: IntoIterator<Item = IndicatorRecord>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Static reference row for the `External_Sources` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalSource {
    pub source: String,
    pub url: String,
}

/// Parses upstream numeric cells for one dataset.
///
/// Blank cells and the usual missing-data spellings map to `None`. Text that is
/// neither missing nor numeric (FAOSTAT publishes values such as `<2.5`, and
/// drifted exports use `1,5`) is also treated as missing, never as zero and
/// never reinterpreted. Rejected cells are counted so a dataset logs one
/// summary line instead of one warning per cell.
#[derive(Debug, Default)]
pub struct ValueParser {
    rejected: usize,
    first_rejected: Option<String>,
}

impl ValueParser {
    pub fn parse(&mut self, raw: &str) -> Option<f64> {
        let trimmed = raw.trim();
        if is_missing_token(trimmed) {
            return None;
        }
        match trimmed.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => Some(parsed),
            _ => {
                self.rejected += 1;
                self.first_rejected.get_or_insert_with(|| trimmed.to_string());
                None
            }
        }
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn report(&self, dataset: &str) {
        if let Some(first) = &self.first_rejected {
            warn!(
                "{dataset}: treated {} non-numeric value(s) as missing (first: '{first}')",
                self.rejected
            );
        }
    }
}

fn is_missing_token(value: &str) -> bool {
    const MISSING: &[&str] = &["", "nan", "NaN", "NA", "N/A", "null", "NULL", "None", ".."];
    MISSING.contains(&value)
}

pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_distinguishes_zero_from_missing() {
        let mut values = ValueParser::default();
        assert_eq!(values.parse("0"), Some(0.0));
        assert_eq!(values.parse("0.0"), Some(0.0));
        assert_eq!(values.parse(""), None);
        assert_eq!(values.parse("nan"), None);
        assert_eq!(values.parse("  "), None);
        assert_eq!(values.rejected(), 0);
    }

    #[test]
    fn parse_rejects_flagged_and_comma_text() {
        let mut values = ValueParser::default();
        assert_eq!(values.parse("<2.5"), None);
        assert_eq!(values.parse("1,5"), None);
        assert_eq!(values.parse("1,234.5"), None);
        assert_eq!(values.parse("inf"), None);
        assert_eq!(values.parse("-3.25"), Some(-3.25));
        assert_eq!(values.rejected(), 4);
        assert_eq!(values.first_rejected.as_deref(), Some("<2.5"));
    }

    #[test]
    fn final_ordering_sorts_country_year_indicator() {
        let mut table = CanonicalTable::new(vec![
            IndicatorRecord::new("Peru", 2001, "WB b", Some(1.0)),
            IndicatorRecord::new("Brazil", 2002, "WB a", Some(1.0)),
            IndicatorRecord::new("Brazil", 2001, "WB b", Some(1.0)),
            IndicatorRecord::new("Brazil", 2001, "WB a", Some(1.0)),
        ]);
        table.sort_final();
        let keys = table
            .iter()
            .map(|r| (r.country.as_str(), r.year, r.indicator.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![
                ("Brazil", 2001, "WB a"),
                ("Brazil", 2001, "WB b"),
                ("Brazil", 2002, "WB a"),
                ("Peru", 2001, "WB b"),
            ]
        );
    }

    #[test]
    fn drop_missing_keeps_zero_values() {
        let mut table = CanonicalTable::new(vec![
            IndicatorRecord::new("Chile", 2010, "WB x", Some(0.0)),
            IndicatorRecord::new("Chile", 2011, "WB x", None),
        ]);
        assert_eq!(table.drop_missing(), 1);
        assert_eq!(table.records[0].value, Some(0.0));
    }

    #[test]
    fn format_value_keeps_float_shape() {
        assert_eq!(format_value(40.0), "40.0");
        assert_eq!(format_value(0.5), "0.5");
    }
}
