//! Shape-changing helpers shared by the source adapters: wide-to-long melting,
//! unit suffixing, and summing finer-grained rows up to one value per
//! (Country, Indicator, Year).

use std::collections::BTreeMap;

use anyhow::Result;

use crate::{
    data::{IndicatorRecord, ValueParser},
    period::year_from_column,
    rows::RawTable,
};

/// One melted cell: the selected id columns of its source row plus the year
/// taken from the column header.
#[derive(Debug, Clone, PartialEq)]
pub struct MeltedCell {
    pub ids: Vec<String>,
    pub year: i32,
    pub value: Option<f64>,
}

/// Reshapes a table with one `Y{year}` column per year into one entry per
/// (row, year). Columns that are neither ids nor year headers are ignored,
/// which keeps bulk files with extra code columns readable.
pub fn melt_years(
    dataset: &str,
    table: &RawTable,
    id_columns: &[&str],
) -> Result<Vec<MeltedCell>> {
    let id_indices = id_columns
        .iter()
        .map(|name| table.require(name))
        .collect::<Result<Vec<_>>>()?;
    let year_columns = table
        .headers()
        .iter()
        .enumerate()
        .filter_map(|(idx, header)| year_from_column(header).map(|year| (idx, year)))
        .collect::<Vec<_>>();

    let mut values = ValueParser::default();
    let mut cells = Vec::with_capacity(table.len() * year_columns.len());
    for row in table.rows() {
        let ids = id_indices
            .iter()
            .map(|&idx| RawTable::cell(row, idx).to_string())
            .collect::<Vec<_>>();
        for &(idx, year) in &year_columns {
            cells.push(MeltedCell {
                ids: ids.clone(),
                year,
                value: values.parse(RawTable::cell(row, idx)),
            });
        }
    }
    values.report(dataset);
    Ok(cells)
}

pub fn with_unit(label: &str, unit: &str) -> String {
    let unit = unit.trim();
    if unit.is_empty() {
        label.to_string()
    } else {
        format!("{label} ({unit})")
    }
}

/// Sums values that share (Country, Indicator, Year). Missing values do not
/// contribute; a group with no values at all stays missing.
pub fn sum_by_key(records: Vec<IndicatorRecord>) -> Vec<IndicatorRecord> {
    let mut groups: BTreeMap<(String, String, i32), Option<f64>> = BTreeMap::new();
    for record in records {
        let slot = groups
            .entry((record.country, record.indicator, record.year))
            .or_insert(None);
        if let Some(value) = record.value {
            *slot = Some(slot.unwrap_or(0.0) + value);
        }
    }
    groups
        .into_iter()
        .map(|((country, indicator, year), value)| IndicatorRecord {
            country,
            year,
            indicator,
            value,
        })
        .collect()
}

/// Keeps the first record per (Country, Indicator, Year) and returns how many
/// later duplicates were discarded. Used where an upstream file repeats an
/// observation across secondary breakdowns that are not carried forward.
pub fn first_by_key(records: Vec<IndicatorRecord>) -> (Vec<IndicatorRecord>, usize) {
    let mut seen = std::collections::HashSet::new();
    let total = records.len();
    let kept = records
        .into_iter()
        .filter(|r| seen.insert((r.country.clone(), r.indicator.clone(), r.year)))
        .collect::<Vec<_>>();
    let dropped = total - kept.len();
    (kept, dropped)
}
