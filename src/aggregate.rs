//! Combining adapter slices into the canonical long table and reshaping it
//! into the wide `Final_Pivoted` view.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use itertools::Itertools;
use log::info;
use thiserror::Error;

use crate::data::{CanonicalTable, IndicatorRecord, RecordKey};

const MAX_REPORTED_KEYS: usize = 10;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error(
        "{count} (Country, Year, Indicator) key(s) occur more than once, e.g. {}",
        join_keys(.sample)
    )]
    DuplicateKeys { count: usize, sample: Vec<RecordKey> },
}

fn join_keys(keys: &[RecordKey]) -> String {
    keys.iter().map(ToString::to_string).join(", ")
}

fn ensure_unique<'a, I>(records: I) -> Result<(), AggregateError>
where
    I: IntoIterator<Item = &'a IndicatorRecord>,
{
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for record in records {
        let key = record.key();
        if !seen.insert(key.clone()) {
            duplicates.insert(key);
        }
    }
    if duplicates.is_empty() {
        return Ok(());
    }
    Err(AggregateError::DuplicateKeys {
        count: duplicates.len(),
        sample: duplicates.into_iter().take(MAX_REPORTED_KEYS).collect(),
    })
}

/// Concatenates adapter slices into the `Final` table, sorted by
/// (Country, Year, Indicator). Overlapping keys between slices are fatal.
pub fn concat<I>(slices: I) -> Result<CanonicalTable, AggregateError>
where
    I: IntoIterator<Item = Vec<IndicatorRecord>>,
{
    let mut table = CanonicalTable::new(slices.into_iter().flatten().collect());
    ensure_unique(table.iter())?;
    table.sort_final();
    info!("Canonical table holds {} row(s)", table.len());
    Ok(table)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub country: String,
    pub year: i32,
    pub values: Vec<Option<f64>>,
}

/// One row per (Country, Year), one column per indicator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotedTable {
    pub indicators: Vec<String>,
    pub rows: Vec<PivotRow>,
}

impl PivotedTable {
    /// Back to long form, sorted like `Final`. Empty cells produce no row.
    pub fn melt(&self) -> CanonicalTable {
        let mut table = self
            .rows
            .iter()
            .flat_map(|row| {
                self.indicators
                    .iter()
                    .zip(&row.values)
                    .filter_map(move |(indicator, value)| {
                        value.map(|v| {
                            IndicatorRecord::new(
                                row.country.clone(),
                                row.year,
                                indicator.clone(),
                                Some(v),
                            )
                        })
                    })
            })
            .collect::<CanonicalTable>();
        table.sort_final();
        table
    }

    pub fn column_count(&self) -> usize {
        self.indicators.len() + 2
    }
}

pub fn pivot(table: &CanonicalTable) -> Result<PivotedTable, AggregateError> {
    ensure_unique(table.iter())?;

    let indicators = table
        .iter()
        .map(|r| r.indicator.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();
    let column_of = indicators
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect::<HashMap<_, _>>();

    let mut rows: BTreeMap<(&str, i32), Vec<Option<f64>>> = BTreeMap::new();
    for record in table.iter() {
        let cells = rows
            .entry((record.country.as_str(), record.year))
            .or_insert_with(|| vec![None; indicators.len()]);
        cells[column_of[record.indicator.as_str()]] = record.value;
    }

    let rows = rows
        .into_iter()
        .map(|((country, year), values)| PivotRow {
            country: country.to_string(),
            year,
            values,
        })
        .collect();
    Ok(PivotedTable { indicators, rows })
}
