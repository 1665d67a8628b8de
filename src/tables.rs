//! Schemas and row builders for the four output tables.

use anyhow::{Context, Result};

use crate::{
    aggregate::PivotedTable,
    category::CategorizedRecord,
    data::{CanonicalTable, ExternalSource, IndicatorRecord, ValueParser},
    rows::RawTable,
    sink::{Cell, ColumnSpec},
};

pub const FINAL: &str = "Final";
pub const FINAL_PIVOTED: &str = "Final_Pivoted";
pub const FULL_INDICATOR_DATA: &str = "Full_Indicator_Data";
pub const EXTERNAL_SOURCES: &str = "External_Sources";

const COUNTRY_LEN: usize = 100;
const INDICATOR_LEN: usize = 500;
const CATEGORY_LEN: usize = 100;
const SOURCE_LEN: usize = 500;

fn long_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::text("Country", COUNTRY_LEN),
        ColumnSpec::integer("Year"),
        ColumnSpec::text("Indicator", INDICATOR_LEN),
        ColumnSpec::float("Value"),
    ]
}

pub fn final_columns() -> Vec<ColumnSpec> {
    long_columns()
}

pub fn final_rows(table: &CanonicalTable) -> Vec<Vec<Cell>> {
    table
        .iter()
        .map(|r| {
            vec![
                Cell::Text(r.country.clone()),
                Cell::Integer(i64::from(r.year)),
                Cell::Text(r.indicator.clone()),
                Cell::from(r.value),
            ]
        })
        .collect()
}

/// Reads a previously written `Final` table back into canonical form.
pub fn canonical_from_raw(table: &RawTable) -> Result<CanonicalTable> {
    let [country_idx, year_idx, indicator_idx, value_idx] =
        table.require_all(["Country", "Year", "Indicator", "Value"])?;
    let mut values = ValueParser::default();
    let canonical = table
        .rows()
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let year = RawTable::cell(row, year_idx);
            let year = year
                .trim()
                .parse::<i32>()
                .with_context(|| format!("Row {}: invalid Year '{year}'", idx + 1))?;
            Ok(IndicatorRecord {
                country: RawTable::cell(row, country_idx).to_string(),
                year,
                indicator: RawTable::cell(row, indicator_idx).to_string(),
                value: values.parse(RawTable::cell(row, value_idx)),
            })
        })
        .collect::<Result<CanonicalTable>>()?;
    values.report("Final");
    Ok(canonical)
}

pub fn pivoted_columns(table: &PivotedTable) -> Vec<ColumnSpec> {
    let mut columns = vec![
        ColumnSpec::text("Country", COUNTRY_LEN),
        ColumnSpec::integer("Year"),
    ];
    columns.extend(table.indicators.iter().map(ColumnSpec::float));
    columns
}

pub fn pivoted_rows(table: &PivotedTable) -> Vec<Vec<Cell>> {
    table
        .rows
        .iter()
        .map(|row| {
            let mut cells = Vec::with_capacity(row.values.len() + 2);
            cells.push(Cell::Text(row.country.clone()));
            cells.push(Cell::Integer(i64::from(row.year)));
            cells.extend(row.values.iter().map(|v| Cell::from(*v)));
            cells
        })
        .collect()
}

pub fn full_columns() -> Vec<ColumnSpec> {
    let mut columns = long_columns();
    columns.extend([
        ColumnSpec::float("Difference"),
        ColumnSpec::float("AbsDiff"),
        ColumnSpec::float("Rank"),
        ColumnSpec::text("Category", CATEGORY_LEN),
    ]);
    columns
}

pub fn full_rows(records: &[CategorizedRecord]) -> Vec<Vec<Cell>> {
    records
        .iter()
        .map(|r| {
            let ranked = &r.ranked;
            vec![
                Cell::Text(ranked.country.clone()),
                Cell::Integer(i64::from(ranked.year)),
                Cell::Text(ranked.indicator.clone()),
                Cell::from(ranked.value),
                Cell::Float(ranked.difference),
                Cell::Float(ranked.abs_diff),
                Cell::Float(ranked.rank),
                Cell::Text(r.category.clone()),
            ]
        })
        .collect()
}

pub fn external_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::text("Source", SOURCE_LEN),
        ColumnSpec::text("URL", SOURCE_LEN),
    ]
}

pub fn external_rows(sources: &[ExternalSource]) -> Vec<Vec<Cell>> {
    sources
        .iter()
        .map(|s| vec![Cell::Text(s.source.clone()), Cell::Text(s.url.clone())])
        .collect()
}
