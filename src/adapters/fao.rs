//! FAOSTAT datasets.
//!
//! Two upstream shapes are handled here. The data API returns long CSV with a
//! `Year` column (sometimes a multi-year window); the bulk downloads are zip
//! archives holding one wide CSV with a `Y{year}` column per year, encoded as
//! latin1. Every emitted indicator carries the `FAO ` prefix.

use std::collections::HashMap;

use anyhow::{Context, Result};
use log::{info, warn};

use super::{AdapterOutput, CountryScope, RawBatch, SourceAdapter};
use crate::{
    config::{FaoBulk, FaoEmployment, FaoHouseholdSurveys, FaoQuery, FaoTrade},
    data::{IndicatorRecord, ValueParser},
    fetch::Fetcher,
    io_utils,
    period::{WindowRule, collapse_year, parse_survey_key},
    reshape::{first_by_key, melt_years, sum_by_key, with_unit},
    rows::RawTable,
};

pub const SOURCE_TAG: &str = "FAO";

fn tagged(label: &str) -> String {
    format!("{SOURCE_TAG} {label}")
}

fn fetch_api_csv(fetcher: &dyn Fetcher, url: &str) -> Result<RawTable> {
    let body = fetcher.fetch(url)?;
    io_utils::read_raw_table(&body, encoding_rs::UTF_8).with_context(|| format!("Parsing {url}"))
}

fn fetch_bulk_csv(fetcher: &dyn Fetcher, bulk: &FaoBulk) -> Result<RawTable> {
    let encoding = io_utils::resolve_encoding(Some(&bulk.encoding))?;
    let body = fetcher.fetch_zip_member(&bulk.url, &bulk.member)?;
    io_utils::read_raw_table(&body, encoding)
        .with_context(|| format!("Parsing {} from {}", bulk.member, bulk.url))
}

fn single_dataset(batch: RawBatch) -> RawTable {
    batch
        .datasets
        .into_iter()
        .next()
        .map(|d| d.table)
        .unwrap_or_default()
}

/// Long-format rows keyed by `Area`, `Year`, and `Value`, with the indicator
/// label derived per row. Rows whose year token cannot be collapsed are
/// skipped.
fn long_records(
    dataset: &str,
    table: &RawTable,
    rule: WindowRule,
    mut label_of: impl FnMut(&[String]) -> Option<String>,
) -> Result<Vec<IndicatorRecord>> {
    let [area_idx, year_idx, value_idx] = table.require_all(["Area", "Year", "Value"])?;
    let mut values = ValueParser::default();
    let mut records = Vec::with_capacity(table.len());
    for row in table.rows() {
        let Some(indicator) = label_of(row) else {
            continue;
        };
        let Some(year) = collapse_year(RawTable::cell(row, year_idx), rule) else {
            continue;
        };
        records.push(IndicatorRecord {
            country: RawTable::cell(row, area_idx).to_string(),
            year,
            indicator,
            value: values.parse(RawTable::cell(row, value_idx)),
        });
    }
    values.report(dataset);
    Ok(records)
}

/// Food security indicators (domain `FS`). 3-year averages are reported one
/// year after their window.
pub struct FoodSecurityAdapter {
    config: FaoQuery,
    scope: CountryScope,
}

impl FoodSecurityAdapter {
    pub fn new(config: FaoQuery, scope: CountryScope) -> Self {
        Self { config, scope }
    }
}

impl SourceAdapter for FoodSecurityAdapter {
    fn id(&self) -> &str {
        "fao-food-security"
    }

    fn endpoints(&self) -> Vec<String> {
        vec![self.config.url.clone()]
    }

    fn fetch(&self, fetcher: &dyn Fetcher) -> Result<RawBatch> {
        let table = fetch_api_csv(fetcher, &self.config.url)?;
        info!("FAO food security: {} row(s)", table.len());
        Ok(RawBatch::single("FAO FS", table))
    }

    fn normalize(&self, batch: RawBatch) -> Result<AdapterOutput> {
        let table = single_dataset(batch);
        let item_idx = table.require("Item")?;
        let items = &self.config.items;
        let records = long_records("FAO FS", &table, WindowRule::FollowingYear, |row| {
            let item = RawTable::cell(row, item_idx).trim();
            (items.is_empty() || items.iter().any(|i| i == item)).then(|| tagged(item))
        })?;
        let mut output = AdapterOutput::default();
        self.scope.finish("FAO FS", records, &mut output);
        Ok(output)
    }
}

/// Crops and livestock trade (bulk `TCL`). Values are summed across every
/// commodity item into one export and one import total per country and year.
pub struct TradeAdapter {
    config: FaoTrade,
    scope: CountryScope,
    labels: HashMap<String, String>,
}

impl TradeAdapter {
    pub fn new(config: FaoTrade, scope: CountryScope) -> Self {
        let labels = config
            .elements
            .iter()
            .map(|e| (e.element.clone(), e.label.clone()))
            .collect();
        Self {
            config,
            scope,
            labels,
        }
    }
}

impl SourceAdapter for TradeAdapter {
    fn id(&self) -> &str {
        "fao-trade"
    }

    fn endpoints(&self) -> Vec<String> {
        vec![format!("{} ({})", self.config.bulk.url, self.config.bulk.member)]
    }

    fn fetch(&self, fetcher: &dyn Fetcher) -> Result<RawBatch> {
        let table = fetch_bulk_csv(fetcher, &self.config.bulk)?;
        info!("FAO trade: {} row(s)", table.len());
        Ok(RawBatch::single("FAO TCL", table))
    }

    fn normalize(&self, batch: RawBatch) -> Result<AdapterOutput> {
        let mut table = single_dataset(batch);
        let element_idx = table.require("Element")?;
        table.retain(|row| self.labels.contains_key(RawTable::cell(row, element_idx).trim()));

        // Element and unit are fused into the label before summing, so rows
        // with different units never land in the same group.
        let records = melt_years("FAO TCL", &table, &["Area", "Element", "Unit"])?
            .into_iter()
            .filter(|cell| cell.value.is_some())
            .filter_map(|cell| {
                let [area, element, unit] = <[String; 3]>::try_from(cell.ids).ok()?;
                let label = self.labels.get(element.trim())?;
                Some(IndicatorRecord {
                    country: area,
                    year: cell.year,
                    indicator: tagged(&with_unit(label, &unit)),
                    value: cell.value,
                })
            })
            .collect::<Vec<_>>();

        let mut output = AdapterOutput::default();
        self.scope.finish("FAO TCL", sum_by_key(records), &mut output);
        Ok(output)
    }
}

/// Household survey indicators (domain `HS`). Country and period are encoded
/// together in the `Survey` column; survey windows report their final year.
pub struct HouseholdSurveyAdapter {
    config: FaoHouseholdSurveys,
    scope: CountryScope,
}

impl HouseholdSurveyAdapter {
    pub fn new(config: FaoHouseholdSurveys, scope: CountryScope) -> Self {
        Self { config, scope }
    }
}

impl SourceAdapter for HouseholdSurveyAdapter {
    fn id(&self) -> &str {
        "fao-household-surveys"
    }

    fn endpoints(&self) -> Vec<String> {
        vec![self.config.url.clone()]
    }

    fn fetch(&self, fetcher: &dyn Fetcher) -> Result<RawBatch> {
        let table = fetch_api_csv(fetcher, &self.config.url)?;
        info!("FAO household surveys: {} row(s)", table.len());
        Ok(RawBatch::single("FAO HS", table))
    }

    fn normalize(&self, batch: RawBatch) -> Result<AdapterOutput> {
        let table = single_dataset(batch);
        let [survey_idx, indicator_idx, value_idx] =
            table.require_all(["Survey", "Indicator", "Value"])?;
        let measure_idx = table.column_index("Measure");

        let mut values = ValueParser::default();
        let mut records = Vec::with_capacity(table.len());
        for row in table.rows() {
            let survey = RawTable::cell(row, survey_idx);
            let Some(key) = parse_survey_key(survey) else {
                warn!("Skipping survey row with unreadable identifier '{survey}'");
                continue;
            };
            let measure = measure_idx
                .map(|idx| RawTable::cell(row, idx).trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| self.config.default_measure.clone());
            let indicator = RawTable::cell(row, indicator_idx).trim();
            records.push(IndicatorRecord {
                country: key.country,
                year: key.year,
                indicator: tagged(&format!("{indicator} ({measure})")),
                value: values.parse(RawTable::cell(row, value_idx)),
            });
        }
        values.report("FAO HS");

        let mut output = AdapterOutput::default();
        self.scope.finish("FAO HS", records, &mut output);
        Ok(output)
    }
}

/// Rural employment indicators (bulk `OEA`).
pub struct EmploymentAdapter {
    config: FaoEmployment,
    scope: CountryScope,
}

impl EmploymentAdapter {
    pub fn new(config: FaoEmployment, scope: CountryScope) -> Self {
        Self { config, scope }
    }
}

impl SourceAdapter for EmploymentAdapter {
    fn id(&self) -> &str {
        "fao-employment"
    }

    fn endpoints(&self) -> Vec<String> {
        vec![format!("{} ({})", self.config.bulk.url, self.config.bulk.member)]
    }

    fn fetch(&self, fetcher: &dyn Fetcher) -> Result<RawBatch> {
        let table = fetch_bulk_csv(fetcher, &self.config.bulk)?;
        info!("FAO employment: {} row(s)", table.len());
        Ok(RawBatch::single("FAO OEA", table))
    }

    fn normalize(&self, batch: RawBatch) -> Result<AdapterOutput> {
        let mut table = single_dataset(batch);
        let indicator_idx = table.require("Indicator")?;
        let wanted = &self.config.indicators;
        table.retain(|row| {
            let indicator = RawTable::cell(row, indicator_idx).trim();
            wanted.iter().any(|w| w == indicator)
        });

        let records = melt_years("FAO OEA", &table, &["Area", "Indicator", "Unit"])?
            .into_iter()
            .filter_map(|cell| {
                let [area, indicator, unit] = <[String; 3]>::try_from(cell.ids).ok()?;
                Some(IndicatorRecord {
                    country: area,
                    year: cell.year,
                    indicator: tagged(&with_unit(indicator.trim(), &unit)),
                    value: cell.value,
                })
            })
            .filter(|r| r.value.is_some())
            .collect::<Vec<_>>();

        // The bulk file repeats series per survey source.
        let (records, dropped) = first_by_key(records);
        if dropped > 0 {
            warn!("FAO employment: discarded {dropped} repeated observation(s) from secondary sources");
        }

        let mut output = AdapterOutput::default();
        self.scope.finish("FAO OEA", records, &mut output);
        Ok(output)
    }
}

/// Agricultural emissions totals (domain `GT`). The element and its unit form
/// the indicator label.
pub struct EmissionsAdapter {
    config: FaoQuery,
    scope: CountryScope,
}

impl EmissionsAdapter {
    pub fn new(config: FaoQuery, scope: CountryScope) -> Self {
        Self { config, scope }
    }
}

impl SourceAdapter for EmissionsAdapter {
    fn id(&self) -> &str {
        "fao-emissions"
    }

    fn endpoints(&self) -> Vec<String> {
        vec![self.config.url.clone()]
    }

    fn fetch(&self, fetcher: &dyn Fetcher) -> Result<RawBatch> {
        let table = fetch_api_csv(fetcher, &self.config.url)?;
        info!("FAO emissions: {} row(s)", table.len());
        Ok(RawBatch::single("FAO GT", table))
    }

    fn normalize(&self, batch: RawBatch) -> Result<AdapterOutput> {
        let table = single_dataset(batch);
        let [element_idx, unit_idx] = table.require_all(["Element", "Unit"])?;
        let item_idx = table.column_index("Item");
        let items = &self.config.items;
        let records = long_records("FAO GT", &table, WindowRule::FollowingYear, |row| {
            if !items.is_empty() {
                let item = item_idx.map(|idx| RawTable::cell(row, idx).trim())?;
                if !items.iter().any(|i| i == item) {
                    return None;
                }
            }
            let element = RawTable::cell(row, element_idx).trim();
            Some(tagged(&with_unit(element, RawTable::cell(row, unit_idx))))
        })?;
        let mut output = AdapterOutput::default();
        self.scope.finish("FAO GT", records, &mut output);
        Ok(output)
    }
}
