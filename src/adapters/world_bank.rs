//! World Bank indicator API (v2, JSON).
//!
//! Each configured indicator code is requested separately and paged until the
//! reported page count is reached. A page is a two-element JSON array: paging
//! metadata followed by the observations (or `null` when the indicator has no
//! data). Observations are flattened into a four-column raw table per
//! indicator before normalization.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow, bail};
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::{AdapterOutput, CountryScope, RawBatch, RawDataset, SourceAdapter};
use crate::{
    config::WorldBankConfig,
    data::{IndicatorRecord, ValueParser},
    fetch::Fetcher,
    rows::RawTable,
};

pub const SOURCE_TAG: &str = "WB";

const RAW_HEADERS: [&str; 4] = ["Country", "Country Code", "Year", "Value"];

#[derive(Debug, Deserialize)]
struct Observation {
    country: NamedRef,
    #[serde(default)]
    countryiso3code: Option<String>,
    date: String,
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    value: String,
}

#[derive(Debug)]
struct Page {
    pages: u64,
    observations: Vec<Observation>,
}

pub struct WorldBankAdapter {
    config: WorldBankConfig,
    scope: CountryScope,
    labels: HashMap<String, String>,
}

impl WorldBankAdapter {
    pub fn new(config: WorldBankConfig, scope: CountryScope) -> Self {
        let labels = config
            .indicators
            .iter()
            .map(|i| (i.code.clone(), format!("{SOURCE_TAG} {}", i.label)))
            .collect();
        Self {
            config,
            scope,
            labels,
        }
    }

    fn page_url(&self, code: &str, page: u64) -> String {
        format!(
            "{}/{code}?per_page={}&format=json&page={page}",
            self.config.base_url.trim_end_matches('/'),
            self.config.per_page
        )
    }

    fn fetch_indicator(&self, fetcher: &dyn Fetcher, code: &str) -> Result<RawTable> {
        let mut rows = Vec::new();
        let mut page = 1u64;
        loop {
            let url = self.page_url(code, page);
            let body = fetcher.fetch(&url)?;
            let parsed = parse_page(&body).with_context(|| format!("Parsing {url}"))?;
            for obs in parsed.observations {
                rows.push(vec![
                    obs.country.value,
                    obs.countryiso3code.unwrap_or_default(),
                    obs.date,
                    obs.value.map(|v| v.to_string()).unwrap_or_default(),
                ]);
            }
            if page >= parsed.pages {
                break;
            }
            page += 1;
        }
        Ok(RawTable::new(
            RAW_HEADERS.iter().map(|h| h.to_string()).collect(),
            rows,
        ))
    }
}

fn parse_page(body: &[u8]) -> Result<Page> {
    let json: JsonValue = serde_json::from_slice(body).context("Response is not JSON")?;
    let parts = json
        .as_array()
        .ok_or_else(|| anyhow!("Expected a JSON array response"))?;
    let meta = parts
        .first()
        .ok_or_else(|| anyhow!("Empty JSON array response"))?;
    if let Some(message) = meta.get("message") {
        bail!("API returned an error: {message}");
    }
    let pages = meta
        .get("pages")
        .and_then(json_u64)
        .ok_or_else(|| anyhow!("Paging metadata lacks 'pages'"))?;
    let observations = match parts.get(1) {
        Some(JsonValue::Null) | None => Vec::new(),
        Some(data) => serde_json::from_value(data.clone()).context("Decoding observations")?,
    };
    Ok(Page {
        pages,
        observations,
    })
}

/// The API reports some paging fields as numbers and others as strings.
fn json_u64(value: &JsonValue) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

impl SourceAdapter for WorldBankAdapter {
    fn id(&self) -> &str {
        "world-bank"
    }

    fn endpoints(&self) -> Vec<String> {
        self.config
            .indicators
            .iter()
            .map(|i| self.page_url(&i.code, 1))
            .collect()
    }

    fn fetch(&self, fetcher: &dyn Fetcher) -> Result<RawBatch> {
        let mut batch = RawBatch::default();
        let mut failed = Vec::new();
        for indicator in &self.config.indicators {
            let table = match self.fetch_indicator(fetcher, &indicator.code) {
                Ok(table) => table,
                Err(err) => {
                    warn!("Skipping World Bank indicator {}: {err:#}", indicator.code);
                    failed.push(indicator.code.as_str());
                    continue;
                }
            };
            info!(
                "World Bank {}: {} observation(s)",
                indicator.code,
                table.len()
            );
            batch.datasets.push(RawDataset {
                name: indicator.code.clone(),
                table,
            });
        }
        if batch.datasets.is_empty() && !failed.is_empty() {
            bail!(
                "Every World Bank indicator failed to download ({})",
                failed.join(", ")
            );
        }
        Ok(batch)
    }

    fn normalize(&self, batch: RawBatch) -> Result<AdapterOutput> {
        let mut output = AdapterOutput::default();
        for dataset in batch.datasets {
            let label = self
                .labels
                .get(&dataset.name)
                .ok_or_else(|| anyhow!("No label configured for indicator {}", dataset.name))?;
            let [country_idx, year_idx, value_idx] =
                dataset.table.require_all(["Country", "Year", "Value"])?;
            let mut values = ValueParser::default();
            let mut records = Vec::with_capacity(dataset.table.len());
            for row in dataset.table.rows() {
                let date = RawTable::cell(row, year_idx).trim();
                let Ok(year) = date.parse::<i32>() else {
                    warn!("{}: skipping non-annual date '{date}'", dataset.name);
                    continue;
                };
                records.push(IndicatorRecord {
                    country: RawTable::cell(row, country_idx).to_string(),
                    year,
                    indicator: label.clone(),
                    value: values.parse(RawTable::cell(row, value_idx)),
                });
            }
            values.report(&format!("{SOURCE_TAG} {}", dataset.name));
            self.scope
                .finish(&format!("{SOURCE_TAG} {}", dataset.name), records, &mut output);
        }
        Ok(output)
    }
}
