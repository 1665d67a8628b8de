//! Source adapters.
//!
//! Each adapter owns one upstream dataset and turns it into a canonical
//! `(Country, Year, Indicator, Value)` slice. Adapters share no state; they are
//! independent implementations of [`SourceAdapter`] composed into a registry by
//! [`default_registry()`].

pub mod fao;
pub mod world_bank;

use std::{collections::BTreeMap, sync::Arc};

use anyhow::{Context, Result};
use log::debug;

use crate::{
    config::{AliasPair, PipelineConfig},
    countries::{CountryAliases, TargetCountries},
    data::IndicatorRecord,
    fetch::Fetcher,
    rows::RawTable,
};

/// Raw rows for one adapter, split into named datasets (one per upstream
/// request or file).
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    pub datasets: Vec<RawDataset>,
}

#[derive(Debug, Clone)]
pub struct RawDataset {
    pub name: String,
    pub table: RawTable,
}

impl RawBatch {
    pub fn single(name: impl Into<String>, table: RawTable) -> Self {
        Self {
            datasets: vec![RawDataset {
                name: name.into(),
                table,
            }],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdapterOutput {
    pub records: Vec<IndicatorRecord>,
    /// Target countries with no data, per dataset. Diagnostic only.
    pub missing_countries: BTreeMap<String, Vec<String>>,
}

pub trait SourceAdapter: Send + Sync {
    /// Stable identifier, also used to select adapters from the CLI.
    fn id(&self) -> &str;

    /// Upstream locations this adapter reads from.
    fn endpoints(&self) -> Vec<String>;

    fn fetch(&self, fetcher: &dyn Fetcher) -> Result<RawBatch>;

    fn normalize(&self, batch: RawBatch) -> Result<AdapterOutput>;

    fn run(&self, fetcher: &dyn Fetcher) -> Result<AdapterOutput> {
        let batch = self
            .fetch(fetcher)
            .with_context(|| format!("Fetching data for adapter '{}'", self.id()))?;
        self.normalize(batch)
            .with_context(|| format!("Normalizing data for adapter '{}'", self.id()))
    }
}

/// The per-source country handling every adapter applies before emitting:
/// null filter, renaming, missing-country check, then the target filter.
#[derive(Debug, Clone)]
pub struct CountryScope {
    aliases: CountryAliases,
    targets: Arc<TargetCountries>,
}

impl CountryScope {
    pub fn new(aliases: &[AliasPair], targets: Arc<TargetCountries>) -> Result<Self> {
        Ok(Self {
            aliases: CountryAliases::new(aliases).context("Building country alias table")?,
            targets,
        })
    }

    pub fn finish(
        &self,
        dataset: &str,
        records: Vec<IndicatorRecord>,
        output: &mut AdapterOutput,
    ) {
        let total = records.len();
        let renamed = records
            .into_iter()
            .filter(|r| r.value.is_some())
            .map(|mut r| {
                r.country = self.aliases.normalize(&r.country);
                r
            })
            .collect::<Vec<_>>();
        let with_values = renamed.len();

        let missing = self
            .targets
            .missing_from(renamed.iter().map(|r| r.country.as_str()));
        output.missing_countries.insert(dataset.to_string(), missing);

        let before = output.records.len();
        output.records.extend(
            renamed
                .into_iter()
                .filter(|r| self.targets.contains(&r.country)),
        );
        debug!(
            "{dataset}: {total} row(s) read, {with_values} with values, {} kept for target countries",
            output.records.len() - before
        );
    }
}

pub fn default_registry(config: &PipelineConfig) -> Result<Vec<Box<dyn SourceAdapter>>> {
    let targets = Arc::new(TargetCountries::new(config.target_countries.iter().cloned()));
    let wb_scope = CountryScope::new(&config.aliases.world_bank, Arc::clone(&targets))?;
    let fao_scope = CountryScope::new(&config.aliases.fao, Arc::clone(&targets))?;

    Ok(vec![
        Box::new(world_bank::WorldBankAdapter::new(
            config.world_bank.clone(),
            wb_scope,
        )),
        Box::new(fao::FoodSecurityAdapter::new(
            config.fao.food_security.clone(),
            fao_scope.clone(),
        )),
        Box::new(fao::TradeAdapter::new(
            config.fao.trade.clone(),
            fao_scope.clone(),
        )),
        Box::new(fao::HouseholdSurveyAdapter::new(
            config.fao.household_surveys.clone(),
            fao_scope.clone(),
        )),
        Box::new(fao::EmploymentAdapter::new(
            config.fao.employment.clone(),
            fao_scope.clone(),
        )),
        Box::new(fao::EmissionsAdapter::new(
            config.fao.emissions.clone(),
            fao_scope,
        )),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> CountryScope {
        CountryScope::new(
            &[AliasPair {
                alias: "Bahamas, The".to_string(),
                canonical: "Bahamas".to_string(),
            }],
            Arc::new(TargetCountries::new(["Bahamas", "Chile", "Peru"])),
        )
        .unwrap()
    }

    #[test]
    fn finish_renames_before_filtering() {
        let mut output = AdapterOutput::default();
        scope().finish(
            "test",
            vec![
                IndicatorRecord::new("Bahamas, The", 2010, "WB x", Some(1.0)),
                IndicatorRecord::new("Germany", 2010, "WB x", Some(2.0)),
                IndicatorRecord::new("Chile", 2010, "WB x", None),
                IndicatorRecord::new("Chile", 2011, "WB x", Some(0.0)),
            ],
            &mut output,
        );
        let countries = output
            .records
            .iter()
            .map(|r| r.country.as_str())
            .collect::<Vec<_>>();
        assert_eq!(countries, vec!["Bahamas", "Chile"]);
        assert_eq!(output.records[1].value, Some(0.0));
        assert_eq!(output.missing_countries["test"], vec!["Peru"]);
    }

    #[test]
    fn registry_lists_every_source() {
        let registry = default_registry(&PipelineConfig::default()).unwrap();
        let ids = registry.iter().map(|a| a.id()).collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec![
                "world-bank",
                "fao-food-security",
                "fao-trade",
                "fao-household-surveys",
                "fao-employment",
                "fao-emissions",
            ]
        );
    }
}
