//! Pipeline configuration: target countries, alias tables, upstream endpoints,
//! the indicator category map, and the external reference list.
//!
//! Every hand-maintained enumeration the pipeline depends on lives here as
//! plain data. [`PipelineConfig::default()`] carries the built-in values; a
//! YAML file with the same shape can replace any section at startup. Components
//! receive the parts they need at construction and turn them into immutable
//! lookup structures.

use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::data::ExternalSource;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub target_countries: Vec<String>,
    pub aliases: AliasConfig,
    pub world_bank: WorldBankConfig,
    pub fao: FaoConfig,
    pub categories: Vec<CategoryConfig>,
    pub external_sources: Vec<ExternalSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AliasPair {
    pub alias: String,
    pub canonical: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AliasConfig {
    pub world_bank: Vec<AliasPair>,
    pub fao: Vec<AliasPair>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldBankConfig {
    /// Base of the indicator endpoint; the code and query are appended.
    pub base_url: String,
    pub per_page: usize,
    pub indicators: Vec<WorldBankIndicator>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorldBankIndicator {
    pub code: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaoConfig {
    pub food_security: FaoQuery,
    pub trade: FaoTrade,
    pub household_surveys: FaoHouseholdSurveys,
    pub employment: FaoEmployment,
    pub emissions: FaoQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaoQuery {
    pub url: String,
    /// Item names to keep; empty keeps every item in the response.
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaoBulk {
    pub url: String,
    /// CSV member extracted from the downloaded archive.
    pub member: String,
    /// Text encoding label of the member (FAOSTAT bulk files are latin1).
    pub encoding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaoTrade {
    #[serde(flatten)]
    pub bulk: FaoBulk,
    pub elements: Vec<TradeElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TradeElement {
    pub element: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaoHouseholdSurveys {
    pub url: String,
    /// Measure label used when the response carries no `Measure` column.
    pub default_measure: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaoEmployment {
    #[serde(flatten)]
    pub bulk: FaoBulk,
    pub indicators: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryConfig {
    pub category: String,
    pub indicators: Vec<String>,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config
            .validate()
            .with_context(|| format!("Validating config {path:?}"))?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = self.to_yaml()?;
        let mut file =
            File::create(path).with_context(|| format!("Creating config file {path:?}"))?;
        file.write_all(serialized.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing config to YAML")
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.target_countries.is_empty(),
            "At least one target country must be configured"
        );
        let mut seen = HashSet::new();
        for category in &self.categories {
            for indicator in &category.indicators {
                ensure!(
                    seen.insert(indicator.as_str()),
                    "Indicator '{indicator}' is assigned to more than one category"
                );
            }
        }
        ensure!(
            self.world_bank.per_page > 0,
            "world_bank.per_page must be positive"
        );
        Ok(())
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn alias_pairs(pairs: &[(&str, &str)]) -> Vec<AliasPair> {
    pairs
        .iter()
        .map(|(alias, canonical)| AliasPair {
            alias: alias.to_string(),
            canonical: canonical.to_string(),
        })
        .collect()
}

const TARGET_COUNTRIES: &[&str] = &[
    "Argentina",
    "Brazil",
    "Mexico",
    "El Salvador",
    "Haiti",
    "Colombia",
    "Peru",
    "Venezuela",
    "Guatemala",
    "Honduras",
    "Nicaragua",
    "Bolivia",
    "Chile",
    "Ecuador",
    "Paraguay",
    "Uruguay",
    "Belize",
    "Costa Rica",
    "Dominica",
    "Jamaica",
    "Panama",
    "Antigua and Barbuda",
    "Bahamas",
    "Barbados",
    "Cuba",
    "Grenada",
    "Guyana",
    "St. Kitts and Nevis",
    "St. Lucia",
    "St. Vincent and the Grenadines",
    "Suriname",
    "Trinidad and Tobago",
    "Dominican Republic",
];

const WORLD_BANK_INDICATORS: &[(&str, &str)] = &[
    (
        "SI.POV.MDIM",
        "Multidimensional poverty headcount ratio (% of total population)",
    ),
    ("SL.AGR.EMPL.ZS", "Employment in Agriculture"),
    ("SI.POV.GINI", "Gini Index (WB estimate)"),
    (
        "SI.POV.MDIM.17",
        "Multidimensional Poverty Headcount Ratio, children (% of population ages 0-17)",
    ),
    (
        "SI.POV.MDIM.FE",
        "Multidimensional poverty headcount ratio, female (% of female population)",
    ),
    (
        "SN.ITK.SVFI.ZS",
        "Prevalence of severe food insecurity in the population (%)",
    ),
    (
        "SN.ITK.MSFI.ZS",
        "Prevalence of moderate or severe food insecurity in the population (%)",
    ),
    (
        "per_sa_allsa.adq_pop_tot",
        "Adequacy of social safety net programs (% of total welfare of beneficiary households)",
    ),
    ("SI.DST.10TH.10", "Income share held by highest 10%"),
    ("SI.DST.05TH.20", "Income share held by highest 20%"),
    ("SI.DST.FRST.10", "Income share held by lowest 10%"),
    ("SI.DST.FRST.20", "Income share held by lowest 20%"),
    (
        "BX.TRF.PWKR.DT.GD.ZS",
        "Personal remittances, received (% of GDP)",
    ),
    (
        "SI.POV.NAHC",
        "Poverty headcount ratio at national poverty lines (% of population)",
    ),
    (
        "NV.AGR.TOTL.ZS",
        "Agriculture, forestry, and fishing, value added (% of GDP)",
    ),
    (
        "AG.LND.IRIG.AG.ZS",
        "Agricultural irrigated land (% of total agricultural land)",
    ),
    (
        "per_lm_alllm.adq_pop_tot",
        "Adequacy of unemployment benefits and ALMP (% of total welfare of beneficiary households)",
    ),
    (
        "NY.ADJ.NNTY.PC.KD.ZG",
        "Adjusted net national income per capita (annual % growth)",
    ),
    (
        "SL.AGR.EMPL.FE.ZS",
        "Employment in agriculture - female (% of female employment) (modeled ILO estimate)",
    ),
    (
        "NV.AGR.TOTL.KD.ZG",
        "Agriculture, forestry, and fishing, value added (annual % growth)",
    ),
    ("TX.VAL.FOOD.ZS.UN", "Food exports (% of merchandise exports)"),
    ("TM.VAL.FOOD.ZS.UN", "Food imports (% of merchandise imports)"),
    (
        "PA.NUS.FCRF",
        "Official exchange rate (LCU per US$, period average)",
    ),
    (
        "ER.H2O.FWAG.ZS",
        "Annual freshwater withdrawals, agriculture (% of total freshwater withdrawal)",
    ),
];

const FOOD_SECURITY_ITEMS: &[&str] = &[
    "Average dietary energy supply adequacy (percent) (3-year average)",
    "Average protein supply (g/cap/day) (3-year average)",
    "Cereal import dependency ratio (percent) (3-year average)",
    "Share of dietary energy supply derived from cereals, roots and tubers (kcal/cap/day) (3-year average)",
    "Per capita food supply variability (kcal/cap/day)",
    "Per capita food production variability (constant 2004-2006 thousand int$ per capita)",
    "Percentage of population using at least basic drinking water services (percent)",
    "Prevalence of anemia among women of reproductive age (15-49 years)",
    "Prevalence of low birthweight (percent)",
    "Prevalence of obesity in the adult population (18 years and older)",
    "Percentage of children under 5 years affected by wasting (percent)",
    "Percentage of children under 5 years of age who are overweight (percent)",
    "Percentage of children under 5 years of age who are stunted (percent)",
];

const WORLD_BANK_CATEGORY: &[&str] = &[
    "WB Official exchange rate (LCU per US$, period average)",
    "WB Food exports (% of merchandise exports)",
    "WB Food imports (% of merchandise imports)",
    "WB Agriculture, forestry, and fishing, value added (% of GDP)",
    "WB Agriculture, forestry, and fishing, value added (annual % growth)",
    "WB Personal remittances, received (% of GDP)",
    "WB Annual freshwater withdrawals, agriculture (% of total freshwater withdrawal)",
    "WB Adjusted net national income per capita (annual % growth)",
    "WB Gini Index (WB estimate)",
    "WB Income share held by highest 10%",
    "WB Income share held by highest 20%",
    "WB Income share held by lowest 10%",
    "WB Income share held by lowest 20%",
    "WB Employment in Agriculture",
    "WB Employment in agriculture - female (% of female employment) (modeled ILO estimate)",
    "WB Agricultural irrigated land (% of total agricultural land)",
    "WB Adequacy of social safety net programs (% of total welfare of beneficiary households)",
    "WB Adequacy of unemployment benefits and ALMP (% of total welfare of beneficiary households)",
    "WB Prevalence of moderate or severe food insecurity in the population (%)",
    "WB Prevalence of severe food insecurity in the population (%)",
    "WB Poverty headcount ratio at national poverty lines (% of population)",
    "WB Multidimensional Poverty Headcount Ratio, children (% of population ages 0-17)",
    "WB Multidimensional poverty headcount ratio (% of total population)",
    "WB Multidimensional poverty headcount ratio, female (% of female population)",
];

const FAO_CATEGORY: &[&str] = &[
    "FAO Crop and livestock exports - quantity (tonnes)",
    "FAO Crop and livestock exports - value (1000 US$)",
    "FAO Crop and livestock imports - quantity (tonnes)",
    "FAO Crop and livestock imports - value (1000 US$)",
    "FAO Per capita food supply variability (kcal/cap/day)",
    "FAO Percentage of population using at least basic drinking water services (percent)",
    "FAO Prevalence of anemia among women of reproductive age (15-49 years)",
    "FAO Prevalence of low birthweight (percent)",
    "FAO Prevalence of obesity in the adult population (18 years and older)",
    "FAO Per capita food production variability (constant 2004-2006 thousand int$ per capita)",
    "FAO Average dietary energy supply adequacy (percent) (3-year average)",
    "FAO Average protein supply (g/cap/day) (3-year average)",
    "FAO Cereal import dependency ratio (percent) (3-year average)",
    "FAO Share of dietary energy supply derived from cereals, roots and tubers (kcal/cap/day) (3-year average)",
    "FAO Percentage of children under 5 years affected by wasting (percent)",
    "FAO Percentage of children under 5 years of age who are overweight (percent)",
    "FAO Percentage of children under 5 years of age who are stunted (percent)",
    "FAO Employment-to-population ratio, rural areas (%)",
    "FAO Employment-to-population ratio, rural areas, female (%)",
    "FAO Share of food consumption in total income (Engel ratio) (mean)",
];

const EXTERNAL_SOURCES: &[(&str, &str)] = &[
    (
        "FAO Price Warnings",
        "http://www.fao.org/giews/food-prices/price-warnings/en/",
    ),
    (
        "WFP Food Price Alert",
        "https://dataviz.vam.wfp.org/economic_explorer/price-forecasts-alerts?adm0=108",
    ),
    ("WFP Hunger Map", "https://hungermap.wfp.org/"),
    (
        "IPC Population",
        "http://www.ipcinfo.org/ipc-country-analysis/population-tracking-tool/en/",
    ),
    (
        "IMF CPI - All Items",
        "https://data.imf.org/regular.aspx?key=61015894",
    ),
    (
        "ND-GAIN Vulnerability Index",
        "https://gain.nd.edu/our-work/country-index/rankings/",
    ),
    (
        "WB Logistics Performance Index Score",
        "https://lpi.worldbank.org/international/aggregated-ranking",
    ),
    (
        "IMF Unemployment Rate",
        "https://www.imf.org/external/datamapper/LUR@WEO/CZE",
    ),
    (
        "IMF GDP Per Capita",
        "https://www.imf.org/external/datamapper/PPPPC@WEO/OEMDC/ADVEC/WEOWORLD",
    ),
];

const FAOSTAT_API: &str = "http://fenixservices.fao.org/faostat/api/v1/en/data";
const FAOSTAT_BULK: &str = "http://fenixservices.fao.org/faostat/static/bulkdownloads";

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_countries: strings(TARGET_COUNTRIES),
            aliases: AliasConfig::default_tables(),
            world_bank: WorldBankConfig::default(),
            fao: FaoConfig::default(),
            categories: vec![
                CategoryConfig {
                    category: "World Bank".to_string(),
                    indicators: strings(WORLD_BANK_CATEGORY),
                },
                CategoryConfig {
                    category: "FAO".to_string(),
                    indicators: strings(FAO_CATEGORY),
                },
            ],
            external_sources: EXTERNAL_SOURCES
                .iter()
                .map(|(source, url)| ExternalSource {
                    source: source.to_string(),
                    url: url.to_string(),
                })
                .collect(),
        }
    }
}

impl AliasConfig {
    fn default_tables() -> Self {
        Self {
            world_bank: alias_pairs(&[
                ("Venezuela, RB", "Venezuela"),
                ("Bahamas, The", "Bahamas"),
            ]),
            fao: alias_pairs(&[
                ("Venezuela (Bolivarian Republic of)", "Venezuela"),
                ("Bolivia (Plurinational State of)", "Bolivia"),
                ("Saint Kitts and Nevis", "St. Kitts and Nevis"),
                ("Saint Lucia", "St. Lucia"),
                (
                    "Saint Vincent and the Grenadines",
                    "St. Vincent and the Grenadines",
                ),
            ]),
        }
    }
}

impl Default for WorldBankConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api.worldbank.org/v2/country/all/indicator".to_string(),
            per_page: 20_000,
            indicators: WORLD_BANK_INDICATORS
                .iter()
                .map(|(code, label)| WorldBankIndicator {
                    code: code.to_string(),
                    label: label.to_string(),
                })
                .collect(),
        }
    }
}

impl Default for FaoConfig {
    fn default() -> Self {
        Self {
            food_security: FaoQuery {
                url: format!("{FAOSTAT_API}/FS?show_codes=true&show_unit=true&null_values=false&output_type=csv"),
                items: strings(FOOD_SECURITY_ITEMS),
            },
            trade: FaoTrade {
                bulk: FaoBulk {
                    url: format!("{FAOSTAT_BULK}/Trade_CropsLivestock_E_All_Data.zip"),
                    member: "Trade_Crops_Livestock_E_All_Data_NOFLAG.csv".to_string(),
                    encoding: "latin1".to_string(),
                },
                elements: vec![
                    TradeElement {
                        element: "Export Value".to_string(),
                        label: "Crop and livestock exports - value".to_string(),
                    },
                    TradeElement {
                        element: "Import Value".to_string(),
                        label: "Crop and livestock imports - value".to_string(),
                    },
                ],
            },
            household_surveys: FaoHouseholdSurveys {
                url: format!(
                    "{FAOSTAT_API}/HS?breakdownvar=2307&breakdownsex=20000&indicator=6067&measure=6076&show_codes=true&show_unit=true&show_flags=true&null_values=false&output_type=csv"
                ),
                default_measure: "mean".to_string(),
            },
            employment: FaoEmployment {
                bulk: FaoBulk {
                    url: format!("{FAOSTAT_BULK}/Employment_Indicators_E_All_Data.zip"),
                    member: "Employment_Indicators_E_All_Data_NOFLAG.csv".to_string(),
                    encoding: "latin1".to_string(),
                },
                indicators: strings(&[
                    "Employment-to-population ratio, rural areas",
                    "Employment-to-population ratio, rural areas, female",
                ]),
            },
            emissions: FaoQuery {
                url: format!(
                    "{FAOSTAT_API}/GT?area_cs=FAO&element=7231&item=1711&show_codes=true&show_unit=true&show_flags=true&null_values=false&output_type=csv"
                ),
                items: Vec::new(),
            },
        }
    }
}
