use std::collections::{BTreeSet, HashMap};

use log::warn;
use serde::Serialize;

use crate::{config::CategoryConfig, ranking::RankedRecord};

pub const UNCATEGORIZED: &str = "None";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedRecord {
    #[serde(flatten)]
    pub ranked: RankedRecord,
    pub category: String,
}

/// Immutable Indicator → Category lookup.
#[derive(Debug, Clone, Default)]
pub struct CategoryTagger {
    categories: HashMap<String, String>,
}

impl CategoryTagger {
    pub fn from_config(config: &[CategoryConfig]) -> Self {
        let categories = config
            .iter()
            .flat_map(|c| {
                c.indicators
                    .iter()
                    .map(move |indicator| (indicator.clone(), c.category.clone()))
            })
            .collect();
        Self { categories }
    }

    pub fn category_of(&self, indicator: &str) -> &str {
        self.categories
            .get(indicator)
            .map(String::as_str)
            .unwrap_or(UNCATEGORIZED)
    }

    /// Attaches a category to every row. Rows whose indicator has no category
    /// are kept with `None`; their indicators are returned and logged once.
    pub fn tag(&self, ranked: Vec<RankedRecord>) -> (Vec<CategorizedRecord>, BTreeSet<String>) {
        let mut unmatched = BTreeSet::new();
        let tagged = ranked
            .into_iter()
            .map(|record| {
                let category = match self.categories.get(&record.indicator) {
                    Some(category) => category.clone(),
                    None => {
                        if !unmatched.contains(&record.indicator) {
                            warn!("No category configured for indicator '{}'", record.indicator);
                            unmatched.insert(record.indicator.clone());
                        }
                        UNCATEGORIZED.to_string()
                    }
                };
                CategorizedRecord {
                    ranked: record,
                    category,
                }
            })
            .collect();
        (tagged, unmatched)
    }
}
