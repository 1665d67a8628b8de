//! Country name reconciliation and the target-country filter.
//!
//! Upstream sources spell the same country differently (`Venezuela, RB`,
//! `Venezuela (Bolivarian Republic of)`). Each adapter owns a
//! [`CountryAliases`] table that maps its spellings onto the canonical names
//! used by [`TargetCountries`]. Renaming must run before filtering, otherwise
//! valid countries published under a non-canonical name are dropped.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::config::AliasPair;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AliasError {
    #[error("Alias '{alias}' maps to '{canonical}', which is itself aliased to '{next}'")]
    Chained {
        alias: String,
        canonical: String,
        next: String,
    },
    #[error("Alias '{alias}' is mapped to both '{first}' and '{second}'")]
    Conflicting {
        alias: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CountryAliases {
    map: HashMap<String, String>,
}

impl CountryAliases {
    /// Builds the lookup, rejecting tables that would make renaming
    /// non-idempotent (a canonical name that is itself an alias).
    pub fn new(pairs: &[AliasPair]) -> Result<Self, AliasError> {
        let mut map: HashMap<String, String> = HashMap::with_capacity(pairs.len());
        for pair in pairs {
            let alias = pair.alias.trim().to_string();
            let canonical = pair.canonical.trim().to_string();
            if let Some(existing) = map.get(&alias)
                && existing != &canonical
            {
                return Err(AliasError::Conflicting {
                    alias,
                    first: existing.clone(),
                    second: canonical,
                });
            }
            map.insert(alias, canonical);
        }
        for (alias, canonical) in &map {
            if let Some(next) = map.get(canonical)
                && next != canonical
            {
                return Err(AliasError::Chained {
                    alias: alias.clone(),
                    canonical: canonical.clone(),
                    next: next.clone(),
                });
            }
        }
        Ok(Self { map })
    }

    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        match self.map.get(trimmed) {
            Some(canonical) => canonical.clone(),
            None => trimmed.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TargetCountries {
    ordered: Vec<String>,
    members: BTreeSet<String>,
}

impl TargetCountries {
    pub fn new<I, S>(countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut members = BTreeSet::new();
        for country in countries {
            let country = country.into();
            if members.insert(country.clone()) {
                ordered.push(country);
            }
        }
        Self { ordered, members }
    }

    pub fn contains(&self, country: &str) -> bool {
        self.members.contains(country)
    }

    /// Target countries absent from `present`, in configured order.
    pub fn missing_from<'a, I>(&self, present: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let seen = present.into_iter().collect::<BTreeSet<_>>();
        self.ordered
            .iter()
            .filter(|country| !seen.contains(country.as_str()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(values: &[(&str, &str)]) -> Vec<AliasPair> {
        values
            .iter()
            .map(|(a, c)| AliasPair {
                alias: a.to_string(),
                canonical: c.to_string(),
            })
            .collect()
    }

    #[test]
    fn normalize_maps_aliases_and_passes_others_through() {
        let aliases = CountryAliases::new(&pairs(&[("Venezuela, RB", "Venezuela")])).unwrap();
        assert_eq!(aliases.normalize("Venezuela, RB"), "Venezuela");
        assert_eq!(aliases.normalize("Peru"), "Peru");
        assert_eq!(aliases.normalize(" Peru "), "Peru");
    }

    #[test]
    fn chained_aliases_are_rejected() {
        let err = CountryAliases::new(&pairs(&[("A", "B"), ("B", "C")])).unwrap_err();
        assert!(matches!(err, AliasError::Chained { .. }));
    }

    #[test]
    fn conflicting_aliases_are_rejected() {
        let err = CountryAliases::new(&pairs(&[("A", "B"), ("A", "C")])).unwrap_err();
        assert!(matches!(err, AliasError::Conflicting { .. }));
    }

    #[test]
    fn missing_from_preserves_configured_order() {
        let targets = TargetCountries::new(["Peru", "Chile", "Cuba"]);
        assert_eq!(targets.missing_from(["Chile"]), vec!["Peru", "Cuba"]);
        assert!(targets.contains("Cuba"));
        assert!(!targets.contains("Germany"));
    }
}
