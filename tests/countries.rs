use food_insecurity_etl::{
    config::{AliasPair, PipelineConfig},
    countries::{AliasError, CountryAliases, TargetCountries},
};
use proptest::prelude::*;

fn pair(alias: &str, canonical: &str) -> AliasPair {
    AliasPair {
        alias: alias.to_string(),
        canonical: canonical.to_string(),
    }
}

#[test]
fn chained_aliases_are_rejected() {
    let err = CountryAliases::new(&[
        pair("Venezuela, RB", "Venezuela (Bolivarian Republic of)"),
        pair("Venezuela (Bolivarian Republic of)", "Venezuela"),
    ])
    .unwrap_err();
    assert!(matches!(err, AliasError::Chained { .. }));
}

#[test]
fn conflicting_aliases_are_rejected() {
    let err = CountryAliases::new(&[pair("Bahamas, The", "Bahamas"), pair("Bahamas, The", "The Bahamas")])
        .unwrap_err();
    assert_eq!(
        err,
        AliasError::Conflicting {
            alias: "Bahamas, The".into(),
            first: "Bahamas".into(),
            second: "The Bahamas".into(),
        }
    );
}

#[test]
fn default_alias_tables_map_onto_targets() {
    let config = PipelineConfig::default();
    let targets = TargetCountries::new(config.target_countries.iter().cloned());
    for table in [&config.aliases.world_bank, &config.aliases.fao] {
        for entry in table {
            assert!(
                targets.contains(&entry.canonical),
                "{} is not a target country",
                entry.canonical
            );
        }
    }
}

fn any_name() -> impl Strategy<Value = String> {
    let config = PipelineConfig::default();
    let mut known = config
        .aliases
        .fao
        .iter()
        .chain(&config.aliases.world_bank)
        .flat_map(|p| [p.alias.clone(), p.canonical.clone()])
        .collect::<Vec<_>>();
    known.push("Germany".to_string());
    prop_oneof![
        proptest::sample::select(known),
        "[A-Za-z ,()]{0,24}",
    ]
}

proptest! {
    #[test]
    fn normalization_is_idempotent(name in any_name()) {
        let config = PipelineConfig::default();
        for table in [&config.aliases.world_bank, &config.aliases.fao] {
            let aliases = CountryAliases::new(table).unwrap();
            let once = aliases.normalize(&name);
            prop_assert_eq!(aliases.normalize(&once), once.clone());
        }
    }
}
