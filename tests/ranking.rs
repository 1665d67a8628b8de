use std::collections::BTreeMap;

use food_insecurity_etl::{
    data::{CanonicalTable, IndicatorRecord},
    ranking::{average_ranks, correct_degenerate, rank_changes, rel_diff},
};
use proptest::prelude::*;

#[test]
fn identical_magnitudes_collapse_to_rank_one() {
    assert_eq!(
        correct_degenerate(average_ranks(&[5.0, 5.0, 5.0])),
        vec![1.0, 1.0, 1.0]
    );
    assert_eq!(
        correct_degenerate(average_ranks(&[1.0, 2.0, 3.0])),
        vec![1.0, 2.0, 3.0]
    );
}

#[test]
fn missing_neighbours_yield_zero_difference() {
    let table = CanonicalTable::new(vec![
        IndicatorRecord::new("Peru", 2000, "WB x", Some(10.0)),
        IndicatorRecord::new("Peru", 2001, "WB x", None),
        IndicatorRecord::new("Peru", 2002, "WB x", Some(12.0)),
    ]);
    let ranked = rank_changes(&table);
    assert!(ranked.iter().all(|r| r.difference == 0.0));
}

#[test]
fn series_are_separated_by_country_and_indicator() {
    let table = CanonicalTable::new(vec![
        IndicatorRecord::new("Chile", 2000, "WB x", Some(1.0)),
        IndicatorRecord::new("Peru", 2001, "WB x", Some(4.0)),
        IndicatorRecord::new("Chile", 2001, "WB y", Some(2.0)),
    ]);
    let ranked = rank_changes(&table);
    assert_eq!(ranked.len(), 3);
    assert!(ranked.iter().all(|r| r.difference == 0.0 && r.rank == 1.0));
}

proptest! {
    #[test]
    fn rel_diff_is_antisymmetric_and_bounded(
        a in -1.0e6f64..1.0e6,
        b in -1.0e6f64..1.0e6
    ) {
        prop_assert_eq!(rel_diff(a, b), -rel_diff(b, a));
        prop_assert!(rel_diff(a, b).abs() <= 2.0);
    }

    #[test]
    fn average_ranks_preserve_rank_total(
        values in proptest::collection::vec(0u8..5, 1..24)
    ) {
        let values = values.into_iter().map(f64::from).collect::<Vec<_>>();
        let ranks = average_ranks(&values);
        let n = values.len() as f64;
        prop_assert_eq!(ranks.iter().sum::<f64>(), n * (n + 1.0) / 2.0);
        for (i, a) in values.iter().enumerate() {
            for (j, b) in values.iter().enumerate() {
                if a < b {
                    prop_assert!(ranks[i] < ranks[j]);
                }
                if a == b {
                    prop_assert_eq!(ranks[i], ranks[j]);
                }
            }
        }
    }

    #[test]
    fn every_group_is_ranked_from_one(
        rows in proptest::collection::btree_map(
            (0usize..3, 2000i32..2004, 0usize..2),
            1.0f64..100.0,
            1..30
        )
    ) {
        let countries = ["Chile", "Peru", "Brazil"];
        let indicators = ["WB x", "FAO y"];
        let table = rows
            .iter()
            .map(|(&(c, year, i), &value)| {
                IndicatorRecord::new(countries[c], year, indicators[i], Some(value))
            })
            .collect::<CanonicalTable>();

        let ranked = rank_changes(&table);
        prop_assert_eq!(ranked.len(), table.len());

        let mut groups: BTreeMap<(String, i32), Vec<f64>> = BTreeMap::new();
        for record in &ranked {
            groups
                .entry((record.indicator.clone(), record.year))
                .or_default()
                .push(record.rank);
        }
        for ranks in groups.values() {
            let lowest = ranks.iter().cloned().fold(f64::INFINITY, f64::min);
            prop_assert!(lowest >= 1.0);
            prop_assert!(ranks.iter().all(|r| *r <= ranks.len() as f64));
        }
    }
}
