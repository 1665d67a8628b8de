//! Year-over-year change metrics and per-(Indicator, Year) rankings.
//!
//! Changes are computed along each (Country, Indicator) series in
//! chronological order; ranks are then assigned within each
//! (Indicator, Year) group by the magnitude of that change.

use std::cmp::Ordering;

use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::data::{CanonicalTable, IndicatorRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRecord {
    pub country: String,
    pub year: i32,
    pub indicator: String,
    pub value: Option<f64>,
    pub difference: f64,
    pub abs_diff: f64,
    pub rank: f64,
}

impl RankedRecord {
    fn from_record(record: IndicatorRecord, difference: f64) -> Self {
        Self {
            country: record.country,
            year: record.year,
            indicator: record.indicator,
            value: record.value,
            difference,
            abs_diff: difference.abs(),
            rank: 0.0,
        }
    }

    /// (Indicator, Year, abs_diff descending), the order groups are ranked in.
    pub fn cmp_ranking(&self, other: &Self) -> Ordering {
        self.indicator
            .cmp(&other.indicator)
            .then(self.year.cmp(&other.year))
            .then_with(|| other.abs_diff.total_cmp(&self.abs_diff))
    }
}

/// Symmetric relative difference from `a` to `b`, scaled by the mean
/// magnitude of the two values. Zero when either endpoint is zero.
pub fn rel_diff(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        return 0.0;
    }
    2.0 * (b - a) / (a.abs() + b.abs())
}

/// Ascending ranks starting at 1; tied values share the mean of the
/// positions they occupy.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order = (0..values.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start+1..=end averaged.
        let shared = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = shared;
        }
        start = end;
    }
    ranks
}

/// A group where every rank is the same carries no ordering information, so
/// every member is ranked first.
pub fn correct_degenerate(mut ranks: Vec<f64>) -> Vec<f64> {
    let degenerate = ranks.len() <= 1 || ranks.iter().all_equal();
    if degenerate {
        ranks.iter_mut().for_each(|r| *r = 1.0);
    }
    ranks
}

fn series_differences(table: &CanonicalTable) -> Vec<RankedRecord> {
    let mut series = table.clone();
    series.sort_series();

    let mut out = Vec::with_capacity(series.len());
    for (_, group) in &series
        .records
        .into_iter()
        .chunk_by(|r| (r.country.clone(), r.indicator.clone()))
    {
        let mut previous: Option<Option<f64>> = None;
        for record in group {
            let difference = match (previous, record.value) {
                (Some(Some(before)), Some(current)) => rel_diff(before, current),
                _ => 0.0,
            };
            previous = Some(record.value);
            out.push(RankedRecord::from_record(record, difference));
        }
    }
    out
}

/// Computes `Difference`, `AbsDiff` and `Rank` for every row of the canonical
/// table. The result is ordered by (Indicator, Year, AbsDiff descending).
pub fn rank_changes(table: &CanonicalTable) -> Vec<RankedRecord> {
    let mut ranked = series_differences(table);
    ranked.sort_by(RankedRecord::cmp_ranking);

    let group_sizes = ranked
        .iter()
        .chunk_by(|r| (r.indicator.clone(), r.year))
        .into_iter()
        .map(|(_, group)| group.count())
        .collect::<Vec<_>>();
    let mut start = 0;
    for &len in &group_sizes {
        let group = &mut ranked[start..start + len];
        let magnitudes = group.iter().map(|r| r.abs_diff).collect::<Vec<_>>();
        let ranks = correct_degenerate(average_ranks(&magnitudes));
        for (record, rank) in group.iter_mut().zip(ranks) {
            record.rank = rank;
        }
        start += len;
    }
    debug!(
        "Ranked {} row(s) across {} (Indicator, Year) group(s)",
        ranked.len(),
        group_sizes.len()
    );
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, i32, &str, f64)]) -> CanonicalTable {
        rows.iter()
            .map(|&(c, y, i, v)| IndicatorRecord::new(c, y, i, Some(v)))
            .collect()
    }

    #[test]
    fn rel_diff_is_zero_when_either_side_is_zero() {
        assert_eq!(rel_diff(0.0, 5.0), 0.0);
        assert_eq!(rel_diff(5.0, 0.0), 0.0);
        assert!((rel_diff(40.0, 44.0) - 0.095_238).abs() < 1e-5);
        assert_eq!(rel_diff(-2.0, 2.0), 2.0);
    }

    #[test]
    fn average_ranks_ascending_with_ties() {
        assert_eq!(average_ranks(&[1.0, 2.0, 3.0]), vec![1.0, 2.0, 3.0]);
        assert_eq!(average_ranks(&[3.0, 2.0, 1.0]), vec![3.0, 2.0, 1.0]);
        assert_eq!(average_ranks(&[5.0, 5.0, 5.0]), vec![2.0, 2.0, 2.0]);
        assert_eq!(average_ranks(&[0.1, 0.4, 0.4]), vec![1.0, 2.5, 2.5]);
        assert!(average_ranks(&[]).is_empty());
    }

    #[test]
    fn degenerate_groups_rank_first() {
        assert_eq!(correct_degenerate(vec![2.0, 2.0, 2.0]), vec![1.0, 1.0, 1.0]);
        assert_eq!(correct_degenerate(vec![1.0]), vec![1.0]);
        assert_eq!(correct_degenerate(vec![1.0, 2.5, 2.5]), vec![1.0, 2.5, 2.5]);
    }

    #[test]
    fn first_year_of_each_series_has_zero_difference() {
        let ranked = rank_changes(&table(&[
            ("Peru", 2001, "WB x", 10.0),
            ("Peru", 2002, "WB x", 20.0),
            ("Chile", 2002, "WB x", 7.0),
        ]));
        let first = ranked
            .iter()
            .find(|r| r.country == "Peru" && r.year == 2001)
            .unwrap();
        assert_eq!(first.difference, 0.0);
        let chile = ranked.iter().find(|r| r.country == "Chile").unwrap();
        assert_eq!(chile.difference, 0.0);
        let later = ranked
            .iter()
            .find(|r| r.country == "Peru" && r.year == 2002)
            .unwrap();
        assert!((later.difference - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn groups_are_ranked_by_change_magnitude() {
        let ranked = rank_changes(&table(&[
            ("Bolivia", 2000, "WB x", 1.0),
            ("Bolivia", 2001, "WB x", 2.0),
            ("Chile", 2000, "WB x", 1.0),
            ("Chile", 2001, "WB x", 1.5),
            ("Peru", 2000, "WB x", 1.0),
            ("Peru", 2001, "WB x", 1.1),
        ]));
        let year_2001 = ranked.iter().filter(|r| r.year == 2001).collect::<Vec<_>>();
        let order = year_2001.iter().map(|r| r.country.as_str()).collect::<Vec<_>>();
        assert_eq!(order, vec!["Bolivia", "Chile", "Peru"]);
        let ranks = year_2001.iter().map(|r| r.rank).collect::<Vec<_>>();
        assert_eq!(ranks, vec![3.0, 2.0, 1.0]);
        // Every 2000 difference is zero: degenerate group.
        assert!(ranked.iter().filter(|r| r.year == 2000).all(|r| r.rank == 1.0));
    }
}
