use food_insecurity_etl::{
    aggregate::{AggregateError, concat, pivot},
    data::{IndicatorRecord, RecordKey},
};
use proptest::prelude::*;

#[test]
fn colliding_keys_are_listed_in_order() {
    let err = concat(vec![
        vec![
            IndicatorRecord::new("Peru", 2001, "WB a", Some(1.0)),
            IndicatorRecord::new("Chile", 2001, "WB a", Some(1.0)),
        ],
        vec![
            IndicatorRecord::new("Peru", 2001, "WB a", Some(2.0)),
            IndicatorRecord::new("Chile", 2001, "WB a", Some(2.0)),
            IndicatorRecord::new("Chile", 2002, "WB a", Some(2.0)),
        ],
    ])
    .unwrap_err();
    let AggregateError::DuplicateKeys { count, sample } = &err;
    assert_eq!(*count, 2);
    assert_eq!(
        sample[0],
        RecordKey {
            country: "Chile".into(),
            year: 2001,
            indicator: "WB a".into()
        }
    );
}

#[test]
fn pivot_columns_are_sorted_and_rows_keyed_by_country_year() {
    let table = concat(vec![vec![
        IndicatorRecord::new("Peru", 2001, "WB z", Some(1.0)),
        IndicatorRecord::new("Chile", 2001, "FAO a", Some(0.0)),
        IndicatorRecord::new("Chile", 2001, "WB z", Some(3.0)),
    ]])
    .unwrap();
    let pivoted = pivot(&table).unwrap();
    assert_eq!(pivoted.indicators, vec!["FAO a", "WB z"]);
    let keys = pivoted
        .rows
        .iter()
        .map(|r| (r.country.as_str(), r.year))
        .collect::<Vec<_>>();
    assert_eq!(keys, vec![("Chile", 2001), ("Peru", 2001)]);
    assert_eq!(pivoted.rows[0].values, vec![Some(0.0), Some(3.0)]);
    assert_eq!(pivoted.rows[1].values, vec![None, Some(1.0)]);
}

proptest! {
    #[test]
    fn pivot_then_melt_reproduces_final(
        rows in proptest::collection::btree_map(
            (0usize..4, 1995i32..2005, 0usize..3),
            -1.0e6f64..1.0e6,
            0..40
        )
    ) {
        let countries = ["Bolivia", "Chile", "Haiti", "Peru"];
        let indicators = ["FAO a", "WB b", "WB c"];
        let slice = rows
            .iter()
            .map(|(&(c, year, i), &value)| {
                IndicatorRecord::new(countries[c], year, indicators[i], Some(value))
            })
            .collect::<Vec<_>>();
        let table = concat(vec![slice]).unwrap();

        let melted = pivot(&table).unwrap().melt();
        prop_assert_eq!(melted, table);
    }
}
