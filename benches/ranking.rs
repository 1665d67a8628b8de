use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use food_insecurity_etl::{
    aggregate,
    category::CategoryTagger,
    config::PipelineConfig,
    data::{CanonicalTable, IndicatorRecord},
    ranking,
};

/// A Final-shaped table: every country reports every indicator every year.
fn generate_final(countries: usize, indicators: usize, years: i32) -> CanonicalTable {
    let mut records = Vec::with_capacity(countries * indicators * years as usize);
    for c in 0..countries {
        for i in 0..indicators {
            for y in 0..years {
                let value = ((c * 31 + i * 17) as f64 + f64::from(y) * 1.5) % 97.0 + 1.0;
                records.push(IndicatorRecord::new(
                    format!("Country {c:02}"),
                    1990 + y,
                    format!("WB Indicator {i:02}"),
                    Some(value),
                ));
            }
        }
    }
    let mut table = CanonicalTable::new(records);
    table.sort_final();
    table
}

fn bench_ranking(c: &mut Criterion) {
    let table = generate_final(33, 45, 30);
    let tagger = CategoryTagger::from_config(&PipelineConfig::default().categories);

    let mut group = c.benchmark_group("derive");

    group.bench_function("rank_changes", |b| {
        b.iter(|| ranking::rank_changes(&table));
    });

    group.bench_function("rank_and_tag", |b| {
        b.iter_batched(
            || ranking::rank_changes(&table),
            |ranked| tagger.tag(ranked),
            BatchSize::LargeInput,
        );
    });

    group.bench_function("pivot", |b| {
        b.iter(|| aggregate::pivot(&table).expect("unique keys"));
    });

    group.finish();
}

criterion_group!(benches, bench_ranking);
criterion_main!(benches);
