//! End-to-end orchestration.
//!
//! Adapters run concurrently on the rayon pool and are joined before
//! anything downstream starts. An adapter that fails is recorded in the
//! [`RunReport`] and contributes no rows; the remaining sources still flow
//! through aggregation, ranking, tagging and persistence. Tables are written
//! one after another, each committed before the next begins.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result, bail};
use log::{info, warn};
use rayon::prelude::*;

use crate::{
    adapters::{AdapterOutput, SourceAdapter},
    aggregate::{self, PivotedTable},
    category::{CategorizedRecord, CategoryTagger},
    config::PipelineConfig,
    data::{CanonicalTable, IndicatorRecord},
    fetch::Fetcher,
    ranking,
    sink::{self, TableSink},
    tables,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterOutcome {
    Succeeded { rows: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterReport {
    pub id: String,
    pub outcome: AdapterOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub adapters: Vec<AdapterReport>,
    pub missing_countries: BTreeMap<String, Vec<String>>,
    pub uncategorized: BTreeSet<String>,
    pub tables: Vec<(String, usize)>,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &AdapterReport> {
        self.adapters
            .iter()
            .filter(|a| matches!(a.outcome, AdapterOutcome::Failed { .. }))
    }

    pub fn rows_written(&self, table: &str) -> Option<usize> {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, rows)| *rows)
    }
}

/// Every derived table of one run, ready for persistence.
#[derive(Debug, Clone)]
pub struct DerivedTables {
    pub final_table: CanonicalTable,
    pub pivoted: PivotedTable,
    pub full: Vec<CategorizedRecord>,
    pub uncategorized: BTreeSet<String>,
}

/// Restricts a registry to the adapters named in `only`, keeping registry
/// order. An empty selection keeps everything.
pub fn select_adapters(
    registry: Vec<Box<dyn SourceAdapter>>,
    only: &[String],
) -> Result<Vec<Box<dyn SourceAdapter>>> {
    if only.is_empty() {
        return Ok(registry);
    }
    let known = registry.iter().map(|a| a.id().to_string()).collect::<Vec<_>>();
    for id in only {
        if !known.contains(id) {
            bail!("Unknown adapter '{id}'; available adapters: {}", known.join(", "));
        }
    }
    Ok(registry
        .into_iter()
        .filter(|a| only.iter().any(|id| id == a.id()))
        .collect())
}

/// Runs every adapter in parallel and waits for all of them.
pub fn collect_sources(
    adapters: &[Box<dyn SourceAdapter>],
    fetcher: &dyn Fetcher,
) -> (Vec<Vec<IndicatorRecord>>, RunReport) {
    let results = adapters
        .par_iter()
        .map(|adapter| (adapter.id().to_string(), adapter.run(fetcher)))
        .collect::<Vec<(String, Result<AdapterOutput>)>>();

    let mut report = RunReport::default();
    let mut slices = Vec::with_capacity(results.len());
    for (id, result) in results {
        let outcome = match result {
            Ok(output) => {
                info!("Adapter '{id}' produced {} row(s)", output.records.len());
                for (dataset, missing) in output.missing_countries {
                    if !missing.is_empty() {
                        warn!(
                            "{dataset}: no data for {} target country(ies): {}",
                            missing.len(),
                            missing.join(", ")
                        );
                    }
                    report.missing_countries.insert(dataset, missing);
                }
                let rows = output.records.len();
                slices.push(output.records);
                AdapterOutcome::Succeeded { rows }
            }
            Err(err) => {
                warn!("Adapter '{id}' failed: {err:#}");
                AdapterOutcome::Failed {
                    error: format!("{err:#}"),
                }
            }
        };
        report.adapters.push(AdapterReport { id, outcome });
    }
    (slices, report)
}

/// Aggregation, pivot, ranking and tagging over the collected slices.
pub fn derive_tables(
    slices: Vec<Vec<IndicatorRecord>>,
    tagger: &CategoryTagger,
) -> Result<DerivedTables> {
    let mut final_table = aggregate::concat(slices).context("Aggregating source slices")?;
    let dropped = final_table.drop_missing();
    if dropped > 0 {
        info!("Dropped {dropped} row(s) without a value");
    }
    let pivoted = aggregate::pivot(&final_table).context("Pivoting canonical table")?;
    let ranked = ranking::rank_changes(&final_table);
    let (full, uncategorized) = tagger.tag(ranked);
    info!(
        "Derived {} canonical row(s), {} pivoted row(s) over {} indicator(s)",
        final_table.len(),
        pivoted.rows.len(),
        pivoted.indicators.len()
    );
    Ok(DerivedTables {
        final_table,
        pivoted,
        full,
        uncategorized,
    })
}

/// Writes the four output tables in order and returns their row counts.
pub fn persist(
    sink: &mut dyn TableSink,
    derived: &DerivedTables,
    config: &PipelineConfig,
) -> Result<Vec<(String, usize)>> {
    let writes = [
        (
            tables::FINAL,
            tables::final_columns(),
            tables::final_rows(&derived.final_table),
        ),
        (
            tables::FINAL_PIVOTED,
            tables::pivoted_columns(&derived.pivoted),
            tables::pivoted_rows(&derived.pivoted),
        ),
        (
            tables::FULL_INDICATOR_DATA,
            tables::full_columns(),
            tables::full_rows(&derived.full),
        ),
        (
            tables::EXTERNAL_SOURCES,
            tables::external_columns(),
            tables::external_rows(&config.external_sources),
        ),
    ];
    let mut counts = Vec::with_capacity(writes.len());
    for (name, columns, rows) in writes {
        let written = sink::write_table(sink, name, &columns, rows)
            .with_context(|| format!("Persisting table '{name}'"))?;
        counts.push((name.to_string(), written));
    }
    Ok(counts)
}

pub fn run(
    config: &PipelineConfig,
    adapters: &[Box<dyn SourceAdapter>],
    fetcher: &dyn Fetcher,
    sink: &mut dyn TableSink,
) -> Result<RunReport> {
    info!("Running {} source adapter(s)", adapters.len());
    let (slices, mut report) = collect_sources(adapters, fetcher);
    if !adapters.is_empty() && report.failures().count() == adapters.len() {
        bail!("Every source adapter failed; nothing to aggregate");
    }

    let tagger = CategoryTagger::from_config(&config.categories);
    let derived = derive_tables(slices, &tagger)?;
    report.uncategorized = derived.uncategorized.clone();
    report.tables = persist(sink, &derived, config)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapters::RawBatch,
        fetch::MemoryFetcher,
        sink::MemorySink,
    };

    struct Fixed {
        id: &'static str,
        records: Vec<IndicatorRecord>,
    }

    impl SourceAdapter for Fixed {
        fn id(&self) -> &str {
            self.id
        }

        fn endpoints(&self) -> Vec<String> {
            Vec::new()
        }

        fn fetch(&self, _fetcher: &dyn Fetcher) -> Result<RawBatch> {
            Ok(RawBatch::default())
        }

        fn normalize(&self, _batch: RawBatch) -> Result<AdapterOutput> {
            Ok(AdapterOutput {
                records: self.records.clone(),
                ..AdapterOutput::default()
            })
        }
    }

    struct Broken;

    impl SourceAdapter for Broken {
        fn id(&self) -> &str {
            "broken"
        }

        fn endpoints(&self) -> Vec<String> {
            Vec::new()
        }

        fn fetch(&self, fetcher: &dyn Fetcher) -> Result<RawBatch> {
            fetcher.fetch("http://unreachable.invalid/")?;
            Ok(RawBatch::default())
        }

        fn normalize(&self, _batch: RawBatch) -> Result<AdapterOutput> {
            Ok(AdapterOutput::default())
        }
    }

    fn fixed(id: &'static str, country: &str) -> Box<dyn SourceAdapter> {
        Box::new(Fixed {
            id,
            records: vec![
                IndicatorRecord::new(country, 2000, format!("WB {id}"), Some(1.0)),
                IndicatorRecord::new(country, 2001, format!("WB {id}"), Some(2.0)),
            ],
        })
    }

    #[test]
    fn failing_adapter_is_reported_and_others_persist() {
        let adapters = vec![fixed("a", "Peru"), Box::new(Broken) as Box<dyn SourceAdapter>];
        let mut sink = MemorySink::new();
        let report = run(
            &PipelineConfig::default(),
            &adapters,
            &MemoryFetcher::new(),
            &mut sink,
        )
        .unwrap();
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.rows_written(tables::FINAL), Some(2));
        assert_eq!(sink.table(tables::FINAL).unwrap().rows.len(), 2);
        assert!(report.uncategorized.contains("WB a"));
    }

    #[test]
    fn all_adapters_failing_is_fatal() {
        let adapters = vec![Box::new(Broken) as Box<dyn SourceAdapter>];
        let mut sink = MemorySink::new();
        assert!(run(
            &PipelineConfig::default(),
            &adapters,
            &MemoryFetcher::new(),
            &mut sink
        )
        .is_err());
        assert_eq!(sink.table_names().count(), 0);
    }

    #[test]
    fn select_adapters_rejects_unknown_ids() {
        let registry = vec![fixed("a", "Peru"), fixed("b", "Chile")];
        let err = select_adapters(registry, &["c".to_string()]).err().unwrap();
        assert!(err.to_string().contains("Unknown adapter 'c'"));

        let registry = vec![fixed("a", "Peru"), fixed("b", "Chile")];
        let selected = select_adapters(registry, &["b".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id(), "b");
    }
}
