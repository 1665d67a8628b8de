//! Plain-text rendering of run summaries for the terminal.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    adapters::SourceAdapter,
    pipeline::{AdapterOutcome, RunReport},
};

/// Fixed-width table. Columns whose every cell is numeric are right-aligned.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    let mut numeric = vec![!rows.is_empty(); column_count];

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
            numeric[idx] &= cell.trim().parse::<f64>().is_ok();
        }
    }

    let mut output = String::new();
    let header_cells = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&header_cells, &widths, &numeric));
    let separator = widths.iter().map(|w| "-".repeat((*w).max(3))).collect::<Vec<_>>();
    let _ = writeln!(
        output,
        "{}",
        format_row(&separator, &widths, &vec![false; column_count])
    );
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &numeric));
    }
    output
}

fn format_row(values: &[String], widths: &[usize], right_align: &[bool]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .zip(right_align)
        .map(|((value, width), right)| {
            let sanitized = sanitize_cell(value);
            let padding = " ".repeat(width.saturating_sub(display_width(&sanitized)));
            if *right {
                format!("{padding}{sanitized}")
            } else {
                format!("{sanitized}{padding}")
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

pub fn render_run_report(report: &RunReport) -> String {
    let mut output = String::new();

    let adapter_rows = report
        .adapters
        .iter()
        .map(|a| match &a.outcome {
            AdapterOutcome::Succeeded { rows } => {
                vec![a.id.clone(), "ok".to_string(), rows.to_string()]
            }
            AdapterOutcome::Failed { error } => {
                vec![a.id.clone(), format!("failed: {error}"), String::new()]
            }
        })
        .collect::<Vec<_>>();
    output.push_str(&render_table(&["Adapter", "Status", "Rows"], &adapter_rows));

    let table_rows = report
        .tables
        .iter()
        .map(|(name, rows)| vec![name.clone(), rows.to_string()])
        .collect::<Vec<_>>();
    if !table_rows.is_empty() {
        output.push('\n');
        output.push_str(&render_table(&["Table", "Rows"], &table_rows));
    }

    let missing = report
        .missing_countries
        .iter()
        .filter(|(_, countries)| !countries.is_empty())
        .map(|(dataset, countries)| vec![dataset.clone(), countries.join(", ")])
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        output.push('\n');
        output.push_str(&render_table(&["Dataset", "Missing countries"], &missing));
    }

    if !report.uncategorized.is_empty() {
        let _ = writeln!(output, "\nIndicators without a category:");
        for indicator in &report.uncategorized {
            let _ = writeln!(output, "  {indicator}");
        }
    }
    output
}

pub fn render_sources(adapters: &[Box<dyn SourceAdapter>]) -> String {
    let rows = adapters
        .iter()
        .flat_map(|adapter| {
            adapter
                .endpoints()
                .into_iter()
                .map(|endpoint| vec![adapter.id().to_string(), endpoint])
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    render_table(&["Adapter", "Endpoint"], &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AdapterReport;

    #[test]
    fn numeric_columns_are_right_aligned() {
        let rendered = render_table(
            &["Table", "Rows"],
            &[
                vec!["Final".into(), "7".into()],
                vec!["Final_Pivoted".into(), "12".into()],
            ],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "Table          Rows");
        assert_eq!(lines[2], "Final             7");
        assert_eq!(lines[3], "Final_Pivoted    12");
    }

    #[test]
    fn run_report_lists_failures_and_uncategorized() {
        let mut report = RunReport::default();
        report.adapters.push(AdapterReport {
            id: "fao-trade".into(),
            outcome: AdapterOutcome::Failed {
                error: "timeout".into(),
            },
        });
        report.uncategorized.insert("FAO Emissions (kt)".into());
        let rendered = render_run_report(&report);
        assert!(rendered.contains("failed: timeout"));
        assert!(rendered.contains("  FAO Emissions (kt)"));
    }
}
