//! Summary table on standard output

use async_trait::async_trait;
use colored::*;
use scalewatch_core::{ReportSink, SinkError, TestCaseRecord};
use std::fmt::Write as _;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Prints the records of a suite as a table
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }

    /// Render the table printed by [`ReportSink::publish`]
    pub fn render_table(&self, suite: &str, records: &[TestCaseRecord]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} {}", "Suite".bright_cyan().bold(), suite.bold());

        if records.is_empty() {
            let _ = writeln!(out, "  {}", "no records".dimmed());
            return out;
        }

        let rows: Vec<(&str, &str, String)> = records
            .iter()
            .map(|record| (record.tier(), record.metric(), format_value(record.value)))
            .collect();

        let tier_width = column_width("Tier", rows.iter().map(|row| row.0));
        let metric_width = column_width("Metric", rows.iter().map(|row| row.1));
        let value_width = column_width("Value", rows.iter().map(|row| row.2.as_str()));
        let widths = [tier_width, metric_width, value_width];

        separator(&mut out, &widths, '┌', '┬', '┐');
        let _ = writeln!(
            out,
            "│ {} │ {} │ {} │",
            format!("{:tier_width$}", "Tier").bright_cyan().bold(),
            format!("{:metric_width$}", "Metric").bright_cyan().bold(),
            format!("{:>value_width$}", "Value").bright_cyan().bold(),
        );
        separator(&mut out, &widths, '├', '┼', '┤');

        let mut previous_tier = None;
        for (tier, metric, value) in &rows {
            let tier_cell = if previous_tier == Some(*tier) { "" } else { *tier };
            previous_tier = Some(*tier);

            let value_cell = format!("{:>value_width$}", value);
            let value_cell = if metric.starts_with("scale-from") {
                value_cell.bright_green()
            } else if metric.starts_with("errorsPercentage") && value != "0" {
                value_cell.bright_red()
            } else {
                value_cell.normal()
            };

            let _ = writeln!(
                out,
                "│ {:tier_width$} │ {:metric_width$} │ {} │",
                tier_cell, metric, value_cell
            );
        }
        separator(&mut out, &widths, '└', '┴', '┘');
        out
    }
}

#[async_trait]
impl ReportSink for StdoutSink {
    async fn publish(&self, suite: &str, records: &[TestCaseRecord]) -> Result<(), SinkError> {
        let table = self.render_table(suite, records);
        let mut stdout = BufWriter::new(tokio::io::stdout());
        stdout.write_all(table.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

fn format_value(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{}", value)
    } else {
        format!("{:.3}", value)
    }
}

fn column_width<'a>(header: &str, cells: impl Iterator<Item = &'a str>) -> usize {
    cells
        .map(|cell| cell.chars().count())
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or_default()
}

fn separator(out: &mut String, widths: &[usize], left: char, middle: char, right: char) {
    out.push(left);
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            out.push(middle);
        }
        out.push_str(&"─".repeat(width + 2));
    }
    out.push(right);
    out.push('\n');
}
