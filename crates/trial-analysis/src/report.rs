use crate::BatchSummary;
use std::fmt;

const RULE_WIDTH: usize = 80;

/// Fixed-width text rendering of a summary.
pub struct Report<'a>(pub &'a BatchSummary);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.0;
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        writeln!(f, "\n{}", heavy)?;
        writeln!(f, "Evaluation Results Summary")?;
        writeln!(f, "{}", heavy)?;
        writeln!(
            f,
            "\n{:<10} {:<8} {:<10} {:<8} {:<10} {:<10}",
            "Instance", "Repeat", "Success", "Total", "Rate", "Status"
        )?;
        writeln!(f, "{}", light)?;

        for group in &summary.instances {
            for record in &group.records {
                let status = if record.succeeded() {
                    "✓ SUCCESS"
                } else {
                    "✗ FAILED"
                };
                writeln!(
                    f,
                    "{:<10} {:<8} {:<10} {:<8} {:<10.2} {:<10}",
                    group.instance,
                    record.repeat,
                    record.success_trials,
                    record.total_trials,
                    record.success_rate,
                    status
                )?;
            }
        }

        writeln!(f, "\n{}", light)?;
        writeln!(f, "Summary Statistics:")?;
        writeln!(f, "{}", light)?;
        writeln!(f, "\nPer-Instance Summary:")?;
        for group in &summary.instances {
            writeln!(
                f,
                "  Instance {}: {}/{} ({:.1}%)",
                group.instance,
                group.rollup.success_trials,
                group.rollup.total_trials,
                group.rollup.rate_percent()
            )?;
        }
        writeln!(
            f,
            "\nOverall: {}/{} ({:.1}%)",
            summary.overall.success_trials,
            summary.overall.total_trials,
            summary.overall.rate_percent()
        )?;
        writeln!(f, "{}", heavy)
    }
}

pub fn render_report(summary: &BatchSummary) -> String {
    Report(summary).to_string()
}
