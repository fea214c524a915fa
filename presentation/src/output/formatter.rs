//! Output formatter trait

use phasegate_domain::RunReport;

/// Trait for formatting run reports
pub trait OutputFormatter {
    /// Every phase run with results, conflicts and the audit trail
    fn format(&self, report: &RunReport) -> String;

    /// Format as JSON
    fn format_json(&self, report: &RunReport) -> String;

    /// Final state plus one line per phase run
    fn format_summary(&self, report: &RunReport) -> String;
}
