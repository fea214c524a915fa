//! Console output formatter for run reports and audit replays

use crate::output::formatter::OutputFormatter;
use crate::progress::reporter::{phase_label, task_line, verdict_label};
use colored::Colorize;
use phasegate_domain::{
    AuditEntry, ConflictOutcome, ConflictRecord, PhaseRun, RunMetrics, RunReport, RunState,
    TaskTotals,
};
use std::fmt::Display;

/// Formats run results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete report
    pub fn format(report: &RunReport) -> String {
        let mut output = String::new();

        output.push_str(&Self::header(&format!("Run {}", report.run_id)));
        output.push('\n');
        output.push_str(&format!(
            "{} {}\n{} {}\n",
            "Workflow:".cyan().bold(),
            report.workflow,
            "Project:".cyan().bold(),
            report.project_id
        ));

        for phase_run in &report.phase_runs {
            output.push_str(&Self::section_header(&phase_label(
                &phase_run.phase,
                phase_run.attempt,
            )));
            output.push_str(&Self::phase_run_detail(phase_run));
        }

        if !report.iterations.is_empty() {
            output.push_str(&Self::section_header("Iterations"));
            for record in &report.iterations {
                output.push_str(&format!(
                    "  {} -> {} (iteration {}): {}\n",
                    record.from_phase,
                    record.to_phase.bold(),
                    record.iteration,
                    record.context.reason
                ));
            }
        }

        output.push_str(&Self::section_header("Metrics"));
        output.push_str(&Self::metrics_lines(&report.metrics, None));

        output.push_str(&Self::section_header("Audit Trail"));
        output.push_str(&Self::audit_lines(report.audit.entries(), None));

        output.push('\n');
        output.push_str(&Self::state_line(&report.state));
        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(report: &RunReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    /// Concise output
    pub fn format_summary(report: &RunReport) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{} {} {}\n\n",
            "===".cyan(),
            report.workflow.bold(),
            "===".cyan()
        ));

        for phase_run in &report.phase_runs {
            let verdict = phase_run
                .verdict
                .map(verdict_label)
                .unwrap_or_else(|| "-".dimmed().to_string());
            let score = phase_run
                .score
                .as_ref()
                .map(|s| format!("{:.2}", s.aggregate()))
                .unwrap_or_else(|| "-".to_string());
            output.push_str(&format!(
                "  {:<28} {:>5}  {}\n",
                phase_label(&phase_run.phase, phase_run.attempt),
                score,
                verdict
            ));
        }

        output.push('\n');
        output.push_str(&Self::state_line(&report.state));
        output
    }

    /// Replay recorded audit entries, optionally for one phase
    pub fn format_explain(
        run_id: Option<&str>,
        workflow: Option<&str>,
        entries: &[AuditEntry],
        metrics: Option<&RunMetrics>,
        phase: Option<&str>,
        final_state: Option<&RunState>,
    ) -> String {
        let mut output = String::new();
        output.push_str(&Self::header(&format!(
            "Decisions of run {}",
            run_id.unwrap_or("<unknown>")
        )));
        output.push('\n');
        if let Some(workflow) = workflow {
            output.push_str(&format!("{} {}\n", "Workflow:".cyan().bold(), workflow));
        }
        if let Some(phase) = phase {
            output.push_str(&format!("{} {}\n", "Phase:".cyan().bold(), phase));
        }
        output.push('\n');

        let lines = Self::audit_lines(entries, phase);
        if lines.is_empty() {
            output.push_str(&format!("  {}\n", "(no recorded decisions)".dimmed()));
        } else {
            output.push_str(&lines);
        }

        if let Some(metrics) = metrics {
            output.push_str(&Self::section_header("Metrics"));
            output.push_str(&Self::metrics_lines(metrics, phase));
        }

        output.push('\n');
        match final_state {
            Some(state) => output.push_str(&Self::state_line(state)),
            None => output.push_str(&format!(
                "{}\n",
                "Run did not finish (no run_finished record)".yellow()
            )),
        }
        output
    }

    /// List validation issues under a title
    pub fn format_issues<T: Display>(title: &str, issues: &[T]) -> String {
        if issues.is_empty() {
            return format!("{} {}\n", "v".green(), title);
        }
        let mut output = format!("{} {} ({} issue(s))\n", "x".red(), title, issues.len());
        for issue in issues {
            output.push_str(&format!("  - {}\n", issue));
        }
        output
    }

    /// Per-phase execution figures, then run totals (omitted for one phase)
    fn metrics_lines(metrics: &RunMetrics, phase: Option<&str>) -> String {
        let mut output = String::new();
        for phase_metrics in metrics
            .phases
            .iter()
            .filter(|p| phase.is_none_or(|name| p.phase == name))
        {
            output.push_str(&format!(
                "  {:<20} {} run(s), {} iterate, {} ms, {}{}\n",
                phase_metrics.phase.bold(),
                phase_metrics.runs,
                phase_metrics.iterate_verdicts,
                phase_metrics.duration_ms,
                Self::totals(&phase_metrics.tasks),
                if phase_metrics.passed { "" } else { " (not passed)" }
            ));
        }
        if phase.is_none() {
            for (worker, totals) in &metrics.workers {
                output.push_str(&format!("  {:<20} {}\n", worker.dimmed(), Self::totals(totals)));
            }
            output.push_str(&format!(
                "  {:<20} {} phase run(s), {} ms, {}\n",
                "total".bold(),
                metrics.phase_runs,
                metrics.duration_ms,
                Self::totals(&metrics.totals)
            ));
        }
        if output.is_empty() {
            output.push_str(&format!("  {}\n", "(no phase runs)".dimmed()));
        }
        output
    }

    fn totals(totals: &TaskTotals) -> String {
        format!(
            "{}/{} task(s) ok ({:.0}%), {} timeout, {} failed, {} cancelled, {} retry(ies)",
            totals.succeeded,
            totals.tasks,
            totals.success_rate() * 100.0,
            totals.timed_out,
            totals.failed,
            totals.cancelled,
            totals.retries
        )
    }

    fn phase_run_detail(phase_run: &PhaseRun) -> String {
        let mut output = String::new();
        for result in phase_run.results() {
            output.push_str(&format!("  {}\n", task_line(result)));
        }
        if let Some(score) = &phase_run.score {
            output.push_str(&format!("  {} {}\n", "Score:".bold(), score.summary()));
        }
        if let Some(verdict) = phase_run.verdict {
            output.push_str(&format!(
                "  {} {} {}\n",
                "Verdict:".bold(),
                verdict_label(verdict),
                phase_run.reason.as_deref().unwrap_or("").dimmed()
            ));
        }
        for conflict in &phase_run.conflicts {
            output.push_str(&format!("  {}\n", Self::conflict_line(conflict)));
        }
        output
    }

    fn conflict_line(conflict: &ConflictRecord) -> String {
        match &conflict.outcome {
            ConflictOutcome::Resolved(resolution) => format!(
                "{} {} -> {} (confidence {:.2}{})",
                "Conflict".yellow(),
                conflict.subject,
                resolution.action,
                resolution.confidence,
                if resolution.vetoed { ", veto" } else { "" }
            ),
            ConflictOutcome::Unresolved { reason } => format!(
                "{} {} unresolved: {}",
                "Conflict".red(),
                conflict.subject,
                reason
            ),
        }
    }

    fn audit_lines(entries: &[AuditEntry], phase: Option<&str>) -> String {
        entries
            .iter()
            .filter(|entry| phase.is_none() || entry.phase.as_deref() == phase)
            .map(|entry| {
                let confidence = entry
                    .confidence
                    .map(|c| format!(" [{:.2}]", c))
                    .unwrap_or_default();
                let supersedes = entry
                    .supersedes
                    .map(|seq| format!(" (corrects #{})", seq))
                    .unwrap_or_default();
                format!(
                    "  #{:<3} {} {:<18} {:<12} {}{}{}\n",
                    entry.seq,
                    entry.timestamp.format("%H:%M:%S%.3f").to_string().dimmed(),
                    entry.kind.as_str(),
                    entry.phase.as_deref().unwrap_or("-"),
                    entry.rationale,
                    confidence,
                    supersedes
                )
            })
            .collect()
    }

    fn state_line(state: &RunState) -> String {
        match state {
            RunState::Completed => format!("{} {}\n", "Result:".bold(), "completed".green().bold()),
            RunState::Aborted { outcome, reason } => format!(
                "{} {} (exit {}): {}\n",
                "Result:".bold(),
                outcome.as_str().red().bold(),
                outcome.exit_code(),
                reason
            ),
            other => format!("{} {}\n", "Result:".bold(), other.label()),
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("{}\n", "=".repeat(60).cyan())
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, report: &RunReport) -> String {
        Self::format(report)
    }

    fn format_json(&self, report: &RunReport) -> String {
        Self::format_json(report)
    }

    fn format_summary(&self, report: &RunReport) -> String {
        Self::format_summary(report)
    }
}
