//! Progress reporting for workflow runs

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use phasegate_application::ProgressNotifier;
use phasegate_domain::{GateEvaluation, IterationRecord, RunId, RunState, Verdict, WorkerResult};
use std::sync::{Mutex, MutexGuard};

/// Reports progress during a run with one progress bar per phase run
pub struct ProgressReporter {
    multi: MultiProgress,
    phase_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            phase_bar: Mutex::new(None),
        }
    }

    fn phase_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.phase_bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// "visual" or "visual (attempt 2)"
pub(crate) fn phase_label(phase: &str, attempt: u32) -> String {
    if attempt == 0 {
        phase.to_string()
    } else {
        format!("{} (attempt {})", phase, attempt + 1)
    }
}

pub(crate) fn task_line(result: &WorkerResult) -> String {
    match &result.error {
        None => format!(
            "{} {} {} ({:.2})",
            "v".green(),
            result.task_id,
            result.worker.dimmed(),
            result.confidence
        ),
        Some(error) => format!("{} {} {}", "x".red(), result.task_id, error),
    }
}

pub(crate) fn verdict_label(verdict: Verdict) -> String {
    match verdict {
        Verdict::Pass => "pass".green().bold().to_string(),
        Verdict::Iterate => "iterate".yellow().bold().to_string(),
        Verdict::Fail => "fail".red().bold().to_string(),
    }
}

impl ProgressNotifier for ProgressReporter {
    fn on_phase_start(&self, phase: &str, attempt: u32, total_tasks: usize) {
        let pb = self.multi.add(ProgressBar::new(total_tasks as u64));
        pb.set_style(Self::phase_style());
        pb.set_prefix(phase_label(phase, attempt));
        pb.set_message("Starting...");

        *self.bar() = Some(pb);
    }

    fn on_task_complete(&self, _phase: &str, result: &WorkerResult) {
        if let Some(pb) = self.bar().as_ref() {
            pb.set_message(task_line(result));
            pb.inc(1);
        }
    }

    fn on_phase_complete(&self, _phase: &str, evaluation: &GateEvaluation) {
        if let Some(pb) = self.bar().take() {
            pb.finish_with_message(format!(
                "{} {}",
                verdict_label(evaluation.verdict),
                evaluation.score.summary()
            ));
        }
    }

    fn on_iteration(&self, record: &IterationRecord) {
        let _ = self.multi.println(format!(
            "{} {} -> {} (iteration {})",
            "<-".yellow(),
            record.from_phase,
            record.to_phase.bold(),
            record.iteration
        ));
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl ProgressNotifier for SimpleProgress {
    fn on_run_start(&self, run_id: RunId, workflow: &str, phases: usize) {
        println!(
            "{} {} ({} phases, run {})",
            "=>".cyan(),
            workflow.bold(),
            phases,
            run_id
        );
    }

    fn on_phase_start(&self, phase: &str, attempt: u32, total_tasks: usize) {
        println!(
            "{} {} ({} tasks)",
            "->".cyan(),
            phase_label(phase, attempt).bold(),
            total_tasks
        );
    }

    fn on_task_complete(&self, _phase: &str, result: &WorkerResult) {
        println!("  {}", task_line(result));
    }

    fn on_phase_complete(&self, _phase: &str, evaluation: &GateEvaluation) {
        println!(
            "  {} {}",
            verdict_label(evaluation.verdict),
            evaluation.score.summary()
        );
    }

    fn on_iteration(&self, record: &IterationRecord) {
        println!(
            "{} re-entering {} from {} (iteration {})",
            "<-".yellow(),
            record.to_phase.bold(),
            record.from_phase,
            record.iteration
        );
    }

    fn on_run_complete(&self, state: &RunState) {
        println!("{} {}", "=>".cyan(), state.label().bold());
    }
}
