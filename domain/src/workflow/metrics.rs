//! Run metrics
//!
//! Per-phase and per-worker execution statistics derived from sealed phase
//! runs. Nothing here is stored separately; the same figures can always be
//! rebuilt from a run's phase runs or from a replayed run log.

use super::run::PhaseRun;
use crate::quality::Verdict;
use crate::task::{WorkerError, WorkerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key used for results that no worker handled
const UNASSIGNED: &str = "unassigned";

/// Task counters for a phase, a worker, or the whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTotals {
    pub tasks: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub timed_out: u32,
    pub cancelled: u32,
    /// Attempts beyond the first, summed over all tasks
    pub retries: u32,
}

impl TaskTotals {
    fn add(&mut self, result: &WorkerResult) {
        self.tasks += 1;
        self.retries += result.attempts.saturating_sub(1);
        match &result.error {
            None => self.succeeded += 1,
            Some(WorkerError::Timeout) => self.timed_out += 1,
            Some(WorkerError::Failure(_)) => self.failed += 1,
            Some(WorkerError::Cancelled) => self.cancelled += 1,
        }
    }

    /// Fraction of tasks that succeeded (0 when there were none)
    pub fn success_rate(&self) -> f64 {
        if self.tasks == 0 {
            0.0
        } else {
            f64::from(self.succeeded) / f64::from(self.tasks)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseMetrics {
    pub phase: String,
    /// Number of times the phase ran
    pub runs: u32,
    pub iterate_verdicts: u32,
    pub passed: bool,
    /// Wall-clock time of all finished runs of the phase
    pub duration_ms: i64,
    pub tasks: TaskTotals,
}

impl PhaseMetrics {
    fn new(phase: &str) -> Self {
        Self {
            phase: phase.to_string(),
            runs: 0,
            iterate_verdicts: 0,
            passed: false,
            duration_ms: 0,
            tasks: TaskTotals::default(),
        }
    }
}

/// Execution statistics of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// In order of first execution
    pub phases: Vec<PhaseMetrics>,
    pub workers: BTreeMap<String, TaskTotals>,
    pub totals: TaskTotals,
    pub phase_runs: u32,
    /// From the first phase start to the last phase finish
    pub duration_ms: i64,
}

impl RunMetrics {
    pub fn from_phase_runs(phase_runs: &[PhaseRun]) -> Self {
        let mut metrics = RunMetrics {
            phase_runs: phase_runs.len() as u32,
            ..Default::default()
        };

        for phase_run in phase_runs {
            let index = match metrics.phases.iter().position(|p| p.phase == phase_run.phase) {
                Some(index) => index,
                None => {
                    metrics.phases.push(PhaseMetrics::new(&phase_run.phase));
                    metrics.phases.len() - 1
                }
            };
            let phase = &mut metrics.phases[index];
            phase.runs += 1;
            match phase_run.verdict {
                Some(Verdict::Pass) => phase.passed = true,
                Some(Verdict::Iterate) => phase.iterate_verdicts += 1,
                _ => {}
            }
            if let Some(finished) = phase_run.finished_at {
                phase.duration_ms += (finished - phase_run.started_at).num_milliseconds();
            }

            for result in phase_run.results() {
                phase.tasks.add(result);
                metrics.totals.add(result);
                let worker = if result.worker.is_empty() {
                    UNASSIGNED
                } else {
                    result.worker.as_str()
                };
                metrics
                    .workers
                    .entry(worker.to_string())
                    .or_default()
                    .add(result);
            }
        }

        let started = phase_runs.iter().map(|r| r.started_at).min();
        let finished = phase_runs.iter().filter_map(|r| r.finished_at).max();
        if let (Some(started), Some(finished)) = (started, finished) {
            metrics.duration_ms = (finished - started).num_milliseconds();
        }
        metrics
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseMetrics> {
        self.phases.iter().find(|p| p.phase == name)
    }
}
