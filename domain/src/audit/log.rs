//! Append-only audit log

use super::entry::{AuditEntry, DecisionKind, digest};
use crate::core::ids::RunId;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Append-only record of every decision made for one run
///
/// There is no way to edit or remove an entry. Corrections are appended with
/// [`AuditLog::supersede`], which references the original entry.
///
/// # Example
///
/// ```
/// use phasegate_domain::audit::{AuditLog, DecisionKind};
/// use phasegate_domain::core::ids::RunId;
///
/// let mut log = AuditLog::new(RunId::new());
/// let seq = log.append(Some("design"), DecisionKind::Verdict, &"inputs", "aggregate 4.1", Some(0.9));
/// log.supersede(seq, &"inputs", "score recomputed after scorer fix").unwrap();
/// assert_eq!(log.len(), 2);
/// assert_eq!(log.entries()[1].supersedes, Some(seq));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    run_id: RunId,
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            entries: Vec::new(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Append a decision and return its sequence number
    pub fn append<T: Serialize + ?Sized>(
        &mut self,
        phase: Option<&str>,
        kind: DecisionKind,
        inputs: &T,
        rationale: impl Into<String>,
        confidence: Option<f64>,
    ) -> u64 {
        self.push(phase.map(String::from), kind, digest(inputs), rationale.into(), confidence, None)
    }

    /// Append a correction of entry `original`.
    ///
    /// Returns `None` if `original` does not exist.
    pub fn supersede<T: Serialize + ?Sized>(
        &mut self,
        original: u64,
        inputs: &T,
        rationale: impl Into<String>,
    ) -> Option<u64> {
        let phase = self.get(original)?.phase.clone();
        Some(self.push(
            phase,
            DecisionKind::Superseded,
            digest(inputs),
            rationale.into(),
            None,
            Some(original),
        ))
    }

    fn push(
        &mut self,
        phase: Option<String>,
        kind: DecisionKind,
        inputs_digest: String,
        rationale: String,
        confidence: Option<f64>,
        supersedes: Option<u64>,
    ) -> u64 {
        let seq = self.entries.len() as u64;
        self.entries.push(AuditEntry {
            seq,
            timestamp: Utc::now(),
            run_id: self.run_id,
            phase,
            kind,
            inputs_digest,
            rationale,
            confidence,
            supersedes,
        });
        seq
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn get(&self, seq: u64) -> Option<&AuditEntry> {
        self.entries.get(seq as usize)
    }

    pub fn last(&self) -> Option<&AuditEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries recorded for one phase
    pub fn for_phase<'a>(&'a self, phase: &'a str) -> impl Iterator<Item = &'a AuditEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.phase.as_deref() == Some(phase))
    }

    pub fn of_kind(&self, kind: DecisionKind) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Entries appended after `seq` (exclusive)
    pub fn since(&self, seq: Option<u64>) -> &[AuditEntry] {
        match seq {
            None => &self.entries,
            Some(seq) => {
                let start = (seq as usize + 1).min(self.entries.len());
                &self.entries[start..]
            }
        }
    }

    /// Latest correction of `seq`, if it was superseded
    pub fn superseded_by(&self, seq: u64) -> Option<&AuditEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.supersedes == Some(seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuditLog {
        let mut log = AuditLog::new(RunId::new());
        log.append(None, DecisionKind::RunStarted, &"def", "started", None);
        log.append(Some("discovery"), DecisionKind::DispatchStarted, &1, "2 tasks", None);
        log.append(Some("discovery"), DecisionKind::Verdict, &2, "pass", Some(1.0));
        log.append(Some("design"), DecisionKind::Verdict, &3, "iterate", Some(0.4));
        log
    }

    #[test]
    fn test_sequence_numbers_are_dense() {
        let log = sample();
        let seqs: Vec<u64> = log.entries().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
        assert!(log.entries().iter().all(|e| e.run_id == log.run_id()));
    }

    #[test]
    fn test_query_by_phase_and_kind() {
        let log = sample();
        assert_eq!(log.for_phase("discovery").count(), 2);
        assert_eq!(log.for_phase("design").count(), 1);
        assert_eq!(log.of_kind(DecisionKind::Verdict).count(), 2);
    }

    #[test]
    fn test_supersede_appends_and_keeps_original() {
        let mut log = sample();
        let original = log.get(3).cloned().unwrap();
        let seq = log.supersede(3, &"fixed", "scorer bug").unwrap();

        assert_eq!(seq, 4);
        assert_eq!(log.get(3), Some(&original));
        let correction = log.get(4).unwrap();
        assert_eq!(correction.kind, DecisionKind::Superseded);
        assert_eq!(correction.phase.as_deref(), Some("design"));
        assert_eq!(log.superseded_by(3).map(|e| e.seq), Some(4));
    }

    #[test]
    fn test_supersede_unknown_entry() {
        let mut log = sample();
        assert!(log.supersede(99, &"x", "nothing to fix").is_none());
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn test_since() {
        let log = sample();
        assert_eq!(log.since(None).len(), 4);
        assert_eq!(log.since(Some(1)).len(), 2);
        assert!(log.since(Some(10)).is_empty());
    }
}
