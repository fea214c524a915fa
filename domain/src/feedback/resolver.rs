//! Weighted conflict resolution
//!
//! Pure and synchronous: the resolver only sees feedback that has already been
//! collected. Items are sorted into a canonical order before anything is
//! summed, so the outcome (scores, rationale text included) does not depend on
//! the order items arrived in.

use super::conflict::{ConflictOutcome, ConflictRecord, Resolution};
use super::item::{FeedbackAction, FeedbackItem};
use super::tie_break::TieBreak;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Weighted sums closer than this are treated as a tie
const TIE_EPSILON: f64 = 1e-9;

/// Resolver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Per-source vote weight
    pub weights: BTreeMap<String, f64>,
    /// Weight for sources missing from `weights`
    pub default_weight: f64,
    /// Categories whose items carry veto authority
    pub veto_categories: BTreeSet<String>,
    pub tie_break: TieBreak,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            default_weight: 1.0,
            veto_categories: ["accessibility-critical", "legal"]
                .into_iter()
                .map(String::from)
                .collect(),
            tie_break: TieBreak::default(),
        }
    }
}

impl ResolverConfig {
    pub fn with_weight(mut self, source: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(source.into(), weight);
        self
    }

    pub fn with_default_weight(mut self, weight: f64) -> Self {
        self.default_weight = weight;
        self
    }

    pub fn with_veto_category(mut self, category: impl Into<String>) -> Self {
        self.veto_categories.insert(category.into());
        self
    }

    pub fn without_veto_categories(mut self) -> Self {
        self.veto_categories.clear();
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Vote weight of a source; negative or non-finite weights count as 0
    pub fn weight_of(&self, source: &str) -> f64 {
        let weight = self
            .weights
            .get(source)
            .copied()
            .unwrap_or(self.default_weight);
        if weight.is_finite() && weight > 0.0 {
            weight
        } else {
            0.0
        }
    }

    pub fn has_veto(&self, item: &FeedbackItem) -> bool {
        item.category
            .as_ref()
            .is_some_and(|c| self.veto_categories.contains(c))
    }
}

/// Reconciles disagreeing feedback into one action per subject
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    config: ResolverConfig,
}

impl ConflictResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve every conflicting subject in `items`.
    ///
    /// Subjects whose items all agree are not conflicts and produce no record.
    /// Records are returned sorted by subject.
    pub fn resolve(&self, items: &[FeedbackItem]) -> Vec<ConflictRecord> {
        let mut by_subject: BTreeMap<&str, Vec<FeedbackItem>> = BTreeMap::new();
        for item in items {
            by_subject
                .entry(item.subject.as_str())
                .or_default()
                .push(item.clone());
        }

        by_subject
            .into_iter()
            .filter_map(|(subject, mut group)| {
                group.sort_by(|a, b| a.canonical_cmp(b));
                let disagree = group.iter().any(|i| i.action != group[0].action);
                if group.len() < 2 || !disagree {
                    return None;
                }
                let outcome = self.resolve_subject(subject, &group);
                Some(ConflictRecord {
                    subject: subject.to_string(),
                    items: group,
                    outcome,
                })
            })
            .collect()
    }

    /// Resolve one subject; `items` must already be in canonical order
    fn resolve_subject(&self, subject: &str, items: &[FeedbackItem]) -> ConflictOutcome {
        let vetoes: Vec<&FeedbackItem> = items.iter().filter(|i| self.config.has_veto(i)).collect();
        if let Some(action) = vetoes.iter().map(|i| i.action).max() {
            let holders = vetoes
                .iter()
                .filter(|i| i.action == action)
                .map(|i| {
                    format!(
                        "{} ({})",
                        i.label(),
                        i.category.as_deref().unwrap_or_default()
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            return ConflictOutcome::Resolved(Resolution {
                subject: subject.to_string(),
                action,
                confidence: 1.0,
                rationale: format!(
                    "subject '{}': {} by veto of {} over {}",
                    subject,
                    action,
                    holders,
                    self.describe(items)
                ),
                contributing: items.to_vec(),
                vetoed: true,
            });
        }

        let mut sums: BTreeMap<FeedbackAction, f64> = BTreeMap::new();
        for item in items {
            *sums.entry(item.action).or_default() += self.config.weight_of(&item.source);
        }
        let total: f64 = sums.values().sum();
        let best = sums.values().copied().fold(0.0_f64, f64::max);
        let leaders: Vec<FeedbackAction> = sums
            .iter()
            .filter(|(_, w)| (best - **w).abs() <= TIE_EPSILON)
            .map(|(a, _)| *a)
            .collect();

        let (action, tied) = match leaders.as_slice() {
            [single] => (*single, false),
            _ => match self.config.tie_break {
                TieBreak::Conservative => match leaders.iter().max() {
                    Some(action) => (*action, true),
                    None => (FeedbackAction::Reject, true),
                },
                TieBreak::Manual => {
                    return ConflictOutcome::Unresolved {
                        reason: format!(
                            "subject '{}': tied at {:.2} between {} with no tie-break configured; {}",
                            subject,
                            best,
                            leaders
                                .iter()
                                .map(|a| a.as_str())
                                .collect::<Vec<_>>()
                                .join(" and "),
                            self.describe(items)
                        ),
                    };
                }
            },
        };

        let winning = sums.get(&action).copied().unwrap_or_default();
        let losing = total - winning;
        let confidence = if total > 0.0 {
            ((winning - losing).abs() / total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let rationale = if tied {
            format!(
                "subject '{}': tie at {:.2}, {} chosen as the more conservative action; {}",
                subject,
                winning,
                action,
                self.describe(items)
            )
        } else {
            format!(
                "subject '{}': {} wins {:.2} vs {:.2}; {}",
                subject,
                action,
                winning,
                losing,
                self.describe(items)
            )
        };

        ConflictOutcome::Resolved(Resolution {
            subject: subject.to_string(),
            action,
            confidence,
            rationale,
            contributing: items.to_vec(),
            vetoed: false,
        })
    }

    fn describe(&self, items: &[FeedbackItem]) -> String {
        let parts = items
            .iter()
            .map(|i| format!("{}({:.2})", i.label(), self.config.weight_of(&i.source)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("[{}]", parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weighted() -> ConflictResolver {
        ConflictResolver::new(
            ResolverConfig::default()
                .with_weight("stakeholder", 0.4)
                .with_weight("user", 0.6),
        )
    }

    fn only(records: &[ConflictRecord]) -> &Resolution {
        assert_eq!(records.len(), 1);
        records[0].outcome.resolution().unwrap()
    }

    #[test]
    fn test_weighted_vote_user_wins() {
        let records = weighted().resolve(&[
            FeedbackItem::reject("stakeholder", "x", "no"),
            FeedbackItem::accept("user", "x", "yes"),
        ]);
        let resolution = only(&records);
        assert_eq!(resolution.action, FeedbackAction::Accept);
        assert!((resolution.confidence - 0.2).abs() < 1e-9);
        assert!(!resolution.vetoed);
        assert!(resolution.rationale.contains("stakeholder:reject"));
        assert!(resolution.rationale.contains("user:accept"));
    }

    #[test]
    fn test_agreement_is_not_a_conflict() {
        let records = weighted().resolve(&[
            FeedbackItem::accept("stakeholder", "x", ""),
            FeedbackItem::accept("user", "x", ""),
            FeedbackItem::reject("user", "y", ""),
        ]);
        assert!(records.is_empty());
    }

    #[test]
    fn test_veto_overrides_weight() {
        let records = weighted().resolve(&[
            FeedbackItem::reject("stakeholder", "x", "contrast too low")
                .with_category("accessibility-critical"),
            FeedbackItem::accept("user", "x", ""),
            FeedbackItem::accept("user", "x", "love it"),
        ]);
        let resolution = only(&records);
        assert_eq!(resolution.action, FeedbackAction::Reject);
        assert!(resolution.vetoed);
        assert_eq!(resolution.confidence, 1.0);
    }

    #[test]
    fn test_conflicting_vetoes_pick_conservative() {
        let records = weighted().resolve(&[
            FeedbackItem::accept("user", "x", "").with_category("legal"),
            FeedbackItem::new("stakeholder", "x", FeedbackAction::Revise, "")
                .with_category("legal"),
        ]);
        assert_eq!(only(&records).action, FeedbackAction::Revise);
    }

    #[test]
    fn test_category_without_veto_authority_is_ordinary_vote() {
        let records = weighted().resolve(&[
            FeedbackItem::reject("stakeholder", "x", "").with_category("taste"),
            FeedbackItem::accept("user", "x", ""),
        ]);
        let resolution = only(&records);
        assert_eq!(resolution.action, FeedbackAction::Accept);
        assert!(!resolution.vetoed);
    }

    #[test]
    fn test_tie_goes_to_conservative_action() {
        let resolver = ConflictResolver::default();
        let records = resolver.resolve(&[
            FeedbackItem::accept("a", "x", ""),
            FeedbackItem::reject("b", "x", ""),
        ]);
        let resolution = only(&records);
        assert_eq!(resolution.action, FeedbackAction::Reject);
        assert_eq!(resolution.confidence, 0.0);
        assert!(resolution.rationale.contains("tie"));
    }

    #[test]
    fn test_tie_with_manual_policy_is_unresolved() {
        let resolver =
            ConflictResolver::new(ResolverConfig::default().with_tie_break(TieBreak::Manual));
        let records = resolver.resolve(&[
            FeedbackItem::accept("a", "x", ""),
            FeedbackItem::reject("b", "x", ""),
        ]);
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_resolved());
        assert!(records[0].require_resolution().is_err());
    }

    #[test]
    fn test_three_way_confidence_uses_all_losing_weight() {
        let resolver = ConflictResolver::new(
            ResolverConfig::default()
                .with_weight("a", 0.5)
                .with_weight("b", 0.3)
                .with_weight("c", 0.2),
        );
        let records = resolver.resolve(&[
            FeedbackItem::accept("a", "x", ""),
            FeedbackItem::new("b", "x", FeedbackAction::Revise, ""),
            FeedbackItem::reject("c", "x", ""),
        ]);
        let resolution = only(&records);
        assert_eq!(resolution.action, FeedbackAction::Accept);
        assert!(resolution.confidence.abs() < 1e-9);
    }

    #[test]
    fn test_unknown_source_uses_default_weight() {
        let resolver = ConflictResolver::new(
            ResolverConfig::default()
                .with_weight("user", 0.6)
                .with_default_weight(0.1),
        );
        let records = resolver.resolve(&[
            FeedbackItem::accept("user", "x", ""),
            FeedbackItem::reject("intern", "x", ""),
        ]);
        assert_eq!(only(&records).action, FeedbackAction::Accept);
    }

    #[test]
    fn test_records_sorted_by_subject() {
        let records = weighted().resolve(&[
            FeedbackItem::accept("user", "zeta", ""),
            FeedbackItem::reject("stakeholder", "zeta", ""),
            FeedbackItem::accept("user", "alpha", ""),
            FeedbackItem::reject("stakeholder", "alpha", ""),
        ]);
        let subjects: Vec<_> = records.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_reordering_does_not_change_outcome() {
        let items = vec![
            FeedbackItem::reject("stakeholder", "x", "a"),
            FeedbackItem::accept("user", "x", "b"),
            FeedbackItem::accept("stakeholder", "x", "c"),
        ];
        let mut reversed = items.clone();
        reversed.reverse();
        assert_eq!(weighted().resolve(&items), weighted().resolve(&reversed));
    }

    mod permutation {
        use super::*;
        use proptest::prelude::*;

        fn arb_item() -> impl Strategy<Value = FeedbackItem> {
            (
                prop_oneof![Just("user"), Just("stakeholder"), Just("intern")],
                prop_oneof![Just("logo"), Just("palette")],
                prop_oneof![
                    Just(FeedbackAction::Accept),
                    Just(FeedbackAction::Revise),
                    Just(FeedbackAction::Reject)
                ],
                prop::option::of(prop_oneof![Just("legal"), Just("tone")]),
            )
                .prop_map(|(source, subject, action, category)| {
                    let item = FeedbackItem::new(source, subject, action, "");
                    match category {
                        Some(category) => item.with_category(category),
                        None => item,
                    }
                })
        }

        fn arb_permuted() -> impl Strategy<Value = (Vec<FeedbackItem>, Vec<FeedbackItem>)> {
            prop::collection::vec(arb_item(), 0..10)
                .prop_flat_map(|items| (Just(items.clone()), Just(items).prop_shuffle()))
        }

        proptest! {
            #[test]
            fn resolution_ignores_input_order((items, shuffled) in arb_permuted()) {
                prop_assert_eq!(weighted().resolve(&items), weighted().resolve(&shuffled));
            }

            #[test]
            fn manual_tie_break_ignores_input_order((items, shuffled) in arb_permuted()) {
                let resolver = ConflictResolver::new(
                    ResolverConfig::default().with_tie_break(TieBreak::Manual),
                );
                prop_assert_eq!(resolver.resolve(&items), resolver.resolve(&shuffled));
            }
        }
    }
}
