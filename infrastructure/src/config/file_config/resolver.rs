//! Conflict resolver configuration from TOML (`[resolver]` section)

use crate::config::issue::{ConfigIssue, ConfigIssueCode};
use phasegate_domain::{ResolverConfig, TieBreak};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw resolver settings
///
/// ```toml
/// [resolver]
/// tie_break = "manual"
/// veto_categories = ["legal"]
///
/// [resolver.weights]
/// stakeholder = 0.4
/// user = 0.6
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileResolverConfig {
    /// Source -> vote weight
    pub weights: BTreeMap<String, f64>,
    pub default_weight: Option<f64>,
    /// Replaces the built-in veto categories when set
    pub veto_categories: Option<Vec<String>>,
    pub tie_break: Option<String>,
}

impl FileResolverConfig {
    pub fn to_resolver_config(&self) -> (ResolverConfig, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut config = ResolverConfig::default();

        for (source, weight) in &self.weights {
            if weight.is_finite() && *weight >= 0.0 {
                config = config.with_weight(source, *weight);
            } else {
                issues.push(negative_weight(&format!("resolver.weights.{}", source), *weight));
            }
        }

        if let Some(weight) = self.default_weight {
            if weight.is_finite() && weight >= 0.0 {
                config = config.with_default_weight(weight);
            } else {
                issues.push(negative_weight("resolver.default_weight", weight));
            }
        }

        if let Some(categories) = &self.veto_categories {
            config = categories
                .iter()
                .fold(config.without_veto_categories(), |config, category| {
                    config.with_veto_category(category)
                });
        }

        if let Some(raw) = &self.tie_break {
            match raw.parse::<TieBreak>() {
                Ok(tie_break) => config = config.with_tie_break(tie_break),
                Err(_) => issues.push(ConfigIssue::invalid_enum(
                    "resolver.tie_break",
                    raw,
                    &["conservative", "manual"],
                    "conservative",
                )),
            }
        }

        (config, issues)
    }
}

fn negative_weight(field: &str, value: f64) -> ConfigIssue {
    ConfigIssue::warning(
        ConfigIssueCode::OutOfRange {
            field: field.to_string(),
            value,
        },
        format!("{}: weight {} ignored, weights must be >= 0", field, value),
    )
}
