//! Run settings container.
//!
//! [`RunSettings`] groups the three configuration types a run needs into a
//! single value the control service hands to every run it starts.
//!
//! | Type | Used by |
//! |------|---------|
//! | `GatePolicy` | `QualityGate` |
//! | `ResolverConfig` | `ConflictResolver` |
//! | `DispatchParams` | `PhaseDispatcher` |

use crate::config::DispatchParams;
use phasegate_domain::{GatePolicy, ResolverConfig};

#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    gate: GatePolicy,
    resolver: ResolverConfig,
    dispatch: DispatchParams,
}

impl RunSettings {
    pub fn new(gate: GatePolicy, resolver: ResolverConfig, dispatch: DispatchParams) -> Self {
        Self {
            gate,
            resolver,
            dispatch,
        }
    }

    pub fn gate(&self) -> &GatePolicy {
        &self.gate
    }

    pub fn resolver(&self) -> &ResolverConfig {
        &self.resolver
    }

    pub fn dispatch(&self) -> &DispatchParams {
        &self.dispatch
    }

    pub fn with_gate(mut self, gate: GatePolicy) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchParams) -> Self {
        self.dispatch = dispatch;
        self
    }
}
