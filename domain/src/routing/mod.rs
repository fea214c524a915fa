//! Feedback routing on gate failures

pub mod iteration;
pub mod router;

pub use iteration::{IterationContext, IterationRecord, RoutingDecision};
pub use router::{FeedbackRouter, IterationCounts};
