//! Feedback and conflict resolution
//!
//! Feedback items arrive from workers (as part of their results) and from
//! external callers (out-of-band submissions). When two or more items about
//! the same subject disagree, the [`ConflictResolver`] reconciles them.
//!
//! # Resolution order
//!
//! ```text
//! items on subject ──► agree? ──yes──► no conflict
//!                        │no
//!                        ▼
//!                  any veto item? ──yes──► most conservative vetoing action
//!                        │no
//!                        ▼
//!                  weighted sum per action
//!                        │
//!               unique max? ──yes──► winner
//!                        │no
//!                        ▼
//!                  TieBreak::Conservative ──► most conservative tied action
//!                  TieBreak::Manual       ──► Unresolved (manual decision)
//! ```

pub mod conflict;
pub mod item;
pub mod resolver;
pub mod tie_break;

pub use conflict::{ConflictOutcome, ConflictRecord, Resolution};
pub use item::{FeedbackAction, FeedbackItem, FeedbackSeverity};
pub use resolver::{ConflictResolver, ResolverConfig};
pub use tie_break::TieBreak;
