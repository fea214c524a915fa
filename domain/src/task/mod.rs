//! Tasks and worker results
//!
//! A [`Task`](entities::Task) is created by the dispatcher and consumed by
//! exactly one worker; the worker's answer becomes an immutable
//! [`WorkerResult`](result::WorkerResult).

pub mod entities;
pub mod result;

pub use entities::{Task, TaskContext};
pub use result::{WorkerError, WorkerOutput, WorkerResult};
