//! Derived task engine.
//!
//! Tasks are not stored. Every read joins the user's contacts, sequences, steps,
//! assignments and completion marks and projects one task per (assignment, step).

pub mod buckets;
pub mod loader;
pub mod projector;

pub use buckets::{by_due_date, Bucket, TaskBuckets, TaskSummary};
pub use loader::{load_derived_tasks, TaskSource};
pub use projector::{due_date, project, resolve_offset, TaskInputs, UNKNOWN_NAME};
