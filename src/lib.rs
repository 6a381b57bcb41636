//! Relationship tracker: contacts, outreach sequences and the tasks derived from
//! enrolling contacts into sequences.

pub mod config;
pub mod db;
pub mod model;
pub mod store;
pub mod tasks;

pub use store::Store;
