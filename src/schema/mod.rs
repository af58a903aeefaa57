//! Assessment input schema
//!
//! Loosely-typed bundles as submitted by the diary store, and the adapter
//! that validates them record by record into an `AssessmentRequest`.

mod adapter;
mod record;

pub use adapter::*;
pub use record::*;
