//! NoBet Insight - Deterministic behavioral risk scoring for gambling-recovery diaries
//!
//! The engine turns one user's diary entries and block events into a combined
//! risk assessment through a deterministic pipeline: record adaptation →
//! feature extraction → four independent scoring modules → aggregation →
//! payload encoding.
//!
//! ## Modules
//!
//! - **Neural risk score**: a small fixed-weight network over six behavioral features
//! - **Sentiment**: lexicon scoring of diary notes with a trend over time
//! - **Anomalies**: Z-score spikes in daily spending, episodes and block attempts
//! - **Archetype**: a rule-based behavioral pattern used for personalized messaging
//!
//! Every call is a pure function of its input: the same bundle always yields
//! the same payload, byte for byte.

pub mod aggregator;
pub mod anomaly;
pub mod archetype;
pub mod baseline;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod neural;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod sentiment;
pub mod thresholds;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregator::{CombinedRisk, RiskAggregator};
pub use config::EngineConfig;
pub use encoder::AssessmentEncoder;
pub use error::EngineError;
pub use pipeline::{assess_risk_json, Assessment, RiskEngine};
pub use thresholds::{OverallRisk, RiskLevel, Severity};

// Schema exports
pub use schema::{AssessmentBundle, RecordAdapter};

/// Engine version embedded in every payload
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for payloads
pub const ENGINE_NAME: &str = "nobet-insight";
