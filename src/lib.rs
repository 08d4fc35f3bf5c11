//! Potsie - xAPI video statements to time series metrics
//!
//! Potsie turns xAPI "video profile" statements stored in a Learning Record
//! Store into a time ordered metrics table through a one-way pipeline:
//! raw records → typed statements → per-verb metrics → selected subsets →
//! grouped counts.
//!
//! ## Modules
//!
//! - **Schema**: fault-tolerant accessors over raw xAPI statements
//! - **Extraction**: verb-driven conversion of statements into metric rows
//! - **Aggregation**: per-verb selection and time/timecode distributions
//! - **LRS**: paginated access to the Learning Record Store

pub mod aggregate;
pub mod config;
pub mod error;
pub mod extract;
pub mod factories;
pub mod lrs;
pub mod pipeline;
pub mod schema;
pub mod types;

pub use aggregate::{distribution, select_for_verb, GroupBy, Period};
pub use error::{ConfigurationError, LrsApiError, PotsieError, RecordParsingError};
pub use extract::extract_metrics;
pub use pipeline::{metrics_for_video_id, records_to_metrics};

// Schema exports
pub use schema::{RawRecord, Statement, VideoRecord};

// Metrics exports
pub use types::{MetricColumn, MetricsTable, Verb, VideoMetric};

/// Potsie version
pub const POTSIE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "potsie";
