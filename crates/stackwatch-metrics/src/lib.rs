//! stackwatch-metrics — end-to-end metrics validation.
//!
//! Confirms that metrics produced by the stack are visible through the
//! Prometheus query API, and renders the final run report.
//!
//! # Architecture
//!
//! ```text
//! validate_metrics(names)
//!   └── query_samples(name) → GET <endpoint>/api/v1/query?query=<name>
//!       └── parse_response() → Vec<Sample>
//!
//! Report { services, load, metrics }
//!   ├── render_text() / render_json()
//!   └── exit_code()
//! ```

pub mod query;
pub mod report;

pub use query::{query_samples, validate_metrics, QueryError, Sample};
pub use report::Report;
