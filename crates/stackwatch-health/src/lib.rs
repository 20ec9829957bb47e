//! stackwatch-health — readiness checking for a multi-service stack.
//!
//! Provides HTTP and TCP probes, bounded per-service wait loops and the
//! ordered startup sequence that drives a whole stack to readiness.
//!
//! # Architecture
//!
//! ```text
//! run_startup_sequence(specs)
//!   └── for each spec, in order
//!       └── wait_for_healthy(spec)
//!           ├── Prober::probe() → ProbeResult
//!           ├── AttemptTracker (attempt count, terminal state)
//!           └── sleep(poll_interval) between attempts
//! ```
//!
//! # Failure semantics
//!
//! Nothing in this crate returns an error. A failed request is a failed
//! attempt; an exhausted budget is a `TimedOut` status. Callers decide
//! whether a timed-out service is fatal based on `ServiceStatus::mandatory`.

pub mod checker;
pub mod waiter;

pub use checker::{http_probe, tcp_probe, AttemptTracker, NetworkProber, ProbeResult, Prober};
pub use waiter::{run_startup_sequence, snapshot, wait_for_healthy};
