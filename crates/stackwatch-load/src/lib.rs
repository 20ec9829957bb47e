//! stackwatch-load — synthetic traffic for a freshly started stack.
//!
//! The goal is observable traffic for the metrics pipeline, not a
//! correctness test: failed requests are tallied in the returned
//! [`LoadReport`](stackwatch_core::LoadReport) and otherwise ignored.

pub mod generator;

pub use generator::{generate_load, HttpSender, RequestSender};
