//! servicepath load testing.
//!
//! Drives repeated resolutions of one output at a fixed rate and aggregates
//! pass/fail counts and response times. Rendering is left to observers.

#![warn(missing_docs)]

mod config;
mod driver;
mod observer;
mod stats;

pub use config::{LoadTestConfig, DEFAULT_DURATION, DEFAULT_MAX_RESPONSE_TIME, DEFAULT_RATE};
pub use driver::{LoadTestDriver, Sample};
pub use observer::{LoadTestObserver, NoopObserver, TracingObserver};
pub use stats::LoadTestStats;
