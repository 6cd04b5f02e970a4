#![forbid(unsafe_code)]

//! loadgate: monitor a running load test and turn its metrics into a build
//! verdict (success / unstable / failure / error).
//!
//! A host feeds [`runner::listener::LoadTestListener`] one snapshot per
//! poll. The listener walks the monitoring state machine, waits out the
//! configured warm-up, evaluates thresholds every tick once checking has
//! begun, and forwards violations to a [`build::verdict::VerdictSink`].
//!
//! # Library usage
//!
//! ```rust,no_run
//! use loadgate::prelude::*;
//!
//! let config = Config::load(None)?;
//! let _listener = LoadTestListener::new(
//!     ListenerOptions::from(&config),
//!     ConsoleLogger::new(false),
//!     BuildVerdict::new(),
//! );
//! # Ok::<(), loadgate::core::errors::LgError>(())
//! ```

pub mod prelude;

pub mod build;
pub mod client;
pub mod core;
pub mod logger;
pub mod monitor;
pub mod runner;
