//! Run orchestration: the per-tick listener and a polling host around it.

pub mod driver;
pub mod listener;
#[cfg(feature = "daemon")]
pub mod signals;
