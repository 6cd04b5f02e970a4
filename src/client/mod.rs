//! Remote service model and the narrow client interfaces the listener consumes,
//! plus a recorded-session client for offline replays.

pub mod replay;
pub mod source;
pub mod types;
