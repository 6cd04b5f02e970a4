//! Monitoring core: lifecycle state machine, progress tracking, the
//! threshold-window gate, and threshold evaluation.

pub mod gate;
pub mod progress;
pub mod state;
pub mod threshold;
pub mod window;
