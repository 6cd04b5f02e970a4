//! Logging: console lines for humans, JSONL activity log for machines.

pub mod activity;
pub mod console;
pub mod jsonl;
