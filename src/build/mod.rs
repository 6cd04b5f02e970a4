//! Build-side collaborator: verdict severity and the sink that aggregates it.

pub mod verdict;
