//! Build verdicts and the sink that aggregates them.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome severity assigned to a build. Ordered: later variants are worse.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    #[default]
    Success,
    Unstable,
    Failure,
    Error,
}

impl Verdict {
    /// Failure or worse.
    #[must_use]
    pub fn is_failing(self) -> bool {
        self >= Self::Failure
    }

    /// Human-facing label.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Unstable => "Unstable",
            Self::Failure => "Failure",
            Self::Error => "Error",
        }
    }

    /// Process exit code a CI host should use for this verdict.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Unstable => 10,
            Self::Failure => 11,
            Self::Error => 12,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Unstable => write!(f, "unstable"),
            Self::Failure => write!(f, "failure"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Receives verdicts on behalf of the surrounding build.
pub trait VerdictSink {
    /// Record a verdict with its reason. The aggregate never gets better.
    fn mark_as(&mut self, verdict: Verdict, reason: &str);

    /// True once the aggregate verdict is failure or worse.
    fn is_failure(&self) -> bool;

    /// Ask the host to halt the build.
    fn stop_build(&mut self);
}

/// A verdict recorded with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkedVerdict {
    pub verdict: Verdict,
    pub reason: String,
}

/// In-memory [`VerdictSink`] that keeps the worst verdict and every mark.
#[derive(Debug, Clone, Default)]
pub struct BuildVerdict {
    worst: Verdict,
    marks: Vec<MarkedVerdict>,
    stop_requested: bool,
}

impl BuildVerdict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Worst verdict seen so far.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        self.worst
    }

    #[must_use]
    pub fn marks(&self) -> &[MarkedVerdict] {
        &self.marks
    }

    /// Reason attached to the first mark that reached the current verdict.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.marks
            .iter()
            .find(|m| m.verdict == self.worst)
            .map(|m| m.reason.as_str())
    }

    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }
}

impl VerdictSink for BuildVerdict {
    fn mark_as(&mut self, verdict: Verdict, reason: &str) {
        self.worst = self.worst.max(verdict);
        self.marks.push(MarkedVerdict {
            verdict,
            reason: reason.to_string(),
        });
    }

    fn is_failure(&self) -> bool {
        self.worst.is_failing()
    }

    fn stop_build(&mut self) {
        self.stop_requested = true;
    }
}
