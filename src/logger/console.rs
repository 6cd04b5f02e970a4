//! Line-oriented logging for the listener: a message channel for progress
//! and a failure channel for errors and failed runs.

#![allow(missing_docs)]

use std::io::{self, Write};

/// Where the listener writes its human-readable lines.
pub trait LoadTestLogger {
    fn message(&mut self, line: &str);

    fn failure(&mut self, line: &str);

    /// Verbose diagnostics. Ignored unless the logger opts in.
    fn debug(&mut self, _line: &str) {}
}

impl<T: LoadTestLogger + ?Sized> LoadTestLogger for Box<T> {
    fn message(&mut self, line: &str) {
        (**self).message(line);
    }

    fn failure(&mut self, line: &str) {
        (**self).failure(line);
    }

    fn debug(&mut self, line: &str) {
        (**self).debug(line);
    }
}

/// Output stream a console line goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Plain stdout/stderr logger. Messages go to stdout (or stderr when stdout
/// is reserved for machine output), failures always to stderr, debug lines
/// to stderr only when verbose. Quiet mode keeps failures only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLogger {
    verbose: bool,
    quiet: bool,
    messages_to_stderr: bool,
}

impl ConsoleLogger {
    #[must_use]
    pub const fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            messages_to_stderr: false,
        }
    }

    #[must_use]
    pub const fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    #[must_use]
    pub const fn messages_to_stderr(mut self, enabled: bool) -> Self {
        self.messages_to_stderr = enabled;
        self
    }

    /// Where a line on `channel` is written, or `None` if it is suppressed.
    #[must_use]
    pub const fn route(&self, channel: Channel) -> Option<Stream> {
        match channel {
            Channel::Failure => Some(Stream::Stderr),
            Channel::Message if self.quiet => None,
            Channel::Message if self.messages_to_stderr => Some(Stream::Stderr),
            Channel::Message => Some(Stream::Stdout),
            Channel::Debug if self.verbose => Some(Stream::Stderr),
            Channel::Debug => None,
        }
    }

    /// Write `line` to the stream `channel` routes to.
    pub fn write(&self, channel: Channel, line: &str) {
        let _ = match self.route(channel) {
            Some(Stream::Stdout) => writeln!(io::stdout(), "{line}"),
            Some(Stream::Stderr) => writeln!(io::stderr(), "{line}"),
            None => Ok(()),
        };
    }
}

impl LoadTestLogger for ConsoleLogger {
    fn message(&mut self, line: &str) {
        self.write(Channel::Message, line);
    }

    fn failure(&mut self, line: &str) {
        self.write(Channel::Failure, line);
    }

    fn debug(&mut self, line: &str) {
        self.write(Channel::Debug, line);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Message,
    Failure,
    Debug,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub channel: Channel,
    pub text: String,
}

/// Records every line in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogger {
    lines: Vec<LogLine>,
}

impl MemoryLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.on(Channel::Message)
    }

    pub fn failures(&self) -> impl Iterator<Item = &str> {
        self.on(Channel::Failure)
    }

    /// Number of lines on any channel containing `needle`.
    #[must_use]
    pub fn count_containing(&self, needle: &str) -> usize {
        self.lines.iter().filter(|l| l.text.contains(needle)).count()
    }

    fn on(&self, channel: Channel) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(move |l| l.channel == channel)
            .map(|l| l.text.as_str())
    }

    fn push(&mut self, channel: Channel, text: &str) {
        self.lines.push(LogLine {
            channel,
            text: text.to_string(),
        });
    }
}

impl LoadTestLogger for MemoryLogger {
    fn message(&mut self, line: &str) {
        self.push(Channel::Message, line);
    }

    fn failure(&mut self, line: &str) {
        self.push(Channel::Failure, line);
    }

    fn debug(&mut self, line: &str) {
        self.push(Channel::Debug, line);
    }
}
