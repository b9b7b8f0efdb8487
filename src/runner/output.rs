//! Destinations for child output lines.

use tracing::{info, warn};

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives child output one line at a time, in arrival order.
pub trait OutputSink: Send {
    fn line(&mut self, stream: OutputStream, line: &str);
}

/// Relays stdout at info level and stderr at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn line(&mut self, stream: OutputStream, line: &str) {
        match stream {
            OutputStream::Stdout => info!("{}", line),
            OutputStream::Stderr => warn!("{}", line),
        }
    }
}

/// Collects lines in memory.
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    pub lines: Vec<(OutputStream, String)>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines received from one stream, in order.
    pub fn stream(&self, stream: OutputStream) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, l)| l.as_str())
            .collect()
    }
}

impl OutputSink for BufferSink {
    fn line(&mut self, stream: OutputStream, line: &str) {
        self.lines.push((stream, line.to_string()));
    }
}
