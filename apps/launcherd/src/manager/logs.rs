use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

use launcher_core::proto::{LogLine, LogStream};

/// Bounded in-memory rings for interface output and the daemon's own log.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<Mutex<LogState>>,
}

struct LogState {
    interface: VecDeque<LogLine>,
    daemon: VecDeque<LogLine>,
    max_lines: usize,
}

impl LogStore {
    pub fn new(max_lines: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogState {
                interface: VecDeque::with_capacity(max_lines.min(1024)),
                daemon: VecDeque::with_capacity(max_lines.min(1024)),
                max_lines: max_lines.max(100),
            })),
        }
    }

    pub fn push_interface(&self, stream: LogStream, line: String) {
        let mut guard = self.inner.lock().expect("log lock poisoned");
        let entry = LogLine {
            at_ms: now_millis(),
            stream,
            line,
        };
        let max_lines = guard.max_lines;
        push_bounded(&mut guard.interface, max_lines, entry);
    }

    pub fn push_daemon(&self, line: String) {
        let mut guard = self.inner.lock().expect("log lock poisoned");
        let entry = LogLine {
            at_ms: now_millis(),
            stream: LogStream::Stdout,
            line,
        };
        let max_lines = guard.max_lines;
        push_bounded(&mut guard.daemon, max_lines, entry);
    }

    /// Last `lines` interface lines plus whether older lines were dropped
    /// from the reply.
    pub fn tail_interface(&self, lines: usize) -> (Vec<LogLine>, bool) {
        let guard = self.inner.lock().expect("log lock poisoned");
        (tail(&guard.interface, lines), guard.interface.len() > lines)
    }

    pub fn tail_daemon(&self, lines: usize) -> (Vec<LogLine>, bool) {
        let guard = self.inner.lock().expect("log lock poisoned");
        (tail(&guard.daemon, lines), guard.daemon.len() > lines)
    }

    pub fn daemon_writer(&self) -> DaemonLogTee {
        DaemonLogTee { store: self.clone() }
    }
}

fn push_bounded(buf: &mut VecDeque<LogLine>, max_lines: usize, entry: LogLine) {
    while buf.len() >= max_lines {
        buf.pop_front();
    }
    buf.push_back(entry);
}

fn tail(buf: &VecDeque<LogLine>, lines: usize) -> Vec<LogLine> {
    buf.iter()
        .skip(buf.len().saturating_sub(lines))
        .cloned()
        .collect()
}

/// MakeWriter for the tracing fmt layer: every formatted record lands in
/// the daemon ring and is echoed to stdout unchanged.
pub struct DaemonLogTee {
    store: LogStore,
}

impl<'a> MakeWriter<'a> for DaemonLogTee {
    type Writer = TeeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TeeWriter {
            store: self.store.clone(),
            pending: Vec::new(),
        }
    }
}

pub struct TeeWriter {
    store: LogStore,
    // Holds the tail of a record when a write ends mid-line.
    pending: Vec<u8>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(line) = take_line(&mut self.pending) {
            if !line.trim().is_empty() {
                self.store.push_daemon(line);
            }
        }

        io::stdout().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let pos = pending.iter().position(|b| *b == b'\n')?;
    let rest = pending.split_off(pos + 1);
    let line = String::from_utf8_lossy(pending)
        .trim_end_matches(['\r', '\n'])
        .to_string();
    *pending = rest;
    Some(line)
}

pub(crate) fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rings_are_bounded() {
        let logs = LogStore::new(100);
        for i in 0..250 {
            logs.push_interface(LogStream::Stdout, format!("line {i}"));
        }
        let (lines, truncated) = logs.tail_interface(500);
        assert_eq!(lines.len(), 100);
        assert_eq!(lines.first().unwrap().line, "line 150");
        assert_eq!(lines.last().unwrap().line, "line 249");
        assert!(!truncated);
    }

    #[test]
    fn tail_reports_truncation() {
        let logs = LogStore::new(100);
        for i in 0..20 {
            logs.push_daemon(format!("daemon {i}"));
        }
        let (lines, truncated) = logs.tail_daemon(5);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines.first().unwrap().line, "daemon 15");
        assert!(truncated);
    }
}
