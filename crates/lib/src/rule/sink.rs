//! Output sinks for rules and the executor.
//!
//! Every rule writes its narration, process output and log messages to
//! explicit sinks handed to it at construction. The default sinks forward to
//! `tracing`; tests swap in a [`Recorder`] to assert on exactly what was
//! emitted.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::Level;

/// Something that accepts one line of output at a time.
pub trait LogSink: Send + Sync {
  fn write(&self, line: &str);
}

impl<F> LogSink for F
where
  F: Fn(&str) + Send + Sync,
{
  fn write(&self, line: &str) {
    self(line)
  }
}

/// Forwards lines to `tracing` at a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink(pub Level);

impl LogSink for TracingSink {
  fn write(&self, line: &str) {
    let level = self.0;
    if level == Level::ERROR {
      tracing::error!("{}", line);
    } else if level == Level::WARN {
      tracing::warn!("{}", line);
    } else if level == Level::INFO {
      tracing::info!("{}", line);
    } else if level == Level::DEBUG {
      tracing::debug!("{}", line);
    } else {
      tracing::trace!("{}", line);
    }
  }
}

/// A cheaply clonable handle to a [`LogSink`].
#[derive(Clone)]
pub struct Sink(Arc<dyn LogSink>);

impl Sink {
  pub fn new(sink: impl LogSink + 'static) -> Self {
    Self(Arc::new(sink))
  }

  pub fn tracing(level: Level) -> Self {
    Self::new(TracingSink(level))
  }

  /// Default sink for standard output and narration.
  pub fn info() -> Self {
    Self::tracing(Level::INFO)
  }

  /// Default sink for standard error and warnings.
  pub fn warn() -> Self {
    Self::tracing(Level::WARN)
  }

  /// Default sink for executor failures.
  pub fn error() -> Self {
    Self::tracing(Level::ERROR)
  }

  pub fn write(&self, line: &str) {
    self.0.write(line)
  }
}

impl fmt::Debug for Sink {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Sink")
  }
}

/// One captured line and the level it was written at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
  pub level: Level,
  pub message: String,
}

/// Captures lines from any number of sinks into one ordered list.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
  events: Arc<Mutex<Vec<LogEvent>>>,
}

impl Recorder {
  pub fn new() -> Self {
    Self::default()
  }

  /// A sink that records every line at `level`.
  pub fn sink(&self, level: Level) -> Sink {
    let events = Arc::clone(&self.events);
    Sink::new(move |line: &str| {
      if let Ok(mut events) = events.lock() {
        events.push(LogEvent {
          level,
          message: line.to_string(),
        });
      }
    })
  }

  pub fn events(&self) -> Vec<LogEvent> {
    self.events.lock().map(|e| e.clone()).unwrap_or_default()
  }

  /// Messages in capture order, regardless of level.
  pub fn messages(&self) -> Vec<String> {
    self.events().into_iter().map(|e| e.message).collect()
  }

  /// Messages captured at `level`.
  pub fn messages_at(&self, level: Level) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter(|e| e.level == level)
      .map(|e| e.message)
      .collect()
  }

  pub fn count(&self, level: Level) -> usize {
    self.messages_at(level).len()
  }
}
