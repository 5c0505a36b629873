//! Rules: the steps a build plan is made of.
//!
//! A [`Rule`] is one of three closed kinds:
//! - an action, a native closure run in-process
//! - a process, an external command whose output is streamed live
//! - a log line, pure narration
//!
//! Every kind exposes the same [`Rule::invoke`]. Action and process rules
//! announce themselves with `Running <description>` before doing anything,
//! and under dry-run they stop right after that announcement. Any failure is
//! normalized into a [`RuleError`].

mod process;
mod sink;
mod types;

pub use process::ProcessSpec;
pub use sink::{LogEvent, LogSink, Recorder, Sink, TracingSink};
pub use types::*;

use std::backtrace::Backtrace;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::Level;

type ActionFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type ActionFn = Arc<dyn Fn() -> ActionFuture + Send + Sync>;

/// A native callable with a name and the arguments it was bound to.
///
/// Arguments are captured by the closure; `args` only feeds the description.
#[derive(Clone)]
pub struct ActionRule {
  pub function: String,
  pub args: Vec<String>,
  f: ActionFn,
}

impl ActionRule {
  pub fn new<F>(function: impl Into<String>, f: F) -> Self
  where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
  {
    Self::new_async(function, move || {
      let result = f();
      async move { result }
    })
  }

  pub fn new_async<F, Fut>(function: impl Into<String>, f: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    Self {
      function: function.into(),
      args: Vec::new(),
      f: Arc::new(move || Box::pin(f()) as ActionFuture),
    }
  }

  /// Record the bound arguments shown in the description.
  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args = args.into_iter().map(Into::into).collect();
    self
  }

  async fn run(&self, description: &str) -> Result<Outcome, RuleError> {
    match (self.f)().await {
      Ok(()) => Ok(Outcome::Completed),
      Err(err) => {
        let diagnostic = action_diagnostic(&err, &Backtrace::force_capture());
        Err(RuleError::new(description, RuleFailure::Action(err), diagnostic))
      }
    }
  }
}

/// Causes below the top-level message, then the stack at the point of failure.
fn action_diagnostic(err: &anyhow::Error, backtrace: &Backtrace) -> String {
  let mut diagnostic = String::new();
  for cause in err.chain().skip(1) {
    diagnostic.push_str(&format!("Caused by: {}\n", cause));
  }
  diagnostic.push_str(&format!("Stack backtrace:\n{}", backtrace));
  diagnostic
}

impl fmt::Display for ActionRule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ActionRule: {{ function: {}", self.function)?;
    if !self.args.is_empty() {
      write!(f, ", args: {:?}", self.args)?;
    }
    f.write_str(" }")
  }
}

impl fmt::Debug for ActionRule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ActionRule")
      .field("function", &self.function)
      .field("args", &self.args)
      .finish_non_exhaustive()
  }
}

/// A message written to the stdout sink (info) or the stderr sink (warn).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRule {
  pub message: String,
  pub level: Level,
}

impl fmt::Display for LogRule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "LogRule: {:?}", self.message)
  }
}

#[derive(Debug, Clone)]
pub enum RuleKind {
  Action(ActionRule),
  Process(ProcessSpec),
  Log(LogRule),
}

/// One executable or loggable step of a build plan.
#[derive(Debug, Clone)]
pub struct Rule {
  kind: RuleKind,
  stdout: Sink,
  stderr: Sink,
}

impl Rule {
  fn with_kind(kind: RuleKind) -> Self {
    Self {
      kind,
      stdout: Sink::info(),
      stderr: Sink::warn(),
    }
  }

  /// A synchronous native action.
  pub fn action<F>(function: impl Into<String>, f: F) -> Self
  where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
  {
    ActionRule::new(function, f).into()
  }

  /// A native action returning a future, awaited on the caller's runtime.
  pub fn action_async<F, Fut>(function: impl Into<String>, f: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
  {
    ActionRule::new_async(function, f).into()
  }

  pub fn process(spec: ProcessSpec) -> Self {
    Self::with_kind(RuleKind::Process(spec))
  }

  /// Narration written to the stdout sink.
  pub fn log(message: impl Into<String>) -> Self {
    Self::with_kind(RuleKind::Log(LogRule {
      message: message.into(),
      level: Level::INFO,
    }))
  }

  /// A warning written to the stderr sink.
  pub fn warn(message: impl Into<String>) -> Self {
    Self::with_kind(RuleKind::Log(LogRule {
      message: message.into(),
      level: Level::WARN,
    }))
  }

  /// Replace the default `tracing` sinks.
  pub fn with_sinks(mut self, stdout: Sink, stderr: Sink) -> Self {
    self.stdout = stdout;
    self.stderr = stderr;
    self
  }

  pub fn kind(&self) -> &RuleKind {
    &self.kind
  }

  pub fn is_log(&self) -> bool {
    matches!(self.kind, RuleKind::Log(_))
  }

  pub fn description(&self) -> String {
    self.to_string()
  }

  /// Run the rule. With `dry_run`, actions and processes only announce
  /// themselves; log rules always write their message.
  pub async fn invoke(&self, dry_run: bool) -> Result<Outcome, RuleError> {
    if let RuleKind::Log(log) = &self.kind {
      let sink = if log.level == Level::WARN || log.level == Level::ERROR {
        &self.stderr
      } else {
        &self.stdout
      };
      sink.write(&log.message);
      return Ok(Outcome::Logged);
    }

    let description = self.description();
    self.stdout.write(&format!("Running {}", description));
    if dry_run {
      return Ok(Outcome::DryRun);
    }

    match &self.kind {
      RuleKind::Action(action) => action.run(&description).await,
      RuleKind::Process(spec) => spec.run(&description, &self.stdout, &self.stderr).await,
      RuleKind::Log(_) => Ok(Outcome::Logged),
    }
  }
}

impl From<ActionRule> for Rule {
  fn from(action: ActionRule) -> Self {
    Self::with_kind(RuleKind::Action(action))
  }
}

impl From<ProcessSpec> for Rule {
  fn from(spec: ProcessSpec) -> Self {
    Self::process(spec)
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.kind {
      RuleKind::Action(action) => fmt::Display::fmt(action, f),
      RuleKind::Process(spec) => fmt::Display::fmt(spec, f),
      RuleKind::Log(log) => fmt::Display::fmt(log, f),
    }
  }
}
