//! External process rules.
//!
//! A process is spawned with both standard streams piped. Each stream is
//! drained line by line into its sink while the child runs, and both drains
//! are joined with the child's exit before [`ProcessSpec::run`] returns, so
//! every line (including an unterminated last one) has reached its sink by
//! the time the rule completes.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use super::sink::Sink;
use super::types::{Outcome, RuleError, RuleFailure};
use crate::consts::STDERR_TAIL_LINES;

/// An external command and how to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
  /// Program and arguments. In shell mode these are joined with spaces and
  /// handed to the system shell.
  pub command: Vec<String>,

  /// Variables laid over the parent environment.
  pub env: Option<BTreeMap<String, String>>,

  pub cwd: Option<PathBuf>,

  pub shell: bool,

  /// Whether a non-zero exit fails the rule.
  pub check: bool,
}

impl ProcessSpec {
  pub fn new<I, S>(command: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      command: command.into_iter().map(Into::into).collect(),
      env: None,
      cwd: None,
      shell: false,
      check: true,
    }
  }

  /// Run `line` through the system shell.
  pub fn shell_line(line: impl Into<String>) -> Self {
    Self::new([line.into()]).shell(true)
  }

  pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
    self.env = Some(env);
    self
  }

  /// Add one variable to the environment overlay.
  pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.get_or_insert_with(BTreeMap::new).insert(key.into(), value.into());
    self
  }

  pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
    self.cwd = Some(cwd.into());
    self
  }

  pub fn shell(mut self, shell: bool) -> Self {
    self.shell = shell;
    self
  }

  pub fn check(mut self, check: bool) -> Self {
    self.check = check;
    self
  }

  /// The command as one line, as the shell would see it.
  pub fn command_line(&self) -> String {
    self.command.join(" ")
  }

  fn program_and_args(&self) -> Option<(String, Vec<String>)> {
    if self.shell {
      let (shell, flag) = system_shell();
      return Some((shell.to_string(), vec![flag.to_string(), self.command_line()]));
    }
    let (program, args) = self.command.split_first()?;
    Some((program.clone(), args.to_vec()))
  }

  /// Spawn the process and stream its output until it exits.
  pub async fn run(&self, description: &str, stdout: &Sink, stderr: &Sink) -> Result<Outcome, RuleError> {
    let command_line = self.command_line();
    let (program, args) = self.program_and_args().ok_or_else(|| {
      RuleError::new(
        description,
        RuleFailure::Spawn {
          program: String::new(),
          source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
        },
        "",
      )
    })?;

    let mut command = Command::new(&program);
    command
      .args(&args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    if let Some(env) = &self.env {
      command.envs(env);
    }
    if let Some(cwd) = &self.cwd {
      command.current_dir(cwd);
    }

    debug!(program = %program, cwd = ?self.cwd, shell = self.shell, "spawning process");

    let mut child = command.spawn().map_err(|source| {
      RuleError::new(
        description,
        RuleFailure::Spawn {
          program: program.clone(),
          source,
        },
        "",
      )
    })?;

    let child_stdout = child.stdout.take();
    let child_stderr = child.stderr.take();

    let (out, err, status) = tokio::join!(
      drain(child_stdout, stdout, 0),
      drain(child_stderr, stderr, STDERR_TAIL_LINES),
      child.wait()
    );

    let io_failure = |source: io::Error| {
      RuleError::new(
        description,
        RuleFailure::Io {
          command: command_line.clone(),
          source,
        },
        "",
      )
    };
    let status = status.map_err(io_failure)?;
    out.map_err(io_failure)?;
    let tail = err.map_err(io_failure)?;

    let code = status.code();
    debug!(code = ?code, "process exited");

    if !status.success() && self.check {
      let diagnostic = Vec::from(tail).join("\n");
      return Err(RuleError::new(
        description,
        RuleFailure::Exit {
          command: command_line,
          code,
        },
        diagnostic,
      ));
    }

    Ok(Outcome::Exited(code.unwrap_or(-1)))
  }
}

impl fmt::Display for ProcessSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ProcessRule: {{ command: {:?}, env: ", self.command)?;
    match &self.env {
      Some(env) => write!(f, "{:?}", env)?,
      None => f.write_str("None")?,
    }
    write!(f, ", shell: {} }}", self.shell)
  }
}

#[cfg(unix)]
fn system_shell() -> (&'static str, &'static str) {
  ("/bin/sh", "-c")
}

#[cfg(windows)]
fn system_shell() -> (&'static str, &'static str) {
  ("cmd.exe", "/C")
}

/// Forward every line of `reader` to `sink`, keeping the last `keep` lines.
async fn drain<R>(reader: Option<R>, sink: &Sink, keep: usize) -> io::Result<VecDeque<String>>
where
  R: AsyncRead + Unpin,
{
  let mut tail = VecDeque::with_capacity(keep);
  let Some(reader) = reader else {
    return Ok(tail);
  };

  let mut reader = BufReader::new(reader);
  let mut buf = Vec::new();
  loop {
    buf.clear();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
      break;
    }

    let text = String::from_utf8_lossy(&buf);
    let line = text.trim_end_matches('\n').trim_end_matches('\r');
    if line.is_empty() {
      continue;
    }

    sink.write(line);
    if keep > 0 {
      if tail.len() == keep {
        tail.pop_front();
      }
      tail.push_back(line.to_string());
    }
  }

  Ok(tail)
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::rule::sink::Recorder;
  use crate::util::testutil::{failing, print_lines, sh};
  use tempfile::tempdir;
  use tracing::Level;

  fn sinks(recorder: &Recorder) -> (Sink, Sink) {
    (recorder.sink(Level::INFO), recorder.sink(Level::WARN))
  }

  #[tokio::test]
  async fn streams_lines_to_their_sinks() {
    let recorder = Recorder::new();
    let (out, err) = sinks(&recorder);
    let spec = ProcessSpec::new(sh("echo one; echo two; echo oops >&2"));

    let outcome = spec.run("test", &out, &err).await.unwrap();

    assert_eq!(outcome, Outcome::Exited(0));
    assert_eq!(recorder.messages_at(Level::INFO), vec!["one", "two"]);
    assert_eq!(recorder.messages_at(Level::WARN), vec!["oops"]);
  }

  #[tokio::test]
  async fn unterminated_last_line_is_flushed() {
    let recorder = Recorder::new();
    let (out, err) = sinks(&recorder);

    ProcessSpec::new(sh("printf 'first\\nlast'"))
      .run("test", &out, &err)
      .await
      .unwrap();

    assert_eq!(recorder.messages_at(Level::INFO), vec!["first", "last"]);
  }

  #[tokio::test]
  async fn arguments_are_passed_verbatim() {
    let recorder = Recorder::new();
    let (out, err) = sinks(&recorder);

    ProcessSpec::new(print_lines(&["a b", "c"]))
      .run("test", &out, &err)
      .await
      .unwrap();

    assert_eq!(recorder.messages(), vec!["a b", "c"]);
  }

  #[tokio::test]
  async fn missing_executable_is_a_spawn_failure() {
    let recorder = Recorder::new();
    let (out, err) = sinks(&recorder);

    let error = ProcessSpec::new(["definitely-not-a-real-program-3141"])
      .run("missing", &out, &err)
      .await
      .unwrap_err();

    assert_eq!(error.rule, "missing");
    assert!(matches!(error.cause, RuleFailure::Spawn { .. }));
  }

  #[tokio::test]
  async fn empty_command_is_a_spawn_failure() {
    let recorder = Recorder::new();
    let (out, err) = sinks(&recorder);

    let error = ProcessSpec::new(Vec::<String>::new())
      .run("empty", &out, &err)
      .await
      .unwrap_err();
    assert!(matches!(error.cause, RuleFailure::Spawn { .. }));
  }

  #[tokio::test]
  async fn non_zero_exit_fails_when_checked() {
    let recorder = Recorder::new();
    let (out, err) = sinks(&recorder);

    let error = ProcessSpec::new(failing()).run("false", &out, &err).await.unwrap_err();
    assert_eq!(error.exit_code(), Some(1));
  }

  #[tokio::test]
  async fn non_zero_exit_is_returned_when_unchecked() {
    let recorder = Recorder::new();
    let (out, err) = sinks(&recorder);

    let outcome = ProcessSpec::new(sh("exit 3"))
      .check(false)
      .run("unchecked", &out, &err)
      .await
      .unwrap();
    assert_eq!(outcome, Outcome::Exited(3));
  }

  #[tokio::test]
  async fn stderr_tail_is_the_diagnostic() {
    let recorder = Recorder::new();
    let (out, err) = sinks(&recorder);

    let error = ProcessSpec::new(sh("for i in $(seq 1 30); do echo line$i >&2; done; exit 2"))
      .run("noisy", &out, &err)
      .await
      .unwrap_err();

    let lines: Vec<&str> = error.diagnostic.lines().collect();
    assert_eq!(lines.len(), STDERR_TAIL_LINES);
    assert_eq!(lines.first(), Some(&"line11"));
    assert_eq!(lines.last(), Some(&"line30"));
    assert_eq!(recorder.count(Level::WARN), 30);
  }

  #[tokio::test]
  async fn env_overlay_and_cwd() {
    let temp = tempdir().unwrap();
    let recorder = Recorder::new();
    let (out, err) = sinks(&recorder);

    ProcessSpec::new(sh("echo $GREETING; pwd"))
      .var("GREETING", "hello")
      .cwd(temp.path())
      .run("env", &out, &err)
      .await
      .unwrap();

    let messages = recorder.messages();
    assert_eq!(messages[0], "hello");
    let cwd = std::fs::canonicalize(temp.path()).unwrap();
    assert_eq!(std::fs::canonicalize(&messages[1]).unwrap(), cwd);
  }

  #[tokio::test]
  async fn parent_environment_is_inherited() {
    let recorder = Recorder::new();
    let (out, err) = sinks(&recorder);

    ProcessSpec::new(sh("test -n \"$PATH\" && echo has-path"))
      .var("UNRELATED", "1")
      .run("env", &out, &err)
      .await
      .unwrap();

    assert_eq!(recorder.messages(), vec!["has-path"]);
  }

  #[tokio::test]
  async fn shell_mode_joins_the_command() {
    let recorder = Recorder::new();
    let (out, err) = sinks(&recorder);

    ProcessSpec::new(["echo", "joined", "&&", "echo", "again"])
      .shell(true)
      .run("shell", &out, &err)
      .await
      .unwrap();

    assert_eq!(recorder.messages(), vec!["joined", "again"]);
  }

  #[test]
  fn display_names_command_env_and_shell() {
    let spec = ProcessSpec::new(["make", "install"]).var("PREFIX", "/opt");
    assert_eq!(
      spec.to_string(),
      r#"ProcessRule: { command: ["make", "install"], env: {"PREFIX": "/opt"}, shell: false }"#
    );

    let plain = ProcessSpec::shell_line("ls");
    assert_eq!(plain.to_string(), r#"ProcessRule: { command: ["ls"], env: None, shell: true }"#);
  }
}
