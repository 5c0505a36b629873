//! Test utilities for buildrules-lib.
//!
//! Cross-platform commands for tests that need to spawn processes.

/// Command that prints each of `lines` to stdout.
#[cfg(unix)]
pub fn print_lines(lines: &[&str]) -> Vec<String> {
  vec!["printf".to_string(), "%s\\n".to_string()]
    .into_iter()
    .chain(lines.iter().map(|l| l.to_string()))
    .collect()
}

/// Shell script run through `/bin/sh -c`.
#[cfg(unix)]
pub fn sh(script: &str) -> Vec<String> {
  vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

/// A command that always fails.
#[cfg(unix)]
pub fn failing() -> Vec<String> {
  vec!["false".to_string()]
}
