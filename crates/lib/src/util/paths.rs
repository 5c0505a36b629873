use std::path::{Path, PathBuf};

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(PathBuf::from)
}

/// Expand a leading `~` against the home directory.
///
/// Paths without a leading `~`, or when no home directory is known, are
/// returned unchanged.
pub fn expand_tilde(path: &str) -> PathBuf {
  let rest = if path == "~" {
    ""
  } else if let Some(rest) = path.strip_prefix("~/") {
    rest
  } else {
    return PathBuf::from(path);
  };

  match home_dir() {
    Some(home) if rest.is_empty() => home,
    Some(home) => home.join(rest),
    None => PathBuf::from(path),
  }
}

/// Express `path` relative to `base` when it lies below it.
///
/// `base` itself becomes `.`; paths outside `base` are returned unchanged.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
  match path.strip_prefix(base) {
    Ok(rest) if rest.as_os_str().is_empty() => PathBuf::from("."),
    Ok(rest) => rest.to_path_buf(),
    Err(_) => path.to_path_buf(),
  }
}
