//! Fingerprints for change detection.
//!
//! A [`Fingerprint`] is the full 64-character SHA-256 of either a canonical
//! serialization of a configuration value or the bytes of a file. Canonical
//! means object keys are emitted in sorted order at every depth, so two values
//! that are equal as data always produce the same fingerprint no matter how
//! their maps were built.

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::consts::{FINGERPRINT_SHORT_LEN, HASH_BLOCK_SIZE};

/// A lowercase hexadecimal SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Error while reading a file for hashing.
#[derive(Debug, thiserror::Error)]
#[error("failed to read {path}: {source}")]
pub struct FileHashError {
  pub path: String,
  #[source]
  pub source: io::Error,
}

impl Fingerprint {
  /// Fingerprint a configuration value.
  pub fn of_value(value: &Value) -> Self {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);
    Self::of_bytes(canonical.as_bytes())
  }

  /// Fingerprint a value after dropping the named top-level fields.
  ///
  /// Used for fields that must never trigger a rebuild on their own, such as
  /// update-only toggles.
  pub fn of_value_excluding(value: &Value, excluded: &[&str]) -> Self {
    match value {
      Value::Object(map) => {
        let mut filtered = map.clone();
        for key in excluded {
          filtered.remove(*key);
        }
        Self::of_value(&Value::Object(filtered))
      }
      other => Self::of_value(other),
    }
  }

  /// Fingerprint any serializable value through its JSON form.
  pub fn of_serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
    Ok(Self::of_value(&serde_json::to_value(value)?))
  }

  /// Fingerprint a file's contents, reading it block by block.
  pub fn of_file(path: &Path) -> Result<Self, FileHashError> {
    let to_err = |source| FileHashError {
      path: path.display().to_string(),
      source,
    };
    let mut file = fs::File::open(path).map_err(to_err)?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_BLOCK_SIZE];

    loop {
      let bytes_read = file.read(&mut buffer).map_err(to_err)?;
      if bytes_read == 0 {
        break;
      }
      hasher.update(&buffer[..bytes_read]);
    }

    Ok(Self(hex::encode(hasher.finalize())))
  }

  /// Fingerprint arbitrary bytes.
  pub fn of_bytes(data: &[u8]) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Self(hex::encode(hasher.finalize()))
  }

  /// The leading characters used to keep install paths readable.
  pub fn short(&self) -> &str {
    let len = self.0.len().min(FINGERPRINT_SHORT_LEN);
    &self.0[..len]
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

/// Serialize `value` as compact JSON with object keys sorted at every level.
fn write_canonical(value: &Value, out: &mut String) {
  match value {
    Value::Object(map) => {
      let mut keys: Vec<&String> = map.keys().collect();
      keys.sort();
      out.push('{');
      for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        // Serializing a str or scalar Value cannot fail.
        out.push_str(&serde_json::to_string(key).unwrap_or_default());
        out.push(':');
        write_canonical(&map[key], out);
      }
      out.push('}');
    }
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        write_canonical(item, out);
      }
      out.push(']');
    }
    scalar => out.push_str(&serde_json::to_string(scalar).unwrap_or_default()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use tempfile::tempdir;

  #[test]
  fn key_order_does_not_matter() {
    let a: Value = serde_json::from_str(r#"{"name": "env", "version": "1.0", "pkgs": {"b": 1, "a": 2}}"#).unwrap();
    let b: Value = serde_json::from_str(r#"{"pkgs": {"a": 2, "b": 1}, "version": "1.0", "name": "env"}"#).unwrap();

    assert_eq!(Fingerprint::of_value(&a), Fingerprint::of_value(&b));
  }

  #[test]
  fn different_values_differ() {
    let a = json!({"name": "env", "version": "1.0"});
    let b = json!({"name": "env", "version": "1.1"});

    assert_ne!(Fingerprint::of_value(&a), Fingerprint::of_value(&b));
  }

  #[test]
  fn array_order_matters() {
    let a = json!({"commands": ["a", "b"]});
    let b = json!({"commands": ["b", "a"]});

    assert_ne!(Fingerprint::of_value(&a), Fingerprint::of_value(&b));
  }

  #[test]
  fn excluded_fields_do_not_participate() {
    let a = json!({"name": "env", "remove_after_update": true});
    let b = json!({"name": "env", "remove_after_update": false});
    let c = json!({"name": "env"});

    let excluded = ["remove_after_update"];
    assert_eq!(
      Fingerprint::of_value_excluding(&a, &excluded),
      Fingerprint::of_value_excluding(&b, &excluded)
    );
    assert_eq!(
      Fingerprint::of_value_excluding(&a, &excluded),
      Fingerprint::of_value(&c)
    );
    assert_ne!(Fingerprint::of_value(&a), Fingerprint::of_value(&b));
  }

  #[test]
  fn serialize_matches_value() {
    #[derive(Serialize)]
    struct Unit {
      version: String,
      name: String,
    }
    let unit = Unit {
      version: "2".to_string(),
      name: "tools".to_string(),
    };

    assert_eq!(
      Fingerprint::of_serialize(&unit).unwrap(),
      Fingerprint::of_value(&json!({"name": "tools", "version": "2"}))
    );
  }

  #[test]
  fn fingerprint_is_full_sha256() {
    let fp = Fingerprint::of_value(&json!(null));
    assert_eq!(fp.0.len(), 64);
    assert_eq!(fp.short().len(), 8);
    assert!(fp.0.starts_with(fp.short()));
  }

  #[test]
  fn file_fingerprint_matches_bytes() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("installer.sh");
    // Larger than one block so the streaming loop runs several times.
    let content = "echo install\n".repeat(2000);
    fs::write(&path, &content).unwrap();

    assert_eq!(
      Fingerprint::of_file(&path).unwrap(),
      Fingerprint::of_bytes(content.as_bytes())
    );
  }

  #[test]
  fn missing_file_is_an_error() {
    let temp = tempdir().unwrap();
    let result = Fingerprint::of_file(&temp.path().join("missing"));
    assert!(result.is_err());
  }
}
