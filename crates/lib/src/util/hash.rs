//! Content hashing for run records and project identity.
//!
//! This module provides:
//! - `ObjectHash`: a truncated 20-character hash of a serialized value
//! - `Hashable`: hash any `Serialize` value through its JSON form
//! - `hash_bytes()`: truncated hash of arbitrary bytes (config files, paths)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::OBJ_HASH_PREFIX_LEN;

pub type HashError = serde_json::Error;

/// A content hash identifying one serialized value.
///
/// The hash is a 20-character truncated SHA-256 of the JSON-serialized struct,
/// stored lowercase hex, e.g. `"a1b2c3d4e5f6789012ab"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    Ok(hash_bytes(serialized.as_bytes()))
  }
}

/// Hash arbitrary bytes into a truncated [`ObjectHash`].
pub fn hash_bytes(data: &[u8]) -> ObjectHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  let full = format!("{:x}", hasher.finalize());
  ObjectHash(full[..OBJ_HASH_PREFIX_LEN].to_string())
}
