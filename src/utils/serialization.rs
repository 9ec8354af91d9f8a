// Canonical JSON: serde_json::Value keeps object keys in a BTreeMap, so going
// through a Value sorts every key regardless of struct field order.
use crate::error::{NoobcashError, Result};
use crate::utils::sha256_hex;
use serde::Serialize;

/// Serialize `data` with object keys sorted at every level.
pub fn canonical_json<T: Serialize + ?Sized>(data: &T) -> Result<String> {
    let value = serde_json::to_value(data)
        .map_err(|e| NoobcashError::Serialization(format!("Serialization failed: {e}")))?;
    serde_json::to_string(&value)
        .map_err(|e| NoobcashError::Serialization(format!("Serialization failed: {e}")))
}

/// SHA-256 hex digest of the canonical serialization.
pub fn canonical_hash<T: Serialize + ?Sized>(data: &T) -> Result<String> {
    Ok(sha256_hex(canonical_json(data)?.as_bytes()))
}
