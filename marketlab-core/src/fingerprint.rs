//! Deterministic content hashing for replay verification.
//!
//! Canonical serialization (serde_json over types with stable field order)
//! hashed with BLAKE3. Two runs over the same inputs must produce equal
//! receipt hashes; a differing hash is a determinism bug, not noise.

use crate::data::{Database, DatabaseError, QuerySpan};
use crate::domain::{Granularity, Receipt};
use serde::Serialize;

/// BLAKE3 hex digest of a value's canonical JSON form.
pub fn content_hash<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_string(value).expect("canonical serialization cannot fail");
    blake3::hash(json.as_bytes()).to_hex().to_string()
}

/// Hash of the full receipt sequence of a run.
pub fn receipts_hash(receipts: &[Receipt]) -> String {
    content_hash(&receipts)
}

/// Hash of one stored series, identifying the exact historical slice a
/// run consumed.
pub fn dataset_hash(
    source: &dyn Database,
    symbol: &str,
    granularity: Granularity,
) -> Result<String, DatabaseError> {
    let bars = source.query(symbol, granularity, &QuerySpan::all())?;
    Ok(content_hash(&bars))
}
