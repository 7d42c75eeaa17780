//! Export/import text: a save record as a single copy-pasteable line.
//!
//! Format: JSON-serialized SaveRecord, then standard base64 (with padding).
//! The output has no whitespace or control characters.

use crate::{
    error::{EngineError, EngineResult},
    snapshot::SaveRecord,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

pub fn encode(record: &SaveRecord) -> EngineResult<String> {
    let json = serde_json::to_string(record)?;
    Ok(STANDARD.encode(json))
}

/// Inverse of `encode`. Surrounding whitespace is ignored, since pasted
/// text often picks up a trailing newline. A record tagged with any version
/// other than `expected_version` is `IncompatibleSchema`.
pub fn decode(text: &str, expected_version: &str) -> EngineResult<SaveRecord> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(EngineError::MalformedText("input is empty".into()));
    }
    let bytes = STANDARD
        .decode(trimmed)
        .map_err(|e| EngineError::MalformedText(format!("not base64: {e}")))?;
    let json = String::from_utf8(bytes)
        .map_err(|e| EngineError::MalformedText(format!("not UTF-8: {e}")))?;
    SaveRecord::from_json(&json, expected_version)
}
