//! Object id generation and validation.
//!
//! Ids are 12 bytes rendered as 24 lowercase hex characters: a 4-byte
//! big-endian seconds-since-epoch prefix followed by 8 random bytes, so ids
//! sort roughly by creation time.

use crate::types::DbId;

/// Length of a rendered object id.
pub const OBJECT_ID_LEN: usize = 24;

/// Generate a fresh object id.
pub fn new_object_id() -> DbId {
    let secs = chrono::Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;
    let tail: [u8; 8] = rand::random();

    let mut out = String::with_capacity(OBJECT_ID_LEN);
    for byte in secs.to_be_bytes().iter().chain(tail.iter()) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Check that `id` is exactly 24 hex characters.
///
/// Upper-case hex is accepted; callers should pass ids through
/// [`normalize_object_id`] before storing or comparing them.
pub fn validate_object_id(id: &str) -> Result<(), String> {
    if id.len() != OBJECT_ID_LEN || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!(
            "Invalid id '{id}'. Must be a {OBJECT_ID_LEN}-character hex string"
        ));
    }
    Ok(())
}

/// Validate and lower-case an id. `field` names the input in the error message.
pub fn normalize_object_id(field: &str, id: &str) -> Result<DbId, String> {
    let trimmed = id.trim();
    validate_object_id(trimmed).map_err(|e| format!("{field}: {e}"))?;
    Ok(trimmed.to_ascii_lowercase())
}
