//! Question text normalization
//!
//! One canonical form — lowercase, whitespace-trimmed — applied at
//! both write time and read time, so pattern identity and matching can
//! never diverge on casing or stray whitespace.

/// Canonicalize question text. Idempotent:
/// `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
