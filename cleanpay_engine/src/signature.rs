//! Gateway notification signature verification.
//!
//! The payment gateway signs every server-to-server notification over the form
//! fields of the request body. The signature is recomputed here with the same
//! canonicalization the gateway uses: drop the `signature` field, sort the
//! remaining fields by name, form-urlencode them as `key=value` pairs joined by
//! `&`, append the shared passphrase (if one is configured), and take the
//! lowercase hex SHA-256 digest.
//!
//! Verification is a pure function. A mismatch is a normal `Ok(false)` result;
//! only malformed input is an error.

use cleanpay_common::Secret;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const SIGNATURE_FIELD: &str = "signature";

#[derive(Debug, Clone, Error)]
pub enum SignatureError {
    #[error("The claimed signature is malformed: {0}")]
    MalformedSignature(String),
    #[error("Notification field is malformed: {0}")]
    MalformedField(String),
}

/// Builds the canonical string the gateway signs over.
pub fn canonical_string(
    fields: &[(String, String)],
    passphrase: Option<&Secret<String>>,
) -> Result<String, SignatureError> {
    let mut pairs: Vec<(&str, &str)> = fields
        .iter()
        .filter(|(k, _)| k != SIGNATURE_FIELD)
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    if pairs.iter().any(|(k, _)| k.is_empty()) {
        return Err(SignatureError::MalformedField("empty field name".to_string()));
    }
    pairs.sort_unstable();
    if let Some(secret) = passphrase {
        pairs.push(("passphrase", secret.reveal().as_str()));
    }
    serde_urlencoded::to_string(&pairs).map_err(|e| SignatureError::MalformedField(e.to_string()))
}

/// Computes the signature for the given fields. Used by tests and by outbound tooling.
pub fn sign_fields(
    fields: &[(String, String)],
    passphrase: Option<&Secret<String>>,
) -> Result<String, SignatureError> {
    let canonical = canonical_string(fields, passphrase)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(hex::encode(digest))
}

/// Verifies that `claimed` matches the signature over `fields`.
///
/// Returns `Ok(false)` for a genuine mismatch. Returns an error only when the
/// input cannot possibly be a signature (wrong length, non-hex characters).
pub fn verify_signature(
    fields: &[(String, String)],
    claimed: &str,
    passphrase: Option<&Secret<String>>,
) -> Result<bool, SignatureError> {
    let claimed = claimed.trim();
    if claimed.len() != 64 || !claimed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SignatureError::MalformedSignature(format!(
            "expected 64 hex characters, got {} characters",
            claimed.len()
        )));
    }
    let expected = sign_fields(fields, passphrase)?;
    Ok(expected == claimed.to_ascii_lowercase())
}
