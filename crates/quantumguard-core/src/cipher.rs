//! Mock AHE/HEE transform; a reversible obfuscation, **not** cryptography.
//!
//! `encrypt` reverses the character order, base64-encodes the result, and
//! appends the `::QUANTUM_AHE_HEE::` marker followed by an epoch-millis
//! timestamp. There is no key material, no entropy source, and no
//! authentication tag: anyone holding a payload can recover the plaintext.
//! The module exists so the demo dashboard has a reversible "encryption"
//! operation to log and chart. Never substitute it for a real cipher.

use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

/// Marker between the encoded payload and the timestamp on the wire.
pub const CIPHER_DELIMITER: &str = "::QUANTUM_AHE_HEE::";

/// Constant algorithm label recorded on every encryption log row.
pub const ALGORITHM_LABEL: &str = "AHE-HEE";

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid encrypted format: delimiter missing")]
    MissingDelimiter,
    #[error("invalid encrypted data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("decoded payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Wire format: `base64(reverse_chars(data)) + "::QUANTUM_AHE_HEE::" + epoch_millis`.
pub fn encrypt(data: &str) -> String {
    let reversed: String = data.chars().rev().collect();
    let encoded = general_purpose::STANDARD.encode(reversed.as_bytes());
    format!("{}{}{}", encoded, CIPHER_DELIMITER, now_ms())
}

/// Inverse of [`encrypt`]. The timestamp segment is ignored; only the first
/// segment before the delimiter is decoded.
pub fn decrypt(encrypted: &str) -> Result<String, CipherError> {
    let (encoded, _timestamp) = encrypted
        .split_once(CIPHER_DELIMITER)
        .ok_or(CipherError::MissingDelimiter)?;
    let decoded = general_purpose::STANDARD.decode(encoded)?;
    let text = String::from_utf8(decoded).map_err(|_| CipherError::InvalidUtf8)?;
    Ok(text.chars().rev().collect())
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
