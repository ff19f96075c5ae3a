//! Codec between internal offer ids and their public search-engine form.
//!
//! Documents in the search index are keyed by an obfuscated identifier
//! rather than the raw database id. The encoding takes the id's minimal
//! big-endian byte form, base32-encodes it without padding, and swaps the
//! easily confused characters `O` and `I` for `8` and `1`. The mapping is
//! injective and reversible, so ids recovered from the index can always be
//! mapped back to database rows.
//!
//! # Example
//!
//! ```
//! use offersync::utils::external_ids::{externalize, internalize};
//!
//! let external = externalize(12345);
//! assert_eq!(external, "GA4Q");
//! assert_eq!(internalize(&external).unwrap(), 12345);
//! ```

use base32::Alphabet;
use thiserror::Error;

const ALPHABET: Alphabet = Alphabet::Rfc4648 { padding: false };

/// Error type for failures decoding an external id back to a database id.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExternalIdError {
    #[error("invalid external id '{value}': {reason}")]
    Invalid { value: String, reason: String },
}

/// Encode a database id into its public search-engine form.
///
/// The id is rendered as its minimal big-endian bytes (no leading zero
/// bytes), base32-encoded without padding, with `O` replaced by `8` and
/// `I` replaced by `1`.
pub fn externalize(id: i64) -> String {
    let bytes = id.to_be_bytes();
    let start = bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(bytes.len());
    let encoded = base32::encode(ALPHABET, &bytes[start..]);
    encoded.replace('O', "8").replace('I', "1")
}

/// Decode a public search-engine id back into the database id.
///
/// Reverses the character substitution applied by [`externalize`], then
/// base32-decodes and reassembles the big-endian bytes. Fails if the input
/// is not valid base32 after substitution or decodes to more than eight
/// bytes.
pub fn internalize(value: &str) -> Result<i64, ExternalIdError> {
    let canonical = value.replace('8', "O").replace('1', "I");
    let bytes = base32::decode(ALPHABET, &canonical).ok_or_else(|| ExternalIdError::Invalid {
        value: value.to_string(),
        reason: "not valid base32".to_string(),
    })?;
    if bytes.len() > 8 {
        return Err(ExternalIdError::Invalid {
            value: value.to_string(),
            reason: format!("decodes to {} bytes, expected at most 8", bytes.len()),
        });
    }
    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(&bytes);
    Ok(i64::from_be_bytes(buf))
}
