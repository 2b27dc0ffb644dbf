//! Shared cryptographic utilities for Secure Scaffold
//!
//! Small building blocks used by the service: URL-safe base64 without
//! padding, OS-backed random tokens, short hex digests for cache-busting,
//! and HMAC signing for CSRF tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use md5::{Digest, Md5};
use rand::{rngs::OsRng, RngCore};

mod signer;
pub use signer::{SignatureError, TokenSigner};

/// Error type for base64url decoding failures
#[derive(Debug, thiserror::Error)]
#[error("invalid base64url encoding: {0}")]
pub struct DecodeError(#[from] base64::DecodeError);

/// Encode bytes as base64url (RFC 4648) without padding.
///
/// The output never contains `=`, `+` or `/`, so it is safe inside HTTP
/// headers, cookies and HTML attributes without further escaping.
#[must_use]
pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a base64url-encoded string (RFC 4648) to bytes.
///
/// # Errors
/// Returns `DecodeError` if the input is not valid unpadded base64url
pub fn decode_base64url(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD.decode(encoded).map_err(DecodeError::from)
}

/// Fill a buffer of `len` bytes from the operating system CSPRNG.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Generate `len` random bytes and return them base64url-encoded.
///
/// 16 bytes encode to 22 characters.
#[must_use]
pub fn random_token(len: usize) -> String {
    encode_base64url(&random_bytes(len))
}

/// Hex-encoded MD5 digest of `input`, truncated to `hex_len` characters.
///
/// Not a security primitive: used only where a short, stable label is
/// needed and collisions are tolerable (static asset paths).
#[must_use]
pub fn short_hex_digest(input: &[u8], hex_len: usize) -> String {
    let digest = Md5::digest(input);
    let mut hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex.truncate(hex_len);
    hex
}
