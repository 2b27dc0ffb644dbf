//! HMAC-SHA256 signing of short token messages.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{decode_base64url, encode_base64url};

type HmacSha256 = Hmac<Sha256>;

/// Errors from token signature verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signing key must not be empty")]
    EmptyKey,
    #[error("signature is not valid base64url")]
    Malformed,
    #[error("signature verification failed")]
    Mismatch,
}

/// Signs and verifies messages with a fixed secret key.
///
/// Signatures are base64url without padding so they can be embedded in
/// form fields and headers unchanged.
#[derive(Clone)]
pub struct TokenSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Create a signer from raw key bytes.
    ///
    /// # Errors
    /// Returns `SignatureError::EmptyKey` for an empty key.
    pub fn new(key: &[u8]) -> Result<Self, SignatureError> {
        if key.is_empty() {
            return Err(SignatureError::EmptyKey);
        }
        let mac = HmacSha256::new_from_slice(key).map_err(|_| SignatureError::EmptyKey)?;
        Ok(Self { mac })
    }

    /// Sign `message`, returning the base64url-encoded tag.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(message);
        encode_base64url(&mac.finalize().into_bytes())
    }

    /// Verify a base64url tag over `message` in constant time.
    ///
    /// # Errors
    /// Returns `Malformed` if the tag cannot be decoded and `Mismatch` if it
    /// does not authenticate `message`.
    pub fn verify(&self, message: &[u8], signature: &str) -> Result<(), SignatureError> {
        let tag = decode_base64url(signature).map_err(|_| SignatureError::Malformed)?;
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.verify_slice(&tag).map_err(|_| SignatureError::Mismatch)
    }
}
