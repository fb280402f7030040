//! Webhook Signature Verification
//!
//! GitHub signs every delivery with HMAC-SHA256 over the raw request body
//! and sends the digest as `X-Hub-Signature-256: sha256=<hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

const PREFIX: &str = "sha256=";

/// Why a delivery was rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("No X-Hub-Signature-256 found on request")]
    Missing,

    #[error("Malformed X-Hub-Signature-256 header")]
    Malformed,

    #[error("Signature does not match payload")]
    Mismatch,
}

/// Verifies deliveries against the shared webhook secret
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// `sha256=<hex>` digest of `body` under this secret
    pub fn sign(&self, body: &[u8]) -> String {
        format!("{PREFIX}{}", hex::encode(self.mac(body).finalize().into_bytes()))
    }

    /// Check `header` against the digest of `body`.
    ///
    /// The comparison runs in constant time. A digest of the wrong length
    /// is a mismatch, never a panic.
    pub fn verify(&self, body: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::Missing)?;

        let digest = header
            .trim()
            .strip_prefix(PREFIX)
            .ok_or(SignatureError::Malformed)?;
        let digest = hex::decode(digest).map_err(|_| SignatureError::Malformed)?;

        self.mac(body)
            .verify_slice(&digest)
            .map_err(|_| SignatureError::Mismatch)
    }

    fn mac(&self, body: &[u8]) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        mac.update(body);
        mac
    }
}
