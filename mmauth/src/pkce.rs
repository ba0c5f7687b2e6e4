use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::SsoError;

/// Raw verifier length in bytes, before any encoding.
pub const VERIFIER_LEN: usize = 100;

/// PKCE code verifier: opaque random bytes, one per flow attempt.
///
/// A fresh verifier supersedes the previous one; only the verifier captured
/// by the currently armed listener may satisfy a callback.
#[derive(Clone)]
pub struct CodeVerifier([u8; VERIFIER_LEN]);

impl CodeVerifier {
    /// Draw a fresh verifier from the OS RNG. Failure is fatal for the
    /// attempt and reported as [`SsoError::RandomGeneration`].
    pub fn generate() -> Result<Self, SsoError> {
        let mut bytes = [0u8; VERIFIER_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| SsoError::RandomGeneration(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// S256 challenge: URL-safe base64 (no padding) of SHA-256 over the raw
    /// verifier bytes.
    pub fn challenge(&self) -> String {
        let digest = Sha256::digest(self.0);
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Wire form of the verifier, sent with the challenge token exchange.
    pub fn encoded(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

impl std::fmt::Debug for CodeVerifier {
    // The verifier is the flow's secret; keep it out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CodeVerifier(..)")
    }
}
