//! PKCE parameter generation
//!
//! Verifier and state come from the injected CSPRNG; the challenge is the
//! base64url-encoded SHA-256 of the verifier (S256 method).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::error::AuthError;
use crate::platform::RandomSource;

use super::types::PkceParams;

/// Generate a code verifier: 32 random bytes, base64url without padding
/// (43 characters, unreserved charset)
pub fn generate_code_verifier(rng: &dyn RandomSource) -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Derive the S256 code challenge for a verifier. Deterministic.
pub fn generate_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Generate the CSRF state value: 16 random bytes, base64url
pub fn generate_state(rng: &dyn RandomSource) -> Result<String, AuthError> {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Generate a full verifier/challenge/state triple for one login attempt
pub fn generate_pkce(rng: &dyn RandomSource) -> Result<PkceParams, AuthError> {
    let verifier = generate_code_verifier(rng)?;
    let challenge = generate_code_challenge(&verifier);
    let state = generate_state(rng)?;
    Ok(PkceParams {
        verifier,
        challenge,
        state,
    })
}
