//! PKCE verifier/challenge and request state generation

use crate::client::error::ClientError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use stride_core::PkceMethod;

/// Verifier and derived challenge for one authorization request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
    pub method: PkceMethod,
}

impl PkcePair {
    /// Fresh random verifier with its challenge
    pub fn generate(method: PkceMethod) -> Result<Self, ClientError> {
        let verifier = generate_code_verifier()?;
        let challenge = code_challenge(&verifier, method);
        Ok(Self {
            verifier,
            challenge,
            method,
        })
    }
}

/// 64-character URL-safe verifier (RFC 7636 allows 43-128)
pub fn generate_code_verifier() -> Result<String, ClientError> {
    random_url_safe::<48>()
}

/// `BASE64URL(SHA256(verifier))` for S256
pub fn code_challenge(verifier: &str, method: PkceMethod) -> String {
    match method {
        PkceMethod::S256 => URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes())),
    }
}

/// 22-character value for `state` and `nonce`
pub fn generate_state() -> Result<String, ClientError> {
    random_url_safe::<16>()
}

fn random_url_safe<const N: usize>() -> Result<String, ClientError> {
    let mut bytes = [0u8; N];
    getrandom::fill(&mut bytes).map_err(|e| ClientError::Random(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
