//! RSA encrypt/decrypt/sign/verify over Base64 DER keys
//!
//! Plaintext longer than one PKCS#1 v1.5 block (`key_size - 11` bytes) is
//! split into blocks that are encrypted independently and concatenated before
//! Base64 encoding. Decryption splits the ciphertext on the key size.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

/// Bytes consumed by PKCS#1 v1.5 encryption padding in every block
const PKCS1_PADDING_OVERHEAD: usize = 11;

/// Codec errors. Messages never carry plaintext.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid {kind} key: {reason}")]
    InvalidKey { kind: &'static str, reason: String },

    #[error("Invalid Base64 input: {0}")]
    Base64(String),

    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("Signing failed: {0}")]
    Sign(String),

    #[error("Decrypted payload is not valid UTF-8")]
    Utf8,

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),
}

/// Freshly generated key pair, Base64 DER encoded
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratedKeyPair {
    /// SubjectPublicKeyInfo DER, Base64
    pub public_key: String,
    /// PKCS#8 DER, Base64
    pub private_key: String,
}

/// Turn URL-safe Base64 into standard Base64 and restore `=` padding.
pub fn normalize_base64(input: &str) -> String {
    let mut normalized: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let missing = normalized.len() % 4;
    if missing != 0 {
        normalized.push_str(&"=".repeat(4 - missing));
    }
    normalized
}

fn decode_base64(input: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(normalize_base64(input))
        .map_err(|e| CryptoError::Base64(e.to_string()))
}

fn parse_public_key(key: &str) -> Result<RsaPublicKey, CryptoError> {
    let der = decode_base64(key).map_err(|e| CryptoError::InvalidKey {
        kind: "public",
        reason: e.to_string(),
    })?;

    RsaPublicKey::from_public_key_der(&der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(&der))
        .map_err(|e| CryptoError::InvalidKey {
            kind: "public",
            reason: e.to_string(),
        })
}

fn parse_private_key(key: &str) -> Result<RsaPrivateKey, CryptoError> {
    let der = decode_base64(key).map_err(|e| CryptoError::InvalidKey {
        kind: "private",
        reason: e.to_string(),
    })?;

    RsaPrivateKey::from_pkcs8_der(&der)
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(&der))
        .map_err(|e| CryptoError::InvalidKey {
            kind: "private",
            reason: e.to_string(),
        })
}

/// Encrypt UTF-8 text with a Base64 DER public key, returning Base64 ciphertext.
pub fn encrypt_with_public_key(plaintext: &str, public_key: &str) -> Result<String, CryptoError> {
    let key = parse_public_key(public_key)?;
    let block_size = key.size().saturating_sub(PKCS1_PADDING_OVERHEAD);
    if block_size == 0 {
        return Err(CryptoError::Encrypt(format!(
            "{}-byte modulus leaves no room for PKCS#1 v1.5 padding",
            key.size()
        )));
    }

    let bytes = plaintext.as_bytes();
    let mut rng = OsRng;
    let mut sealed = Vec::with_capacity(bytes.len().div_ceil(block_size).max(1) * key.size());

    if bytes.is_empty() {
        sealed.extend(
            key.encrypt(&mut rng, Pkcs1v15Encrypt, bytes)
                .map_err(|e| CryptoError::Encrypt(e.to_string()))?,
        );
    }

    for block in bytes.chunks(block_size) {
        let encrypted = key
            .encrypt(&mut rng, Pkcs1v15Encrypt, block)
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;
        sealed.extend(encrypted);
    }

    debug!(
        "Encrypted {} bytes into {} block(s)",
        bytes.len(),
        sealed.len() / key.size()
    );

    Ok(STANDARD.encode(sealed))
}

/// Decrypt Base64 (standard or URL-safe) ciphertext with a Base64 DER private key.
pub fn decrypt_with_private_key(ciphertext: &str, private_key: &str) -> Result<String, CryptoError> {
    let key = parse_private_key(private_key)?;
    let sealed = decode_base64(ciphertext)?;
    let block_size = key.size();

    if sealed.is_empty() || sealed.len() % block_size != 0 {
        return Err(CryptoError::Decrypt(format!(
            "ciphertext length {} is not a multiple of the {}-byte block",
            sealed.len(),
            block_size
        )));
    }

    let mut plain = Vec::with_capacity(sealed.len());
    for block in sealed.chunks(block_size) {
        let decrypted = key
            .decrypt(Pkcs1v15Encrypt, block)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
        plain.extend(decrypted);
    }

    String::from_utf8(plain).map_err(|_| CryptoError::Utf8)
}

/// SHA-256 + PKCS#1 v1.5 signature over UTF-8 data, Base64 encoded.
pub fn sign_with_private_key(data: &str, private_key: &str) -> Result<String, CryptoError> {
    let key = parse_private_key(private_key)?;
    let digest = Sha256::digest(data.as_bytes());

    let signature = key
        .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|e| CryptoError::Sign(e.to_string()))?;

    Ok(STANDARD.encode(signature))
}

/// Check a SHA-256 + PKCS#1 v1.5 signature.
///
/// Returns `Ok(false)` for any bad or malformed signature; only an
/// unparseable key is an error.
pub fn verify_with_public_key(
    data: &str,
    public_key: &str,
    signature: &str,
) -> Result<bool, CryptoError> {
    let key = parse_public_key(public_key)?;

    let signature = match decode_base64(signature) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Signature is not valid Base64: {}", e);
            return Ok(false);
        }
    };

    let digest = Sha256::digest(data.as_bytes());
    Ok(key
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
        .is_ok())
}

/// Generate an RSA key pair encoded the way the counterpart exchanges keys.
pub fn generate_key_pair(bits: usize) -> Result<GeneratedKeyPair, CryptoError> {
    let private = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public = RsaPublicKey::from(&private);

    let private_der = private
        .to_pkcs8_der()
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public_der = public
        .to_public_key_der()
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

    Ok(GeneratedKeyPair {
        public_key: STANDARD.encode(public_der.as_bytes()),
        private_key: STANDARD.encode(private_der.as_bytes()),
    })
}
