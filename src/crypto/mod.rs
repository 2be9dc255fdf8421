//! RSA codec for sealed request and response payloads
//!
//! Keys travel as Base64-encoded DER blobs. Padding is PKCS#1 v1.5 for both
//! encryption and SHA-256 signatures, matching the counterpart service.

mod codec;

pub use codec::{
    decrypt_with_private_key, encrypt_with_public_key, generate_key_pair, sign_with_private_key,
    verify_with_public_key, CryptoError, GeneratedKeyPair,
};
