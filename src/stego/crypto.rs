// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Document-bound key derivation and payload encryption.
//!
//! - **Document key**: Argon2id over `fingerprint:bucket:context`, where the
//!   fingerprint is the SHA-256 of the document bytes and the bucket is the
//!   current unix time divided into fixed windows (one hour by default). The
//!   salt is derived from the fingerprint, so identical content within one
//!   bucket always yields the same key.
//!
//! - **Payload cipher**: AES-256-GCM-SIV with a random 96-bit nonce. Tokens
//!   are self-describing strings:
//!
//! ```text
//! "enc:" + base64url( [1 byte version][12 bytes nonce][ciphertext + 16-byte tag] )
//! ```
//!
//! The `enc:` prefix lets encrypted credentials coexist with legacy plaintext
//! ones; callers discriminate with [`is_encrypted`] before decrypting.

use aes_gcm_siv::aead::Aead;
use aes_gcm_siv::{Aes256GcmSiv, KeyInit, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use hmac::{Hmac, Mac};
use log::debug;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::stego::clock::Clock;
use crate::stego::config::{KdfParams, WatermarkConfig};
use crate::stego::error::{Result, StegoError};

/// Document key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;
/// AES-GCM-SIV nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;
/// Argon2 salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Prefix marking an encrypted credential.
pub const ENCRYPTED_PREFIX: &str = "enc:";
/// Current token layout version.
const TOKEN_VERSION: u8 = 0x01;

/// Symmetric key derived from a document's content.
///
/// Zeroized on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentKey(Zeroizing<[u8; KEY_LEN]>);

impl DocumentKey {
    /// Wrap raw key bytes.
    ///
    /// # Errors
    /// [`StegoError::InvalidKey`] unless exactly 32 bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| StegoError::InvalidKey)?;
        Ok(Self(Zeroizing::new(arr)))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// URL-safe base64 (44 characters), the form handed to key stores.
    pub fn to_base64(&self) -> String {
        URL_SAFE.encode(&*self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(URL_SAFE.decode(encoded).map_err(|_| StegoError::InvalidKey)?);
        Self::from_bytes(&bytes)
    }

    /// 32-bit fingerprint carried in the security header.
    pub fn fingerprint(&self) -> u32 {
        key_fingerprint(self)
    }
}

impl core::fmt::Debug for DocumentKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "DocumentKey({:08x})", self.fingerprint())
    }
}

/// Lowercase hex SHA-256 of the document bytes.
pub fn document_fingerprint(document: &[u8]) -> String {
    hex::encode(Sha256::digest(document))
}

/// Index of the time window containing `unix_secs`.
pub fn time_bucket(unix_secs: u64, bucket_secs: u64) -> u64 {
    unix_secs / bucket_secs.max(1)
}

/// Derive the document key for the current time bucket.
pub fn derive_key(
    document: &[u8],
    context: &str,
    clock: &dyn Clock,
    config: &WatermarkConfig,
) -> Result<DocumentKey> {
    derive_key_at(document, context, clock.now_secs(), config)
}

/// Derive the document key for the bucket containing `unix_secs`.
///
/// # Errors
/// [`StegoError::Config`] if the KDF parameters are rejected by Argon2.
pub fn derive_key_at(
    document: &[u8],
    context: &str,
    unix_secs: u64,
    config: &WatermarkConfig,
) -> Result<DocumentKey> {
    let fingerprint = document_fingerprint(document);
    let bucket = time_bucket(unix_secs, config.bucket_secs);
    let material = Zeroizing::new(format!("{fingerprint}:{bucket}:{context}"));

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&Sha256::digest(fingerprint.as_bytes())[..SALT_LEN]);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    kdf_hasher(&config.kdf)?
        .hash_password_into(material.as_bytes(), &salt, &mut *key)
        .map_err(|e| StegoError::Config(format!("argon2: {e}")))?;

    let key = DocumentKey(key);
    debug!(
        "derived document key {:08x} for document {} (bucket {bucket})",
        key.fingerprint(),
        &fingerprint[..16]
    );
    Ok(key)
}

fn kdf_hasher(params: &KdfParams) -> Result<Argon2<'static>> {
    let params = Params::new(params.memory_kib, params.iterations, params.parallelism, Some(KEY_LEN))
        .map_err(|e| StegoError::Config(format!("argon2 params: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// First four bytes (big-endian) of SHA-256 over the key.
pub fn key_fingerprint(key: &DocumentKey) -> u32 {
    let digest = Sha256::digest(key.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// True if `payload` carries the encrypted-token prefix.
pub fn is_encrypted(payload: &str) -> bool {
    payload.starts_with(ENCRYPTED_PREFIX)
}

/// Encrypt a credential string under the document key.
pub fn encrypt(plaintext: &str, key: &DocumentKey) -> Result<String> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256GcmSiv::new_from_slice(key.as_bytes()).map_err(|_| StegoError::InvalidKey)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|_| StegoError::EncryptionFailed)?;

    let mut token = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    token.push(TOKEN_VERSION);
    token.extend_from_slice(&nonce_bytes);
    token.extend_from_slice(&ciphertext);

    Ok(format!("{ENCRYPTED_PREFIX}{}", URL_SAFE.encode(token)))
}

/// Decrypt an `enc:` token.
///
/// Fails closed: a missing prefix, malformed base64, unknown version,
/// truncated token, tag mismatch, wrong key or non-UTF-8 plaintext all give
/// [`StegoError::DecryptionFailed`] and never partial output.
pub fn decrypt(tagged: &str, key: &DocumentKey) -> Result<String> {
    let encoded = tagged.strip_prefix(ENCRYPTED_PREFIX).ok_or(StegoError::DecryptionFailed)?;
    let token = URL_SAFE.decode(encoded).map_err(|_| StegoError::DecryptionFailed)?;
    if token.len() < 1 + NONCE_LEN + TAG_LEN || token[0] != TOKEN_VERSION {
        return Err(StegoError::DecryptionFailed);
    }
    let (nonce_bytes, ciphertext) = token[1..].split_at(NONCE_LEN);

    let cipher = Aes256GcmSiv::new_from_slice(key.as_bytes()).map_err(|_| StegoError::InvalidKey)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| StegoError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| StegoError::DecryptionFailed)
}

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of a document fingerprint under its key, base64url encoded.
pub fn sign_document(document_fingerprint: &str, key: &DocumentKey) -> Result<String> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes()).map_err(|_| StegoError::InvalidKey)?;
    mac.update(document_fingerprint.as_bytes());
    Ok(URL_SAFE.encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a signature from [`sign_document`].
pub fn verify_document_signature(document_fingerprint: &str, key: &DocumentKey, signature: &str) -> bool {
    let Ok(expected) = URL_SAFE.decode(signature) else {
        return false;
    };
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(key.as_bytes()) else {
        return false;
    };
    mac.update(document_fingerprint.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> WatermarkConfig {
        WatermarkConfig {
            kdf: KdfParams { memory_kib: 64, iterations: 1, parallelism: 1 },
            ..WatermarkConfig::default()
        }
    }

    const T0: u64 = 1_760_000_400; // exactly on an hour boundary

    #[test]
    fn key_deterministic_within_bucket() {
        let cfg = fast_config();
        let a = derive_key_at(b"document body", "alice", T0, &cfg).unwrap();
        let b = derive_key_at(b"document body", "alice", T0 + 3599, &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn key_changes_across_bucket() {
        let cfg = fast_config();
        let a = derive_key_at(b"document body", "", T0 + 3599, &cfg).unwrap();
        let b = derive_key_at(b"document body", "", T0 + 3600, &cfg).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn key_depends_on_content_and_context() {
        let cfg = fast_config();
        let base = derive_key_at(b"document body", "", T0, &cfg).unwrap();
        assert_ne!(base, derive_key_at(b"document bodY", "", T0, &cfg).unwrap());
        assert_ne!(base, derive_key_at(b"document body", "bob", T0, &cfg).unwrap());
    }

    #[test]
    fn derive_reads_clock() {
        use crate::stego::clock::ManualClock;
        let cfg = fast_config();
        let clock = ManualClock::new(T0 + 10);
        let a = derive_key(b"doc", "", &clock, &cfg).unwrap();
        assert_eq!(a, derive_key_at(b"doc", "", T0, &cfg).unwrap());
    }

    #[test]
    fn bad_kdf_params_are_config_errors() {
        let cfg = WatermarkConfig {
            kdf: KdfParams { memory_kib: 1, iterations: 1, parallelism: 1 },
            ..WatermarkConfig::default()
        };
        assert!(matches!(derive_key_at(b"doc", "", T0, &cfg), Err(StegoError::Config(_))));
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = DocumentKey::from_bytes(&[7u8; 32]).unwrap();
        let token = encrypt("CRED-2026-0042", &key).unwrap();
        assert!(is_encrypted(&token));
        assert_eq!(decrypt(&token, &key).unwrap(), "CRED-2026-0042");
    }

    #[test]
    fn wrong_key_fails_closed() {
        let key = DocumentKey::from_bytes(&[7u8; 32]).unwrap();
        let other = DocumentKey::from_bytes(&[8u8; 32]).unwrap();
        let token = encrypt("secret", &key).unwrap();
        assert!(matches!(decrypt(&token, &other), Err(StegoError::DecryptionFailed)));
    }

    #[test]
    fn malformed_tokens_rejected() {
        let key = DocumentKey::from_bytes(&[7u8; 32]).unwrap();
        for bad in ["secret", "enc:", "enc:!!!!", "enc:AAAA", "ENC:abcd"] {
            assert!(matches!(decrypt(bad, &key), Err(StegoError::DecryptionFailed)), "{bad}");
        }
    }

    #[test]
    fn tampered_token_rejected() {
        let key = DocumentKey::from_bytes(&[7u8; 32]).unwrap();
        let token = encrypt("secret", &key).unwrap();
        let mut raw = URL_SAFE.decode(&token[4..]).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = format!("enc:{}", URL_SAFE.encode(raw));
        assert!(matches!(decrypt(&tampered, &key), Err(StegoError::DecryptionFailed)));
    }

    #[test]
    fn ciphertext_differs_per_encryption() {
        let key = DocumentKey::from_bytes(&[1u8; 32]).unwrap();
        assert_ne!(encrypt("same", &key).unwrap(), encrypt("same", &key).unwrap());
    }

    #[test]
    fn key_base64_roundtrip() {
        let key = DocumentKey::from_bytes(&[0xABu8; 32]).unwrap();
        let encoded = key.to_base64();
        assert_eq!(encoded.len(), 44);
        assert_eq!(DocumentKey::from_base64(&encoded).unwrap(), key);
        assert!(matches!(DocumentKey::from_base64("short"), Err(StegoError::InvalidKey)));
    }

    #[test]
    fn fingerprint_is_digest_prefix() {
        let key = DocumentKey::from_bytes(&[0u8; 32]).unwrap();
        let digest = Sha256::digest([0u8; 32]);
        assert_eq!(key.fingerprint().to_be_bytes(), digest[..4]);
        assert!(format!("{key:?}").starts_with("DocumentKey("));
    }

    #[test]
    fn document_signature_verifies() {
        let key = DocumentKey::from_bytes(&[3u8; 32]).unwrap();
        let fp = document_fingerprint(b"contract.docx bytes");
        assert_eq!(fp.len(), 64);
        let sig = sign_document(&fp, &key).unwrap();
        assert!(verify_document_signature(&fp, &key, &sig));
        assert!(!verify_document_signature(&document_fingerprint(b"other"), &key, &sig));
        assert!(!verify_document_signature(&fp, &key, "not base64 !"));
    }
}
