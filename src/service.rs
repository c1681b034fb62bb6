//! # Encryption Service
//!
//! The symmetric-crypto collaborator the key-management core delegates to.
//!
//! ## Contract
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ENCRYPTION SERVICE SEAM                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  generate_master_key(password, options) → MasterKeyEntity              │
//! │  decrypt_master_key_content(master_key, password, options) → plaintext │
//! │  encrypt(method, password, data) / decrypt(method, password, data)     │
//! │                                                                         │
//! │  options.encryption_handler, when present, bypasses password-based     │
//! │  symmetric crypto: the master-key plaintext is wrapped by the          │
//! │  PPK handler instead, so only the matching private key can unwrap it. │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The service is injected into [`crate::crypto::PpkManager`] and
//! [`crate::crypto::MasterKeyProtocol`] as an `Arc<dyn EncryptionService>`;
//! tests swap in differently-configured instances freely.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::master_key::{content_checksum, MasterKeyEntity, PpkEncryptionHandler};
use crate::crypto::symmetric::{self, EncryptionKey, Nonce, NONCE_SIZE, PBKDF2_ROUNDS};
use crate::error::{Error, Result};
use crate::time::now_timestamp_millis;

/// Size of generated master-key material in bytes (256 bits).
const MASTER_KEY_BYTES: usize = 32;

/// Closed set of symmetric methods recorded on encrypted payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionMethod {
    /// AES-256-GCM with a PBKDF2-HMAC-SHA256 password-derived key.
    #[serde(rename = "password-v1")]
    PasswordV1,

    /// AES-256-GCM with an HKDF-SHA256 key derived from a high-entropy
    /// secret (a master key). Used for content, never for passwords.
    #[serde(rename = "key-v1")]
    KeyV1,

    /// Asymmetric envelope produced by a [`PpkEncryptionHandler`]; only
    /// the matching private key decrypts it.
    #[serde(rename = "ppk-envelope")]
    PpkEnvelope,
}

/// Options for master-key operations.
///
/// `encryption_handler` plugs the PPK cipher into the service in place of
/// password-based symmetric crypto.
#[derive(Default)]
pub struct MasterKeyOptions<'a> {
    /// PPK-based cipher to wrap/unwrap the master-key plaintext with.
    pub encryption_handler: Option<&'a PpkEncryptionHandler>,
}

/// Symmetric-crypto collaborator contract.
#[async_trait]
pub trait EncryptionService: Send + Sync {
    /// Generate a new master key, returning it in encrypted-at-rest form.
    ///
    /// The plaintext key material exists only for the duration of the call.
    async fn generate_master_key(
        &self,
        password: &str,
        options: MasterKeyOptions<'_>,
    ) -> Result<MasterKeyEntity>;

    /// Decrypt a master key's content back to its plaintext key material.
    async fn decrypt_master_key_content(
        &self,
        master_key: &MasterKeyEntity,
        password: &str,
        options: MasterKeyOptions<'_>,
    ) -> Result<String>;

    /// Encrypt a string payload under `password` with the given method.
    async fn encrypt(
        &self,
        method: EncryptionMethod,
        password: &str,
        plaintext: &str,
    ) -> Result<String>;

    /// Decrypt a payload produced by [`Self::encrypt`].
    async fn decrypt(
        &self,
        method: EncryptionMethod,
        password: &str,
        ciphertext: &str,
    ) -> Result<String>;
}

// ============================================================================
// DEFAULT IMPLEMENTATION
// ============================================================================

/// Sealed symmetric payload: everything needed to decrypt except the key.
#[derive(Serialize, Deserialize)]
struct SealedPayload {
    /// KDF salt, base64.
    salt: String,
    /// AES-GCM nonce, base64.
    nonce: String,
    /// Ciphertext with auth tag, base64.
    ct: String,
}

/// AES-256-GCM implementation of [`EncryptionService`].
pub struct DefaultEncryptionService {
    pbkdf2_rounds: u32,
}

impl Default for DefaultEncryptionService {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultEncryptionService {
    /// Service with production KDF parameters.
    pub fn new() -> Self {
        Self {
            pbkdf2_rounds: PBKDF2_ROUNDS,
        }
    }

    /// Service with a custom PBKDF2 round count.
    ///
    /// Tests and benchmarks lower this; production code uses [`Self::new`].
    pub fn with_pbkdf2_rounds(pbkdf2_rounds: u32) -> Self {
        Self { pbkdf2_rounds }
    }

    fn derive_key(
        &self,
        method: EncryptionMethod,
        password: &str,
        salt: &[u8],
    ) -> Result<EncryptionKey> {
        match method {
            EncryptionMethod::PasswordV1 => Ok(EncryptionKey::derive_from_password(
                password,
                salt,
                self.pbkdf2_rounds,
            )),
            EncryptionMethod::KeyV1 => EncryptionKey::derive_from_secret(password, salt),
            EncryptionMethod::PpkEnvelope => Err(Error::EncryptionFailed(
                "ppk envelopes are produced by the encryption handler, not the service".into(),
            )),
        }
    }
}

#[async_trait]
impl EncryptionService for DefaultEncryptionService {
    async fn generate_master_key(
        &self,
        password: &str,
        options: MasterKeyOptions<'_>,
    ) -> Result<MasterKeyEntity> {
        let mut material = Zeroizing::new([0u8; MASTER_KEY_BYTES]);
        rand::rngs::OsRng.fill_bytes(&mut *material);

        // Lowercase hex: exactly the shape the plaintext framing codec
        // transports as raw bytes.
        let plaintext = Zeroizing::new(hex::encode(&material[..]));

        let (content, method) = match options.encryption_handler {
            Some(handler) => (handler.encrypt(&plaintext)?, EncryptionMethod::PpkEnvelope),
            None => (
                self.encrypt(EncryptionMethod::PasswordV1, password, &plaintext)
                    .await?,
                EncryptionMethod::PasswordV1,
            ),
        };

        let now = now_timestamp_millis();
        Ok(MasterKeyEntity {
            id: uuid::Uuid::new_v4().simple().to_string(),
            checksum: content_checksum(&content),
            content,
            encryption_method: method,
            enabled: true,
            has_been_used: false,
            created_time: now,
            updated_time: now,
        })
    }

    async fn decrypt_master_key_content(
        &self,
        master_key: &MasterKeyEntity,
        password: &str,
        options: MasterKeyOptions<'_>,
    ) -> Result<String> {
        match options.encryption_handler {
            Some(handler) => handler.decrypt(&master_key.content),
            None => {
                self.decrypt(master_key.encryption_method, password, &master_key.content)
                    .await
            }
        }
    }

    async fn encrypt(
        &self,
        method: EncryptionMethod,
        password: &str,
        plaintext: &str,
    ) -> Result<String> {
        let salt = symmetric::random_salt();
        let key = self.derive_key(method, password, &salt)?;

        let (nonce, ciphertext) = symmetric::encrypt(&key, plaintext.as_bytes(), b"")?;

        let sealed = SealedPayload {
            salt: BASE64.encode(salt),
            nonce: BASE64.encode(nonce.as_bytes()),
            ct: BASE64.encode(&ciphertext),
        };
        Ok(serde_json::to_string(&sealed)?)
    }

    async fn decrypt(
        &self,
        method: EncryptionMethod,
        password: &str,
        ciphertext: &str,
    ) -> Result<String> {
        let sealed: SealedPayload = serde_json::from_str(ciphertext)
            .map_err(|e| Error::MalformedCiphertext(format!("not a sealed payload: {}", e)))?;

        let salt = BASE64
            .decode(&sealed.salt)
            .map_err(|e| Error::MalformedCiphertext(format!("salt: {}", e)))?;
        let nonce_bytes: [u8; NONCE_SIZE] = BASE64
            .decode(&sealed.nonce)
            .map_err(|e| Error::MalformedCiphertext(format!("nonce: {}", e)))?
            .try_into()
            .map_err(|_| Error::MalformedCiphertext("nonce has the wrong size".into()))?;
        let ct = BASE64
            .decode(&sealed.ct)
            .map_err(|e| Error::MalformedCiphertext(format!("ciphertext: {}", e)))?;

        let key = self.derive_key(method, password, &salt)?;
        let plaintext = Zeroizing::new(symmetric::decrypt(
            &key,
            &Nonce::from_bytes(nonce_bytes),
            &ct,
            b"",
        )?);

        std::str::from_utf8(&plaintext)
            .map(str::to_owned)
            .map_err(|_| Error::DecryptionFailed("plaintext is not valid UTF-8".into()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
