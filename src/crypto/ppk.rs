//! # Public/Private Key Pairs
//!
//! The PPK record persisted in SyncInfo, and the manager that generates,
//! loads and password-unlocks key pairs.
//!
//! ## PPK At Rest
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PPK RECORD                                       │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  id            random 128-bit hex                                      │
//! │  keySize       modulus size in bits                                    │
//! │  publicKey     algorithm-tagged PEM (shared freely)                    │
//! │  privateKey    PKCS#8 PEM sealed under the user's password             │
//! │                  { encryptionMethod, ciphertext }                      │
//! │  createdTime   ms epoch                                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The private half only ever exists in cleartext inside
//! [`PpkManager::unlock_key_pair`] callers, in buffers that zeroize on drop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::algorithm::{attach_algorithm, split_algorithm, KeyAlgorithm};
use crate::crypto::provider::RsaKeyPair;
use crate::crypto::registry::KeyAlgorithmRegistry;
use crate::error::{Error, Result};
use crate::service::{EncryptionMethod, EncryptionService};
use crate::time::now_timestamp_millis;

/// The encrypted private half of a PPK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKeyData {
    /// Symmetric method the ciphertext was produced with.
    pub encryption_method: EncryptionMethod,
    /// The sealed PKCS#8 PEM.
    pub ciphertext: String,
}

/// A public/private key pair in its persisted form.
///
/// This is the record stored in SyncInfo and shared across devices; the
/// private key never leaves it unencrypted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPrivateKeyPair {
    /// Random identifier, referenced by master-key envelopes.
    pub id: String,
    /// Modulus size in bits.
    pub key_size: usize,
    /// Algorithm-tagged public key string (see [`attach_algorithm`]).
    pub public_key: String,
    /// Password-encrypted private key.
    pub private_key: PrivateKeyData,
    /// Creation time, ms epoch.
    pub created_time: i64,
}

/// Generates, loads and password-unlocks key pairs.
///
/// Holds its provider registry and symmetric service explicitly; nothing
/// in this module reaches for global state.
pub struct PpkManager {
    registry: Arc<KeyAlgorithmRegistry>,
    service: Arc<dyn EncryptionService>,
}

impl PpkManager {
    /// Create a manager over the given registry and symmetric service.
    pub fn new(registry: Arc<KeyAlgorithmRegistry>, service: Arc<dyn EncryptionService>) -> Self {
        Self { registry, service }
    }

    /// The registry this manager dispatches through.
    pub fn registry(&self) -> &Arc<KeyAlgorithmRegistry> {
        &self.registry
    }

    /// Generate a new PPK on the default algorithm.
    ///
    /// CPU-bound for larger moduli (seconds); callers keep it off any
    /// interactive thread.
    pub async fn generate_ppk(&self, password: &str) -> Result<PublicPrivateKeyPair> {
        self.generate_ppk_with_algorithm(self.registry.default_algorithm(), password)
            .await
    }

    /// Generate a new PPK on a specific algorithm.
    pub async fn generate_ppk_with_algorithm(
        &self,
        algorithm: KeyAlgorithm,
        password: &str,
    ) -> Result<PublicPrivateKeyPair> {
        let provider = self.registry.provider(algorithm)?;

        let key_pair = provider.generate_key_pair()?;
        let public_pem = provider.export_public_key(&key_pair)?;
        let private_pem = provider.export_private_key(&key_pair)?;

        let ciphertext = self
            .service
            .encrypt(EncryptionMethod::PasswordV1, password, &private_pem)
            .await?;

        tracing::info!(
            "Generated new {} key pair ({} bits)",
            algorithm,
            key_pair.size_bits()
        );

        Ok(PublicPrivateKeyPair {
            id: uuid::Uuid::new_v4().simple().to_string(),
            key_size: key_pair.size_bits(),
            public_key: attach_algorithm(&public_pem, algorithm),
            private_key: PrivateKeyData {
                encryption_method: EncryptionMethod::PasswordV1,
                ciphertext,
            },
            created_time: now_timestamp_millis(),
        })
    }

    /// Load the public half only.
    ///
    /// This is all a sender needs to wrap a master key for the PPK's owner.
    pub fn load_public_key_pair(
        &self,
        ppk: &PublicPrivateKeyPair,
    ) -> Result<(KeyAlgorithm, RsaKeyPair)> {
        let (algorithm, public_pem) = split_algorithm(&ppk.public_key)?;
        let provider = self.registry.provider(algorithm)?;
        let key_pair = provider.load_key_pair(public_pem, None, ppk.key_size)?;
        Ok((algorithm, key_pair))
    }

    /// Decrypt the private key with `password` and load the full pair.
    ///
    /// A failed decryption surfaces as [`Error::InvalidPassword`]; every
    /// other failure keeps its own error.
    pub async fn unlock_key_pair(
        &self,
        ppk: &PublicPrivateKeyPair,
        password: &str,
    ) -> Result<(KeyAlgorithm, RsaKeyPair)> {
        let (algorithm, public_pem) = split_algorithm(&ppk.public_key)?;
        let provider = self.registry.provider(algorithm)?;

        let private_pem = Zeroizing::new(
            self.service
                .decrypt(
                    ppk.private_key.encryption_method,
                    password,
                    &ppk.private_key.ciphertext,
                )
                .await
                .map_err(|e| match e {
                    Error::DecryptionFailed(_) => Error::InvalidPassword,
                    other => other,
                })?,
        );

        let key_pair = provider.load_key_pair(public_pem, Some(&private_pem), ppk.key_size)?;
        Ok((algorithm, key_pair))
    }

    /// Whether `password` unlocks this PPK's private key.
    ///
    /// The one boundary where decrypt failure is expected and non-fatal:
    /// any failure is `false`, never an error.
    pub async fn ppk_password_is_valid(&self, ppk: &PublicPrivateKeyPair, password: &str) -> bool {
        self.unlock_key_pair(ppk, password).await.is_ok()
    }

    /// Whether this PPK should be regenerated on the default algorithm.
    pub fn should_update_ppk(&self, ppk: &PublicPrivateKeyPair) -> Result<bool> {
        self.registry.should_update_ppk(ppk)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_keys;
    use crate::service::DefaultEncryptionService;

    fn manager() -> PpkManager {
        PpkManager::new(
            Arc::new(KeyAlgorithmRegistry::new()),
            Arc::new(DefaultEncryptionService::with_pbkdf2_rounds(1_000)),
        )
    }

    #[tokio::test]
    async fn test_password_validation() {
        let manager = manager();
        let ppk = test_keys::make_test_ppk(&manager, KeyAlgorithm::RsaOaep2048, "111111").await;

        assert!(manager.ppk_password_is_valid(&ppk, "111111").await);
        assert!(!manager.ppk_password_is_valid(&ppk, "222").await);
    }

    #[tokio::test]
    async fn test_unlock_maps_to_invalid_password() {
        let manager = manager();
        let ppk = test_keys::make_test_ppk(&manager, KeyAlgorithm::RsaOaep2048, "111111").await;

        let result = manager.unlock_key_pair(&ppk, "wrong").await;
        assert!(matches!(result, Err(Error::InvalidPassword)));
    }

    #[tokio::test]
    async fn test_unlocked_pair_has_private_half() {
        let manager = manager();
        let ppk = test_keys::make_test_ppk(&manager, KeyAlgorithm::RsaOaep2048, "111111").await;

        let (algorithm, key_pair) = manager.unlock_key_pair(&ppk, "111111").await.unwrap();
        assert_eq!(algorithm, KeyAlgorithm::RsaOaep2048);
        assert!(key_pair.has_private_key());

        let (_, public_only) = manager.load_public_key_pair(&ppk).unwrap();
        assert!(!public_only.has_private_key());
    }

    #[tokio::test]
    async fn test_legacy_ppk_should_update() {
        let manager = manager();

        let legacy = test_keys::make_test_ppk(&manager, KeyAlgorithm::RsaLegacy, "pw").await;
        assert!(manager.should_update_ppk(&legacy).unwrap());

        // A bare pre-migration public key (no algorithm prefix) is legacy too.
        assert!(!legacy.public_key.contains(';'));

        let current = test_keys::make_test_ppk(&manager, KeyAlgorithm::RsaOaep4096, "pw").await;
        assert!(!manager.should_update_ppk(&current).unwrap());
    }

    #[tokio::test]
    async fn test_ppk_record_round_trips_as_json() {
        let manager = manager();
        let ppk = test_keys::make_test_ppk(&manager, KeyAlgorithm::RsaOaep2048, "pw").await;

        let json = serde_json::to_string(&ppk).unwrap();
        assert!(json.contains("\"publicKey\""));
        assert!(json.contains("\"keySize\""));

        let restored: PublicPrivateKeyPair = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, ppk);
        assert!(manager.ppk_password_is_valid(&restored, "pw").await);
    }

    // Exercises real key generation end to end; the other tests build
    // their PPKs from the shared fixtures to keep the suite fast.
    #[tokio::test]
    async fn test_generate_ppk_with_algorithm() {
        let manager = manager();
        let ppk = manager
            .generate_ppk_with_algorithm(KeyAlgorithm::RsaOaep2048, "111111")
            .await
            .unwrap();

        assert_eq!(ppk.key_size, 2048);
        assert!(ppk.public_key.starts_with("rsa-oaep-2048;"));
        assert!(manager.ppk_password_is_valid(&ppk, "111111").await);
    }

    #[tokio::test]
    async fn test_generate_on_unsupported_algorithm() {
        let manager = PpkManager::new(
            Arc::new(KeyAlgorithmRegistry::with_supported(&[
                KeyAlgorithm::RsaLegacy,
            ])),
            Arc::new(DefaultEncryptionService::with_pbkdf2_rounds(1_000)),
        );

        let result = manager
            .generate_ppk_with_algorithm(KeyAlgorithm::RsaOaep4096, "pw")
            .await;
        assert!(matches!(result, Err(Error::UnsupportedAlgorithm(_))));
    }
}
