//! # Master-Key Protocol
//!
//! Generates and decrypts master keys bound to a PPK, and implements the
//! two re-encryption transforms behind sharing an encrypted notebook.
//!
//! ## Sharing Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    MASTER-KEY RE-ENCRYPTION                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  OWNER (inviting a collaborator)                                       │
//! │  ────────────────────────────────                                       │
//! │                                                                         │
//! │  password ──► decrypt master key ──► plaintext key material            │
//! │                                          │                              │
//! │                   recipient PUBLIC key ──┤  (no recipient secrets      │
//! │                                          ▼   ever held locally)        │
//! │                              ppk envelope { ppkId, algorithm, ct }     │
//! │                                                                         │
//! │  RECIPIENT (accepting the share)                                       │
//! │  ────────────────────────────────                                       │
//! │                                                                         │
//! │  own password ──► unlock own private key ──► open envelope             │
//! │                                          │                              │
//! │                       new password ──────┤                              │
//! │                                          ▼                              │
//! │                              password-sealed master key, stored        │
//! │                                                                         │
//! │  The plaintext never leaves the process on either side.                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A ppk envelope embeds the id of the key pair it was encrypted for.
//! Decrypting with any other PPK is [`Error::WrongKey`], checked before any
//! private-key material is touched — never retried with a different key.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::crypto::algorithm::KeyAlgorithm;
use crate::crypto::ppk::{PpkManager, PublicPrivateKeyPair};
use crate::crypto::provider::RsaKeyPair;
use crate::crypto::registry::KeyAlgorithmRegistry;
use crate::error::{Error, Result};
use crate::service::{EncryptionMethod, EncryptionService, MasterKeyOptions};
use crate::time::now_timestamp_millis;

/// A symmetric content-encryption key in encrypted-at-rest form.
///
/// `content` is the sealed key material; which seal depends on
/// `encryption_method` (password, master key or ppk envelope).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterKeyEntity {
    /// Random identifier.
    pub id: String,

    /// Sealed key material.
    pub content: String,

    /// SHA-256 hex of `content`, recomputed on every re-encryption.
    pub checksum: String,

    /// How `content` is sealed.
    pub encryption_method: EncryptionMethod,

    /// Disabled keys are kept for decryption of old content but never
    /// selected for new encryption. Absent in older records: enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether any content was ever encrypted with this key. Records from
    /// before this field existed predate redundant-key detection, so they
    /// migrate to `true`.
    #[serde(rename = "hasBeenUsed", default = "default_true")]
    pub has_been_used: bool,

    /// Creation time, ms epoch.
    pub created_time: i64,

    /// Last modification time, ms epoch.
    pub updated_time: i64,
}

fn default_true() -> bool {
    true
}

/// SHA-256 hex checksum of sealed master-key content.
pub fn content_checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

// ============================================================================
// PPK ENVELOPE
// ============================================================================

/// Wire form of ppk-encrypted master-key content.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PpkMessage {
    /// Id of the key pair this envelope was encrypted for.
    pub ppk_id: String,
    /// Algorithm of that key pair.
    pub algorithm: KeyAlgorithm,
    /// Base64 of the codec-stack ciphertext.
    pub ciphertext: String,
}

impl PpkMessage {
    pub(crate) fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::MalformedCiphertext(format!("not a ppk envelope: {}", e)))
    }
}

/// The pluggable cipher handed to the encryption service for master-key
/// operations: one key pair, its owning PPK id, and its algorithm.
pub struct PpkEncryptionHandler {
    registry: Arc<KeyAlgorithmRegistry>,
    ppk_id: String,
    algorithm: KeyAlgorithm,
    key_pair: RsaKeyPair,
}

impl PpkEncryptionHandler {
    /// Build a handler for one unlocked (or public-only) key pair.
    pub fn new(
        registry: Arc<KeyAlgorithmRegistry>,
        ppk_id: String,
        algorithm: KeyAlgorithm,
        key_pair: RsaKeyPair,
    ) -> Self {
        Self {
            registry,
            ppk_id,
            algorithm,
            key_pair,
        }
    }

    /// Id of the PPK this handler encrypts for.
    pub fn ppk_id(&self) -> &str {
        &self.ppk_id
    }

    /// Algorithm of the underlying key pair.
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Wrap a plaintext into a ppk envelope. Needs only the public half.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = self.registry.text_cipher(self.algorithm)?;
        let ciphertext = cipher.encrypt_text(plaintext, &self.key_pair)?;

        let message = PpkMessage {
            ppk_id: self.ppk_id.clone(),
            algorithm: self.algorithm,
            ciphertext: BASE64.encode(ciphertext),
        };
        Ok(serde_json::to_string(&message)?)
    }

    /// Open a ppk envelope. Needs the private half.
    pub fn decrypt(&self, content: &str) -> Result<String> {
        let message = PpkMessage::parse(content)?;
        if message.ppk_id != self.ppk_id {
            return Err(Error::WrongKey {
                expected: message.ppk_id,
                actual: self.ppk_id.clone(),
            });
        }

        let cipher = self.registry.text_cipher(message.algorithm)?;
        let ciphertext = BASE64
            .decode(&message.ciphertext)
            .map_err(|e| Error::MalformedCiphertext(format!("ppk envelope body: {}", e)))?;

        cipher.decrypt_text(&ciphertext, &self.key_pair)
    }
}

// ============================================================================
// PROTOCOL
// ============================================================================

/// Master-key operations bound to PPKs.
///
/// Construction injects the registry and the symmetric service; the
/// protocol builds its own [`PpkManager`] over the same handles.
pub struct MasterKeyProtocol {
    registry: Arc<KeyAlgorithmRegistry>,
    service: Arc<dyn EncryptionService>,
    ppk_manager: PpkManager,
}

impl MasterKeyProtocol {
    /// Create the protocol over the given registry and symmetric service.
    pub fn new(registry: Arc<KeyAlgorithmRegistry>, service: Arc<dyn EncryptionService>) -> Self {
        Self {
            ppk_manager: PpkManager::new(registry.clone(), service.clone()),
            registry,
            service,
        }
    }

    /// The PPK manager sharing this protocol's registry and service.
    pub fn ppk_manager(&self) -> &PpkManager {
        &self.ppk_manager
    }

    /// Generate a master key whose content only `ppk`'s private key can
    /// decrypt.
    ///
    /// Fails with [`Error::InvalidPassword`] when `password` does not
    /// unlock the PPK. The plaintext key material exists only for the
    /// duration of the call.
    pub async fn generate_master_key(
        &self,
        ppk: &PublicPrivateKeyPair,
        password: &str,
    ) -> Result<MasterKeyEntity> {
        let (algorithm, key_pair) = self.ppk_manager.unlock_key_pair(ppk, password).await?;
        let handler = PpkEncryptionHandler::new(
            self.registry.clone(),
            ppk.id.clone(),
            algorithm,
            key_pair,
        );

        self.service
            .generate_master_key(
                password,
                MasterKeyOptions {
                    encryption_handler: Some(&handler),
                },
            )
            .await
    }

    /// Decrypt a ppk-bound master key back to its plaintext key material.
    ///
    /// The envelope names the PPK it was encrypted for; a mismatch with
    /// `ppk.id` is [`Error::WrongKey`] before any decryption is attempted.
    pub async fn decrypt_master_key_content(
        &self,
        master_key: &MasterKeyEntity,
        ppk: &PublicPrivateKeyPair,
        password: &str,
    ) -> Result<String> {
        let message = PpkMessage::parse(&master_key.content)?;
        if message.ppk_id != ppk.id {
            return Err(Error::WrongKey {
                expected: message.ppk_id,
                actual: ppk.id.clone(),
            });
        }

        let (algorithm, key_pair) = self.ppk_manager.unlock_key_pair(ppk, password).await?;
        let handler = PpkEncryptionHandler::new(
            self.registry.clone(),
            ppk.id.clone(),
            algorithm,
            key_pair,
        );

        self.service
            .decrypt_master_key_content(
                master_key,
                password,
                MasterKeyOptions {
                    encryption_handler: Some(&handler),
                },
            )
            .await
    }

    /// Re-encrypt a password-sealed master key under a recipient's public
    /// key.
    ///
    /// Used when inviting a collaborator into an encrypted shared
    /// notebook: only the recipient's *public* key is needed locally.
    pub async fn reencrypt_password_to_public_key(
        &self,
        master_key: &MasterKeyEntity,
        decryption_password: &str,
        recipient_ppk: &PublicPrivateKeyPair,
    ) -> Result<MasterKeyEntity> {
        let plaintext = Zeroizing::new(
            self.service
                .decrypt_master_key_content(
                    master_key,
                    decryption_password,
                    MasterKeyOptions::default(),
                )
                .await?,
        );

        let (algorithm, public_pair) = self.ppk_manager.load_public_key_pair(recipient_ppk)?;
        let handler = PpkEncryptionHandler::new(
            self.registry.clone(),
            recipient_ppk.id.clone(),
            algorithm,
            public_pair,
        );

        let content = handler.encrypt(&plaintext)?;
        let mut updated = master_key.clone();
        updated.checksum = content_checksum(&content);
        updated.content = content;
        updated.encryption_method = EncryptionMethod::PpkEnvelope;
        updated.updated_time = now_timestamp_millis();
        Ok(updated)
    }

    /// Inverse of [`Self::reencrypt_password_to_public_key`]: the
    /// recipient opens the envelope with their own private key (unlocked
    /// by `recipient_password`) and re-seals the key material under
    /// `new_password` for local storage.
    pub async fn reencrypt_public_key_to_password(
        &self,
        master_key: &MasterKeyEntity,
        recipient_ppk: &PublicPrivateKeyPair,
        recipient_password: &str,
        new_password: &str,
    ) -> Result<MasterKeyEntity> {
        let message = PpkMessage::parse(&master_key.content)?;
        if message.ppk_id != recipient_ppk.id {
            return Err(Error::WrongKey {
                expected: message.ppk_id,
                actual: recipient_ppk.id.clone(),
            });
        }

        let (algorithm, key_pair) = self
            .ppk_manager
            .unlock_key_pair(recipient_ppk, recipient_password)
            .await?;
        let handler = PpkEncryptionHandler::new(
            self.registry.clone(),
            recipient_ppk.id.clone(),
            algorithm,
            key_pair,
        );

        let plaintext = Zeroizing::new(
            self.service
                .decrypt_master_key_content(
                    master_key,
                    recipient_password,
                    MasterKeyOptions {
                        encryption_handler: Some(&handler),
                    },
                )
                .await?,
        );

        let content = self
            .service
            .encrypt(EncryptionMethod::PasswordV1, new_password, &plaintext)
            .await?;
        let mut updated = master_key.clone();
        updated.checksum = content_checksum(&content);
        updated.content = content;
        updated.encryption_method = EncryptionMethod::PasswordV1;
        updated.updated_time = now_timestamp_millis();
        Ok(updated)
    }

    /// Whether `password` unlocks this PPK's private key; `false` on any
    /// failure.
    pub async fn ppk_password_is_valid(&self, ppk: &PublicPrivateKeyPair, password: &str) -> bool {
        self.ppk_manager.ppk_password_is_valid(ppk, password).await
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

    fn protocol() -> MasterKeyProtocol {
        MasterKeyProtocol::new(
            Arc::new(KeyAlgorithmRegistry::new()),
            Arc::new(DefaultEncryptionService::with_pbkdf2_rounds(1_000)),
        )
    }

    #[tokio::test]
    async fn test_generate_and_decrypt_master_key() {
        let protocol = protocol();
        let ppk =
            test_keys::make_test_ppk(protocol.ppk_manager(), KeyAlgorithm::RsaOaep2048, "111111")
                .await;

        let master_key = protocol.generate_master_key(&ppk, "111111").await.unwrap();
        assert_eq!(master_key.encryption_method, EncryptionMethod::PpkEnvelope);
        assert!(master_key.content.contains(&ppk.id));

        let plaintext = protocol
            .decrypt_master_key_content(&master_key, &ppk, "111111")
            .await
            .unwrap();
        assert!(!plaintext.is_empty());
        assert_ne!(plaintext, master_key.content);
        assert_eq!(plaintext.len(), 64);
    }

    #[tokio::test]
    async fn test_generate_with_wrong_password() {
        let protocol = protocol();
        let ppk =
            test_keys::make_test_ppk(protocol.ppk_manager(), KeyAlgorithm::RsaOaep2048, "111111")
                .await;

        let result = protocol.generate_master_key(&ppk, "222").await;
        assert!(matches!(result, Err(Error::InvalidPassword)));
    }

    #[tokio::test]
    async fn test_decrypt_with_wrong_ppk_is_wrong_key() {
        let protocol = protocol();
        let ppk =
            test_keys::make_test_ppk(protocol.ppk_manager(), KeyAlgorithm::RsaOaep2048, "111111")
                .await;
        let other =
            test_keys::make_test_ppk(protocol.ppk_manager(), KeyAlgorithm::RsaOaep4096, "111111")
                .await;

        let master_key = protocol.generate_master_key(&ppk, "111111").await.unwrap();

        let result = protocol
            .decrypt_master_key_content(&master_key, &other, "111111")
            .await;
        match result {
            Err(Error::WrongKey { expected, actual }) => {
                assert_eq!(expected, ppk.id);
                assert_eq!(actual, other.id);
            }
            other => panic!("expected WrongKey, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_share_round_trip() {
        let protocol = protocol();
        let service = DefaultEncryptionService::with_pbkdf2_rounds(1_000);

        // The notebook's master key, password-sealed on the owner's device.
        let master_key = service
            .generate_master_key("111111", MasterKeyOptions::default())
            .await
            .unwrap();
        let original_plaintext = service
            .decrypt_master_key_content(&master_key, "111111", MasterKeyOptions::default())
            .await
            .unwrap();

        // Owner invites a collaborator, holding only their public key.
        let recipient = test_keys::make_test_ppk(
            protocol.ppk_manager(),
            KeyAlgorithm::RsaOaep2048,
            "ppkPw",
        )
        .await;
        let shared = protocol
            .reencrypt_password_to_public_key(&master_key, "111111", &recipient)
            .await
            .unwrap();

        assert_eq!(shared.id, master_key.id);
        assert_ne!(shared.content, master_key.content);
        assert_eq!(shared.encryption_method, EncryptionMethod::PpkEnvelope);
        assert_eq!(shared.checksum, content_checksum(&shared.content));

        // Recipient accepts, re-sealing under a password of their own.
        let accepted = protocol
            .reencrypt_public_key_to_password(&shared, &recipient, "ppkPw", "newPw")
            .await
            .unwrap();
        assert_eq!(accepted.encryption_method, EncryptionMethod::PasswordV1);

        let restored_plaintext = service
            .decrypt_master_key_content(&accepted, "newPw", MasterKeyOptions::default())
            .await
            .unwrap();
        assert_eq!(restored_plaintext, original_plaintext);
    }

    #[tokio::test]
    async fn test_accepting_with_someone_elses_ppk_is_wrong_key() {
        let protocol = protocol();
        let service = DefaultEncryptionService::with_pbkdf2_rounds(1_000);

        let master_key = service
            .generate_master_key("111111", MasterKeyOptions::default())
            .await
            .unwrap();

        let recipient = test_keys::make_test_ppk(
            protocol.ppk_manager(),
            KeyAlgorithm::RsaOaep2048,
            "ppkPw",
        )
        .await;
        let bystander = test_keys::make_test_ppk(
            protocol.ppk_manager(),
            KeyAlgorithm::RsaOaep4096,
            "otherPw",
        )
        .await;

        let shared = protocol
            .reencrypt_password_to_public_key(&master_key, "111111", &recipient)
            .await
            .unwrap();

        let result = protocol
            .reencrypt_public_key_to_password(&shared, &bystander, "otherPw", "newPw")
            .await;
        assert!(matches!(result, Err(Error::WrongKey { .. })));
    }

    #[tokio::test]
    async fn test_legacy_ppk_shares_via_chunked_codec() {
        // A legacy-algorithm recipient exercises chunking + framing end
        // to end through the share path.
        let protocol = protocol();
        let service = DefaultEncryptionService::with_pbkdf2_rounds(1_000);

        let master_key = service
            .generate_master_key("111111", MasterKeyOptions::default())
            .await
            .unwrap();
        let recipient =
            test_keys::make_test_ppk(protocol.ppk_manager(), KeyAlgorithm::RsaLegacy, "legacyPw")
                .await;

        let shared = protocol
            .reencrypt_password_to_public_key(&master_key, "111111", &recipient)
            .await
            .unwrap();
        let accepted = protocol
            .reencrypt_public_key_to_password(&shared, &recipient, "legacyPw", "newPw")
            .await
            .unwrap();

        let original = service
            .decrypt_master_key_content(&master_key, "111111", MasterKeyOptions::default())
            .await
            .unwrap();
        let restored = service
            .decrypt_master_key_content(&accepted, "newPw", MasterKeyOptions::default())
            .await
            .unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn test_entity_serde_defaults_migrate_old_records() {
        // Records written before `enabled`/`hasBeenUsed` existed load as
        // enabled and used.
        let json = r#"{
            "id": "mk1",
            "content": "sealed",
            "checksum": "00",
            "encryption_method": "password-v1",
            "created_time": 1,
            "updated_time": 2
        }"#;

        let entity: MasterKeyEntity = serde_json::from_str(json).unwrap();
        assert!(entity.enabled);
        assert!(entity.has_been_used);
    }

    #[test]
    fn test_checksum_is_stable_hex() {
        let checksum = content_checksum("payload");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, content_checksum("payload"));
        assert_ne!(checksum, content_checksum("payload2"));
    }
}
