//! # Key Algorithm Registry
//!
//! Selects a provider (plus codec stack) by algorithm identifier and holds
//! the migration / default-algorithm policy.
//!
//! The registry is plain data handed to the PPK manager and the master-key
//! protocol at construction time. There is no module-level singleton; tests
//! run in parallel with registries configured differently.
//!
//! ## Migration Policy
//!
//! ```text
//! ppk_migrations():   RsaLegacy ──► RsaOaep2048 ──► RsaOaep4096
//!                      (oldest)                      (default for new keys)
//!
//! should_update_ppk(ppk) == true
//!     iff  ppk's algorithm sits strictly before the default
//!     and  this runtime supports the default
//! ```

use std::sync::Arc;

use crate::crypto::algorithm::{split_algorithm, KeyAlgorithm};
use crate::crypto::codec::{BlockChunking, PayloadCipher, PlaintextFraming, ProviderCipher};
use crate::crypto::ppk::PublicPrivateKeyPair;
use crate::crypto::provider::{KeyPairProvider, RsaLegacyProvider, RsaOaepProvider};
use crate::error::{Error, Result};

/// Per-runtime capability flags for one algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmCapability {
    /// The runtime has a working primitive for this algorithm.
    pub supported: bool,
    /// Usable for existing data but never for new key generation.
    pub deprecated: bool,
}

/// Provider lookup plus migration/default-algorithm policy.
pub struct KeyAlgorithmRegistry {
    legacy: Arc<RsaLegacyProvider>,
    oaep_2048: Arc<RsaOaepProvider>,
    oaep_4096: Arc<RsaOaepProvider>,
    supported: Vec<KeyAlgorithm>,
}

impl Default for KeyAlgorithmRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyAlgorithmRegistry {
    /// Registry with every algorithm this build supports.
    pub fn new() -> Self {
        Self::with_supported(&KeyAlgorithm::ALL)
    }

    /// Registry restricted to a subset of algorithms.
    ///
    /// Mirrors runtimes whose platform crypto lacks a generation; also what
    /// tests use to exercise the capability gates.
    pub fn with_supported(supported: &[KeyAlgorithm]) -> Self {
        Self {
            legacy: Arc::new(RsaLegacyProvider::new()),
            oaep_2048: Arc::new(RsaOaepProvider::v2048()),
            oaep_4096: Arc::new(RsaOaepProvider::v4096()),
            supported: supported.to_vec(),
        }
    }

    /// Capability flags for an algorithm in this runtime.
    pub fn capability(&self, algorithm: KeyAlgorithm) -> AlgorithmCapability {
        AlgorithmCapability {
            supported: self.supported.contains(&algorithm),
            deprecated: matches!(algorithm, KeyAlgorithm::RsaLegacy),
        }
    }

    /// Resolve the provider for an algorithm.
    ///
    /// Fails with [`Error::UnsupportedAlgorithm`] when the runtime lacks
    /// the primitive; capability checks let callers gate ahead of time.
    pub fn provider(&self, algorithm: KeyAlgorithm) -> Result<Arc<dyn KeyPairProvider>> {
        if !self.capability(algorithm).supported {
            return Err(Error::UnsupportedAlgorithm(algorithm.to_string()));
        }

        Ok(match algorithm {
            KeyAlgorithm::RsaLegacy => self.legacy.clone(),
            KeyAlgorithm::RsaOaep2048 => self.oaep_2048.clone(),
            KeyAlgorithm::RsaOaep4096 => self.oaep_4096.clone(),
        })
    }

    /// Full string-level cipher stack for an algorithm.
    ///
    /// Every algorithm gets the plaintext framing codec; fixed-block
    /// algorithms additionally get the chunking codec underneath it.
    pub fn text_cipher(&self, algorithm: KeyAlgorithm) -> Result<PlaintextFraming> {
        let provider = self.provider(algorithm)?;

        let inner: Box<dyn PayloadCipher> = if provider.requires_chunking() {
            Box::new(BlockChunking::new(provider))
        } else {
            Box::new(ProviderCipher::new(provider))
        };

        Ok(PlaintextFraming::new(inner))
    }

    /// Algorithm generations from oldest to most preferred.
    pub fn ppk_migrations(&self) -> [KeyAlgorithm; 3] {
        [
            KeyAlgorithm::RsaLegacy,
            KeyAlgorithm::RsaOaep2048,
            KeyAlgorithm::RsaOaep4096,
        ]
    }

    /// The algorithm new key pairs are generated with: the last entry of
    /// the migration ordering.
    pub fn default_algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::RsaOaep4096
    }

    /// Whether a key pair on `algorithm` should be regenerated.
    pub fn needs_migration(&self, algorithm: KeyAlgorithm) -> bool {
        let migrations = self.ppk_migrations();
        let default = self.default_algorithm();

        if !self.capability(default).supported {
            return false;
        }

        let position = |a: KeyAlgorithm| migrations.iter().position(|m| *m == a);
        match (position(algorithm), position(default)) {
            (Some(current), Some(preferred)) => current < preferred,
            _ => false,
        }
    }

    /// Whether an existing PPK should be regenerated on the default
    /// algorithm. True iff its algorithm appears strictly before the
    /// default in the migration ordering and this runtime supports the
    /// default.
    pub fn should_update_ppk(&self, ppk: &PublicPrivateKeyPair) -> Result<bool> {
        let (algorithm, _) = split_algorithm(&ppk.public_key)?;
        Ok(self.needs_migration(algorithm))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_last_migration_entry() {
        let registry = KeyAlgorithmRegistry::new();
        let migrations = registry.ppk_migrations();
        assert_eq!(registry.default_algorithm(), migrations[migrations.len() - 1]);
    }

    #[test]
    fn test_capability_flags() {
        let registry = KeyAlgorithmRegistry::new();

        let legacy = registry.capability(KeyAlgorithm::RsaLegacy);
        assert!(legacy.supported);
        assert!(legacy.deprecated);

        let current = registry.capability(KeyAlgorithm::RsaOaep4096);
        assert!(current.supported);
        assert!(!current.deprecated);
    }

    #[test]
    fn test_unsupported_algorithm_is_gated() {
        let registry = KeyAlgorithmRegistry::with_supported(&[KeyAlgorithm::RsaLegacy]);

        assert!(registry.provider(KeyAlgorithm::RsaLegacy).is_ok());
        assert!(matches!(
            registry.provider(KeyAlgorithm::RsaOaep4096),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_needs_migration_ordering() {
        let registry = KeyAlgorithmRegistry::new();

        assert!(registry.needs_migration(KeyAlgorithm::RsaLegacy));
        assert!(registry.needs_migration(KeyAlgorithm::RsaOaep2048));
        assert!(!registry.needs_migration(KeyAlgorithm::RsaOaep4096));
    }

    #[test]
    fn test_no_migration_when_default_unsupported() {
        // A runtime that still lacks the 4096-bit generation keeps older
        // key pairs as they are.
        let registry = KeyAlgorithmRegistry::with_supported(&[
            KeyAlgorithm::RsaLegacy,
            KeyAlgorithm::RsaOaep2048,
        ]);

        assert!(!registry.needs_migration(KeyAlgorithm::RsaLegacy));
        assert!(!registry.needs_migration(KeyAlgorithm::RsaOaep2048));
    }

    #[test]
    fn test_provider_algorithms_line_up() {
        let registry = KeyAlgorithmRegistry::new();
        for algorithm in KeyAlgorithm::ALL {
            assert_eq!(registry.provider(algorithm).unwrap().algorithm(), algorithm);
        }
    }
}
