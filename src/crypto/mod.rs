//! # Cryptography Module
//!
//! Everything key-shaped in Vellum Core: the closed algorithm set, one
//! provider per algorithm, the codec layers that make providers reversible
//! for real payloads, the PPK manager, and the master-key protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    KEY-MANAGEMENT ARCHITECTURE                          │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌───────────────────┐      ┌────────────────────────────────────┐     │
//! │  │ MasterKeyProtocol │      │ PpkManager                         │     │
//! │  │                   │─────►│                                    │     │
//! │  │ - generate        │      │ - generate / unlock / validate     │     │
//! │  │ - decrypt         │      │ - migration policy queries         │     │
//! │  │ - re-encrypt ×2   │      └──────────────┬─────────────────────┘     │
//! │  └─────────┬─────────┘                     │                           │
//! │            │                               ▼                           │
//! │            │               ┌────────────────────────────────────┐     │
//! │            │               │ KeyAlgorithmRegistry               │     │
//! │            │               │                                    │     │
//! │            └──────────────►│ algorithm ──► provider + codecs    │     │
//! │                            │ capability / migration policy      │     │
//! │                            └──────────────┬─────────────────────┘     │
//! │                                           │                           │
//! │                     ┌─────────────────────┼────────────────────┐      │
//! │                     ▼                     ▼                    ▼      │
//! │             ┌──────────────┐   ┌──────────────────┐   ┌─────────────┐ │
//! │             │ RsaLegacy    │   │ RsaOaep 2048     │   │ RsaOaep 4096│ │
//! │             │ (chunked)    │   │                  │   │ (default)   │ │
//! │             └──────────────┘   └──────────────────┘   └─────────────┘ │
//! │                                                                         │
//! │  symmetric: AES-256-GCM + PBKDF2/HKDF, used by the encryption          │
//! │  service to seal private keys and master-key content at rest.          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub(crate) mod algorithm;
pub(crate) mod codec;
pub(crate) mod master_key;
pub(crate) mod ppk;
pub(crate) mod provider;
pub(crate) mod registry;
pub(crate) mod symmetric;

pub use algorithm::{attach_algorithm, split_algorithm, KeyAlgorithm};
pub use codec::{BlockChunking, PayloadCipher, PlaintextFraming, ProviderCipher};
pub use master_key::{content_checksum, MasterKeyEntity, MasterKeyProtocol, PpkEncryptionHandler};
pub use ppk::{PpkManager, PrivateKeyData, PublicPrivateKeyPair};
pub use provider::{KeyPairProvider, RsaKeyPair, RsaLegacyProvider, RsaOaepProvider};
pub use registry::{AlgorithmCapability, KeyAlgorithmRegistry};
pub use symmetric::{EncryptionKey, Nonce, KEY_SIZE, NONCE_SIZE};

// ============================================================================
// TEST FIXTURES
// ============================================================================
