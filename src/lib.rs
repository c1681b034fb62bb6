//! # Vellum Core
//!
//! The end-to-end-encryption key-management core of Vellum, a personal
//! note-taking app with multi-device synchronization.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        VELLUM CORE MODULES                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────────┐     ┌──────────────────────────────────┐ │
//! │  │  Sync                    │     │  Crypto                          │ │
//! │  │                          │     │                                  │ │
//! │  │ - SyncInfo record        │     │ - Algorithm registry             │ │
//! │  │ - Deterministic merge    │◄────│ - RSA providers + codecs         │ │
//! │  │ - App version gate       │     │ - PPK manager                    │ │
//! │  │                          │     │ - Master-key protocol            │ │
//! │  └────────────┬─────────────┘     └───────────────┬──────────────────┘ │
//! │               │                                   │                    │
//! │               ▼                                   ▼                    │
//! │  ┌──────────────────────────┐     ┌──────────────────────────────────┐ │
//! │  │  Storage                 │     │  Encryption Service              │ │
//! │  │                          │     │                                  │ │
//! │  │ - Local SyncInfo cache   │     │ - AES-256-GCM at rest            │ │
//! │  │ - Corrupt-doc recovery   │     │ - PBKDF2 / HKDF derivation       │ │
//! │  └──────────────────────────┘     └──────────────────────────────────┘ │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## How Devices Converge
//!
//! Every device keeps a local [`sync::SyncInfo`] — the account's encryption
//! configuration — and reconciles it with the shared remote copy through
//! [`sync::merge_sync_infos`], a pure last-write-wins merge with a
//! dedicated heuristic for the active master key. There are no distributed
//! locks; conflicts are resolved by the merge alone.
//!
//! ## How Keys Protect Each Other
//!
//! ```text
//! user password ──► PBKDF2 ──► seals the PPK private key
//! PPK public key ──► wraps master keys (generation, sharing)
//! master key ──► HKDF ──► seals note content
//! ```
//!
//! The [`crypto::MasterKeyProtocol`] re-encryption transforms move a master
//! key between password-sealed and PPK-wrapped forms without the plaintext
//! ever leaving the process — that is the mechanism behind sharing an
//! encrypted notebook with another user.
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Algorithms, providers, codecs, PPK and master-key layers
//! - [`service`] - The symmetric EncryptionService seam + default impl
//! - [`sync`] - SyncInfo record, merge engine, version gate
//! - [`storage`] - Local persistence with corrupt-document recovery
//! - [`time`] - The single clock source for updatedTime stamps

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod crypto;
pub mod error;
pub mod service;
pub mod storage;
pub mod sync;
/// Time utilities; the single source of every `updatedTime` stamp.
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use crypto::{
    KeyAlgorithm, KeyAlgorithmRegistry, MasterKeyEntity, MasterKeyProtocol, PpkManager,
    PublicPrivateKeyPair,
};
pub use error::{Error, Result};
pub use service::{DefaultEncryptionService, EncryptionMethod, EncryptionService, MasterKeyOptions};
pub use storage::SyncInfoStore;
pub use sync::{check_if_can_sync, merge_sync_infos, SyncInfo};
