//! # Error Handling
//!
//! This module provides the error types for Vellum Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Key & Password Errors                                             │
//! │  │   ├── InvalidPassword       - Wrong password for a private key      │
//! │  │   ├── WrongKey              - Ciphertext bound to a different PPK   │
//! │  │   ├── MissingPrivateKey     - Decrypt without a private key loaded  │
//! │  │   └── InvalidKey            - Key material fails to parse           │
//! │  │                                                                      │
//! │  ├── Algorithm & Codec Errors                                          │
//! │  │   ├── UnsupportedAlgorithm  - Runtime lacks the needed primitive    │
//! │  │   ├── UnknownAlgorithm      - Unrecognized public-key prefix        │
//! │  │   ├── DataTooLong           - Plaintext exceeds the algorithm max   │
//! │  │   └── MalformedCiphertext   - Ciphertext violates the codec layout  │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── EncryptionFailed      - Encryption operation failed           │
//! │  │   └── DecryptionFailed      - Decryption operation failed           │
//! │  │                                                                      │
//! │  ├── Sync Errors                                                       │
//! │  │   ├── MustUpgradeApp        - App older than the account minimum    │
//! │  │   └── CorruptConfig         - Unparseable SyncInfo document         │
//! │  │                                                                      │
//! │  └── Storage / Internal Errors                                         │
//! │      ├── StorageReadError      - Failed to read persisted state        │
//! │      ├── StorageWriteError     - Failed to write persisted state       │
//! │      └── SerializationError    - JSON (de)serialization failed         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Recovery Rules
//!
//! | Error | Recovery |
//! |-------|----------|
//! | `InvalidPassword` | Returned as `false` by validation paths, raised elsewhere |
//! | `WrongKey` | Always fatal; never retried with a different key |
//! | `CorruptConfig` | Recovered locally by falling back to defaults (logged) |
//! | `MustUpgradeApp` | User-visible; non-retryable until the app is upgraded |
//! | everything else | Fatal for the operation that raised it |

use thiserror::Error;

/// Result type alias for Vellum Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Vellum Core
///
/// All errors are categorized by module/domain to make error handling
/// clearer and to provide meaningful error messages to users.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Key & Password Errors
    // ========================================================================

    /// The supplied password does not unlock the private key
    #[error("Invalid password: the private key could not be decrypted.")]
    InvalidPassword,

    /// The ciphertext was encrypted for a different key pair
    #[error("Wrong key pair: ciphertext was encrypted for key '{expected}', not '{actual}'.")]
    WrongKey {
        /// The key id embedded in the ciphertext
        expected: String,
        /// The key id that was supplied for decryption
        actual: String,
    },

    /// Decryption was attempted on a key pair with no private half loaded
    #[error("No private key loaded for this key pair.")]
    MissingPrivateKey,

    /// Key material failed to parse or had an unexpected size
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    // ========================================================================
    // Algorithm & Codec Errors
    // ========================================================================

    /// The current runtime does not support the requested algorithm
    #[error("Unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A public-key string carried a prefix naming no known algorithm
    #[error("Unknown key algorithm prefix: '{0}'")]
    UnknownAlgorithm(String),

    /// Plaintext exceeds the maximum the algorithm/codec can encrypt
    #[error("Data too long: {length} bytes exceeds the maximum of {max} bytes.")]
    DataTooLong {
        /// Length of the rejected plaintext
        length: usize,
        /// Maximum plaintext length for this cipher
        max: usize,
    },

    /// Ciphertext does not match the layout the codec produced
    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    // ========================================================================
    // Crypto Errors
    // ========================================================================

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    // ========================================================================
    // Sync Errors
    // ========================================================================

    /// The running app is older than the account-wide minimum version
    #[error("This app version is too old to sync: version {required} or newer is required.")]
    MustUpgradeApp {
        /// Minimum app version recorded in the account's SyncInfo
        required: String,
    },

    /// The SyncInfo document could not be parsed
    #[error("Corrupt sync configuration: {0}")]
    CorruptConfig(String),

    // ========================================================================
    // Storage / Internal Errors
    // ========================================================================

    /// Failed to read from storage
    #[error("Failed to read from storage: {0}")]
    StorageReadError(String),

    /// Failed to write to storage
    #[error("Failed to write to storage: {0}")]
    StorageWriteError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Check whether this error means "wrong password"
    ///
    /// Password verification is the only expected non-exceptional failure
    /// mode in this crate; validation paths turn it into a boolean instead
    /// of propagating it.
    pub fn is_wrong_password(&self) -> bool {
        matches!(self, Error::InvalidPassword)
    }

    /// Check if this error is recovered locally rather than surfaced
    ///
    /// A corrupt configuration document falls back to defaults; everything
    /// else is fatal for the operation that raised it.
    pub fn is_recovered_locally(&self) -> bool {
        matches!(self, Error::CorruptConfig(_))
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageReadError(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
