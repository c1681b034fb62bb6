//! # Key Algorithm Identifiers
//!
//! The closed set of asymmetric algorithms a PPK can use, and the
//! public-key string encoding that carries the algorithm across devices.
//!
//! ## Public Key Encoding
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     PUBLIC KEY STRING FORMAT                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Modern:   "rsa-oaep-4096;-----BEGIN PUBLIC KEY-----\n..."             │
//! │                   │                                                     │
//! │                   └── algorithm tag, split on the first ';'            │
//! │                                                                         │
//! │  Legacy:   "-----BEGIN RSA PUBLIC KEY-----\n..."                       │
//! │                                                                         │
//! │  No prefix means RsaLegacy: pre-migration peers only ever produced     │
//! │  bare key strings, and they must keep parsing ours.                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An unrecognized prefix is a distinct [`Error::UnknownAlgorithm`], never a
//! silent fallback to the legacy algorithm.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Asymmetric algorithm generations, oldest first.
///
/// The set is closed: every provider lookup is an exhaustive match on this
/// enum, so adding a generation is a compile-time checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// RSA 2048 with PKCS#1 v1.5 padding.
    ///
    /// Interoperable with historical stored/shared data. Fixed-size block
    /// encryption only; longer inputs go through the block-chunking codec.
    #[serde(rename = "rsa-legacy")]
    RsaLegacy,

    /// RSA 2048 with OAEP-SHA256 padding.
    #[serde(rename = "rsa-oaep-2048")]
    RsaOaep2048,

    /// RSA 4096 with OAEP-SHA256 padding. Default for new key pairs.
    #[serde(rename = "rsa-oaep-4096")]
    RsaOaep4096,
}

impl KeyAlgorithm {
    /// Every algorithm, oldest generation first.
    pub const ALL: [KeyAlgorithm; 3] = [
        KeyAlgorithm::RsaLegacy,
        KeyAlgorithm::RsaOaep2048,
        KeyAlgorithm::RsaOaep4096,
    ];

    /// The wire tag used as a public-key prefix and in envelopes.
    pub fn as_tag(&self) -> &'static str {
        match self {
            KeyAlgorithm::RsaLegacy => "rsa-legacy",
            KeyAlgorithm::RsaOaep2048 => "rsa-oaep-2048",
            KeyAlgorithm::RsaOaep4096 => "rsa-oaep-4096",
        }
    }

    /// Parse a wire tag back into an algorithm.
    pub fn from_tag(tag: &str) -> Option<Self> {
        KeyAlgorithm::ALL.into_iter().find(|a| a.as_tag() == tag)
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Prefix a public-key string with its algorithm tag.
///
/// The legacy algorithm stays unprefixed so pre-migration peers keep
/// parsing keys we publish.
pub fn attach_algorithm(public_key: &str, algorithm: KeyAlgorithm) -> String {
    match algorithm {
        KeyAlgorithm::RsaLegacy => public_key.to_string(),
        other => format!("{};{}", other.as_tag(), public_key),
    }
}

/// Exact inverse of [`attach_algorithm`].
///
/// Returns the algorithm and the bare public-key string. A string with no
/// tag prefix is the legacy algorithm; a prefix naming no known algorithm
/// is [`Error::UnknownAlgorithm`].
pub fn split_algorithm(tagged: &str) -> Result<(KeyAlgorithm, &str)> {
    // PEM bodies never contain ';', so the first one (if any) ends the tag.
    match tagged.split_once(';') {
        Some((tag, public_key)) => match KeyAlgorithm::from_tag(tag) {
            Some(algorithm) => Ok((algorithm, public_key)),
            None => Err(Error::UnknownAlgorithm(tag.to_string())),
        },
        None => Ok((KeyAlgorithm::RsaLegacy, tagged)),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_split_round_trip_non_legacy() {
        let pem = "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n";

        for algorithm in [KeyAlgorithm::RsaOaep2048, KeyAlgorithm::RsaOaep4096] {
            let tagged = attach_algorithm(pem, algorithm);
            assert!(tagged.starts_with(algorithm.as_tag()));

            let (parsed, bare) = split_algorithm(&tagged).unwrap();
            assert_eq!(parsed, algorithm);
            assert_eq!(bare, pem);
        }
    }

    #[test]
    fn test_legacy_attaches_no_prefix() {
        let pem = "-----BEGIN RSA PUBLIC KEY-----\nAAAA\n-----END RSA PUBLIC KEY-----\n";
        assert_eq!(attach_algorithm(pem, KeyAlgorithm::RsaLegacy), pem);
    }

    #[test]
    fn test_bare_string_defaults_to_legacy() {
        let (algorithm, bare) = split_algorithm("-----BEGIN RSA PUBLIC KEY-----").unwrap();
        assert_eq!(algorithm, KeyAlgorithm::RsaLegacy);
        assert_eq!(bare, "-----BEGIN RSA PUBLIC KEY-----");
    }

    #[test]
    fn test_unknown_prefix_is_an_error() {
        let result = split_algorithm("rsa-oaep-8192;-----BEGIN PUBLIC KEY-----");
        match result {
            Err(Error::UnknownAlgorithm(tag)) => assert_eq!(tag, "rsa-oaep-8192"),
            other => panic!("expected UnknownAlgorithm, got {:?}", other),
        }
    }

    #[test]
    fn test_tag_round_trip() {
        for algorithm in KeyAlgorithm::ALL {
            assert_eq!(KeyAlgorithm::from_tag(algorithm.as_tag()), Some(algorithm));
        }
        assert_eq!(KeyAlgorithm::from_tag("rsa-v9"), None);
    }

    #[test]
    fn test_serde_uses_wire_tags() {
        let json = serde_json::to_string(&KeyAlgorithm::RsaOaep4096).unwrap();
        assert_eq!(json, "\"rsa-oaep-4096\"");

        let parsed: KeyAlgorithm = serde_json::from_str("\"rsa-legacy\"").unwrap();
        assert_eq!(parsed, KeyAlgorithm::RsaLegacy);
    }
}
