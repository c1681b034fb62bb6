//! # Framing & Chunking Codecs
//!
//! Two layers that sit between string-level callers and the raw providers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         CODEC STACK                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   caller (key material / PEM strings)                                  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   PlaintextFraming                                                     │
//! │     • "a1b2..." lowercase even-length hex → raw bytes + marker 1       │
//! │     • anything else → UTF-8 bytes + marker 0                           │
//! │     • decrypt reads the trailing marker to pick the decoding, so       │
//! │       callers never record the original encoding separately           │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   BlockChunking (legacy algorithm only)                                │
//! │     • splits plaintext into provider-sized chunks                      │
//! │     • ciphertext = N fixed-size RSA blocks, concatenated               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   KeyPairProvider (one RSA block)                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Chunk-by-chunk RSA is effectively ECB: equal chunks produce ciphertexts
//! with no cross-chunk diffusion. It survives here only because already-
//! stored legacy payloads are high-entropy key material encrypted exactly
//! this way. Never route a new payload kind through [`BlockChunking`].

use std::sync::Arc;

use zeroize::Zeroizing;

use crate::crypto::provider::{KeyPairProvider, RsaKeyPair};
use crate::error::{Error, Result};

/// Trailing marker for hex-decoded payloads.
const MARKER_HEX: u8 = 1;

/// Trailing marker for UTF-8 payloads.
const MARKER_UTF8: u8 = 0;

/// Chunk-count cap: the chunking codec accepts at most twice the wrapped
/// provider's per-block maximum.
const MAX_CHUNK_MULTIPLE: usize = 2;

/// A byte-level cipher layer.
///
/// Implemented by the provider adapter and by [`BlockChunking`], so the
/// framing codec can wrap either without caring which.
pub trait PayloadCipher: Send + Sync {
    /// Encrypt a payload with the public half of `key_pair`.
    fn encrypt(&self, plaintext: &[u8], key_pair: &RsaKeyPair) -> Result<Vec<u8>>;

    /// Decrypt a payload with the private half of `key_pair`.
    fn decrypt(&self, ciphertext: &[u8], key_pair: &RsaKeyPair) -> Result<Vec<u8>>;

    /// Largest payload `encrypt` accepts, in bytes.
    fn max_plaintext_len(&self, key_pair: &RsaKeyPair) -> usize;
}

/// Adapter presenting a bare provider as a [`PayloadCipher`].
pub struct ProviderCipher {
    provider: Arc<dyn KeyPairProvider>,
}

impl ProviderCipher {
    /// Wrap a provider.
    pub fn new(provider: Arc<dyn KeyPairProvider>) -> Self {
        Self { provider }
    }
}

impl PayloadCipher for ProviderCipher {
    fn encrypt(&self, plaintext: &[u8], key_pair: &RsaKeyPair) -> Result<Vec<u8>> {
        self.provider.encrypt(plaintext, key_pair)
    }

    fn decrypt(&self, ciphertext: &[u8], key_pair: &RsaKeyPair) -> Result<Vec<u8>> {
        self.provider.decrypt(ciphertext, key_pair)
    }

    fn max_plaintext_len(&self, key_pair: &RsaKeyPair) -> usize {
        self.provider.max_plaintext_len(key_pair)
    }
}

// ============================================================================
// BLOCK CHUNKING
// ============================================================================

/// Splits long plaintexts across fixed-size ciphertext blocks.
///
/// Only wraps providers whose ciphertext is a fixed-size block (the legacy
/// PKCS#1 v1.5 generation). Retained for interoperability with stored
/// payloads; see the module docs for why this never grows new uses.
pub struct BlockChunking {
    inner: Arc<dyn KeyPairProvider>,
}

impl BlockChunking {
    /// Wrap a fixed-block provider.
    pub fn new(inner: Arc<dyn KeyPairProvider>) -> Self {
        Self { inner }
    }

    fn block_len(&self, key_pair: &RsaKeyPair) -> Result<usize> {
        self.inner.ciphertext_block_len(key_pair).ok_or_else(|| {
            Error::MalformedCiphertext(format!(
                "algorithm {} has no fixed ciphertext block and cannot be chunked",
                self.inner.algorithm()
            ))
        })
    }
}

impl PayloadCipher for BlockChunking {
    fn encrypt(&self, plaintext: &[u8], key_pair: &RsaKeyPair) -> Result<Vec<u8>> {
        let max = self.max_plaintext_len(key_pair);
        if plaintext.len() > max {
            return Err(Error::DataTooLong {
                length: plaintext.len(),
                max,
            });
        }

        let chunk_len = self.inner.max_plaintext_len(key_pair);
        let chunk_count = plaintext.len().div_ceil(chunk_len.max(1));
        tracing::debug!(
            "Chunking {} plaintext bytes into {} {}-byte ciphertext blocks",
            plaintext.len(),
            chunk_count,
            self.block_len(key_pair)?
        );

        let mut ciphertext = Vec::with_capacity(chunk_count * self.block_len(key_pair)?);
        for chunk in plaintext.chunks(chunk_len) {
            ciphertext.extend_from_slice(&self.inner.encrypt(chunk, key_pair)?);
        }
        Ok(ciphertext)
    }

    fn decrypt(&self, ciphertext: &[u8], key_pair: &RsaKeyPair) -> Result<Vec<u8>> {
        let block_len = self.block_len(key_pair)?;
        if ciphertext.len() % block_len != 0 {
            return Err(Error::MalformedCiphertext(format!(
                "chunked ciphertext of {} bytes is not a multiple of the {}-byte block size",
                ciphertext.len(),
                block_len
            )));
        }

        let mut plaintext = Vec::new();
        for block in ciphertext.chunks(block_len) {
            plaintext.extend_from_slice(&self.inner.decrypt(block, key_pair)?);
        }
        Ok(plaintext)
    }

    fn max_plaintext_len(&self, key_pair: &RsaKeyPair) -> usize {
        self.inner.max_plaintext_len(key_pair) * MAX_CHUNK_MULTIPLE
    }
}

// ============================================================================
// PLAINTEXT FRAMING
// ============================================================================

/// Makes a byte cipher reversible for both hex and text payloads.
///
/// One metadata byte is appended to the plaintext before encryption: `1`
/// when the input was lowercase even-length hex (raw key material travels
/// as half the bytes), `0` when it was arbitrary UTF-8. Decryption strips
/// the marker and restores the original string exactly.
pub struct PlaintextFraming {
    inner: Box<dyn PayloadCipher>,
}

impl PlaintextFraming {
    /// Wrap a byte cipher.
    pub fn new(inner: Box<dyn PayloadCipher>) -> Self {
        Self { inner }
    }

    /// Encrypt a string payload.
    pub fn encrypt_text(&self, plaintext: &str, key_pair: &RsaKeyPair) -> Result<Vec<u8>> {
        let is_hex = is_hex_payload(plaintext);
        let mut payload = Zeroizing::new(if is_hex {
            hex::decode(plaintext)
                .map_err(|e| Error::EncryptionFailed(format!("hex payload: {}", e)))?
        } else {
            plaintext.as_bytes().to_vec()
        });
        payload.push(if is_hex { MARKER_HEX } else { MARKER_UTF8 });

        let max = self.inner.max_plaintext_len(key_pair);
        if payload.len() > max {
            return Err(Error::DataTooLong {
                length: payload.len() - 1,
                max: self.max_plaintext_len(key_pair),
            });
        }

        self.inner.encrypt(&payload, key_pair)
    }

    /// Decrypt a payload produced by [`Self::encrypt_text`].
    pub fn decrypt_text(&self, ciphertext: &[u8], key_pair: &RsaKeyPair) -> Result<String> {
        let mut payload = Zeroizing::new(self.inner.decrypt(ciphertext, key_pair)?);

        let marker = payload.pop().ok_or_else(|| {
            Error::MalformedCiphertext("decrypted payload is missing its encoding marker".into())
        })?;

        match marker {
            MARKER_HEX => Ok(hex::encode(payload.as_slice())),
            MARKER_UTF8 => std::str::from_utf8(&payload).map(str::to_owned).map_err(|_| {
                Error::MalformedCiphertext("UTF-8 payload did not decode as UTF-8".into())
            }),
            other => Err(Error::MalformedCiphertext(format!(
                "unknown encoding marker byte {}",
                other
            ))),
        }
    }

    /// Largest payload `encrypt_text` accepts, in bytes of converted
    /// plaintext: the wrapped maximum less one marker byte.
    pub fn max_plaintext_len(&self, key_pair: &RsaKeyPair) -> usize {
        self.inner.max_plaintext_len(key_pair) - 1
    }
}

/// Raw key material is written as lowercase even-length hex; that shape
/// gets hex-decoded before encryption so it travels as half the bytes.
fn is_hex_payload(s: &str) -> bool {
    !s.is_empty()
        && s.len() % 2 == 0
        && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

// ============================================================================
// TESTS
// ============================================================================
