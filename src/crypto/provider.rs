//! # Key-Pair Providers
//!
//! One provider per supported asymmetric algorithm. A provider owns the
//! primitive-level contract: generate, load, encrypt one block, decrypt one
//! block, export. Everything string- or size-flexible (hex/UTF-8 framing,
//! chunking of long inputs) is layered on top by the codecs.
//!
//! ## Provider Contracts
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PROVIDER CONTRACTS                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  encrypt(plaintext, key_pair)                                          │
//! │    • plaintext longer than max_plaintext_len → DataTooLong             │
//! │    • needs only the public half                                        │
//! │                                                                         │
//! │  decrypt(ciphertext, key_pair)                                         │
//! │    • no private half loaded → MissingPrivateKey                        │
//! │                                                                         │
//! │  RsaLegacyProvider (PKCS#1 v1.5, 2048)                                 │
//! │    • max plaintext  = modulus − 11 bytes                               │
//! │    • ciphertext     = exactly one modulus-sized block                  │
//! │    • exports PKCS#1 PEM ("RSA PUBLIC KEY"), like the historical stack  │
//! │                                                                         │
//! │  RsaOaepProvider (OAEP-SHA256, 2048 / 4096)                            │
//! │    • max plaintext  = modulus − 66 bytes                               │
//! │    • exports SPKI / PKCS#8 PEM ("PUBLIC KEY")                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::algorithm::KeyAlgorithm;
use crate::error::{Error, Result};

/// PKCS#1 v1.5 padding overhead in bytes.
const PKCS1V15_OVERHEAD: usize = 11;

/// OAEP overhead with a SHA-256 digest: 2 * 32 + 2 bytes.
const OAEP_SHA256_OVERHEAD: usize = 66;

/// An RSA key pair, possibly public-only.
///
/// The private half is absent when the pair was loaded from a shared public
/// key (e.g. to encrypt a master key for a recipient). `RsaPrivateKey`
/// zeroizes its own material on drop.
#[derive(Clone)]
pub struct RsaKeyPair {
    public: RsaPublicKey,
    private: Option<RsaPrivateKey>,
    size_bits: usize,
}

impl RsaKeyPair {
    /// Modulus size in bits.
    pub fn size_bits(&self) -> usize {
        self.size_bits
    }

    /// Modulus size in bytes; also the ciphertext size of one RSA block.
    pub fn size_bytes(&self) -> usize {
        self.public.size()
    }

    /// Whether the private half is loaded.
    pub fn has_private_key(&self) -> bool {
        self.private.is_some()
    }

    fn private(&self) -> Result<&RsaPrivateKey> {
        self.private.as_ref().ok_or(Error::MissingPrivateKey)
    }
}

/// Contract every asymmetric algorithm implementation satisfies.
///
/// Implementations are stateless; key material always travels through the
/// [`RsaKeyPair`] argument, so one provider instance serves any number of
/// key pairs concurrently.
pub trait KeyPairProvider: Send + Sync {
    /// The algorithm this provider implements.
    fn algorithm(&self) -> KeyAlgorithm;

    /// Modulus size for newly generated key pairs, in bits.
    fn modulus_bits(&self) -> usize;

    /// Generate a fresh key pair.
    ///
    /// CPU-bound: seconds for larger moduli. Callers run it off any
    /// interactive thread.
    fn generate_key_pair(&self) -> Result<RsaKeyPair>;

    /// Load a key pair from exported strings.
    ///
    /// `private_key` may be absent for public-only pairs. The declared
    /// `key_size_bits` must match the actual modulus.
    fn load_key_pair(
        &self,
        public_key: &str,
        private_key: Option<&str>,
        key_size_bits: usize,
    ) -> Result<RsaKeyPair>;

    /// Encrypt one block of plaintext with the public half.
    fn encrypt(&self, plaintext: &[u8], key_pair: &RsaKeyPair) -> Result<Vec<u8>>;

    /// Decrypt one block of ciphertext with the private half.
    fn decrypt(&self, ciphertext: &[u8], key_pair: &RsaKeyPair) -> Result<Vec<u8>>;

    /// Export the public half as a PEM string.
    fn export_public_key(&self, key_pair: &RsaKeyPair) -> Result<String>;

    /// Export the private half as a PKCS#8 PEM string.
    ///
    /// The returned buffer zeroizes on drop; callers encrypt it before it
    /// touches storage.
    fn export_private_key(&self, key_pair: &RsaKeyPair) -> Result<Zeroizing<String>>;

    /// Largest plaintext `encrypt` accepts for this key pair, in bytes.
    fn max_plaintext_len(&self, key_pair: &RsaKeyPair) -> usize;

    /// `Some(n)` when every ciphertext is exactly `n` bytes.
    ///
    /// Fixed-block algorithms need the chunking codec for longer inputs;
    /// `None` means ciphertext length already covers realistic payloads.
    fn ciphertext_block_len(&self, key_pair: &RsaKeyPair) -> Option<usize>;

    /// Whether the registry must wrap this provider in the chunking codec.
    fn requires_chunking(&self) -> bool {
        false
    }
}

fn generate(bits: usize) -> Result<RsaKeyPair> {
    let private = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| Error::EncryptionFailed(format!("RSA key generation failed: {}", e)))?;
    let public = RsaPublicKey::from(&private);

    Ok(RsaKeyPair {
        size_bits: public.size() * 8,
        public,
        private: Some(private),
    })
}

fn load(
    public_pem: &str,
    private_pem: Option<&str>,
    key_size_bits: usize,
) -> Result<RsaKeyPair> {
    // Accept both export forms: PKCS#1 ("RSA PUBLIC KEY") from the legacy
    // generation and SPKI ("PUBLIC KEY") from the OAEP generations.
    let public = RsaPublicKey::from_public_key_pem(public_pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(public_pem))
        .map_err(|e| Error::InvalidKey(format!("Invalid public key PEM: {}", e)))?;

    let private = match private_pem {
        Some(pem) => Some(
            RsaPrivateKey::from_pkcs8_pem(pem)
                .map_err(|e| Error::InvalidKey(format!("Invalid private key PEM: {}", e)))?,
        ),
        None => None,
    };

    let actual_bits = public.size() * 8;
    if actual_bits != key_size_bits {
        return Err(Error::InvalidKey(format!(
            "Declared key size {} bits does not match modulus of {} bits",
            key_size_bits, actual_bits
        )));
    }

    if let Some(ref private) = private {
        if RsaPublicKey::from(private) != public {
            return Err(Error::InvalidKey(
                "Public and private halves belong to different key pairs".into(),
            ));
        }
    }

    Ok(RsaKeyPair {
        public,
        private,
        size_bits: key_size_bits,
    })
}

fn check_plaintext_len(plaintext: &[u8], max: usize) -> Result<()> {
    if plaintext.len() > max {
        return Err(Error::DataTooLong {
            length: plaintext.len(),
            max,
        });
    }
    Ok(())
}

// ============================================================================
// LEGACY PROVIDER (PKCS#1 v1.5)
// ============================================================================

/// RSA PKCS#1 v1.5 at 2048 bits.
///
/// Kept for interoperability with historical stored and shared data. New
/// key pairs come from the OAEP providers; the registry flags this one as
/// deprecated.
#[derive(Debug, Default)]
pub struct RsaLegacyProvider;

impl RsaLegacyProvider {
    /// Create the legacy provider.
    pub fn new() -> Self {
        Self
    }
}

impl KeyPairProvider for RsaLegacyProvider {
    fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::RsaLegacy
    }

    fn modulus_bits(&self) -> usize {
        2048
    }

    fn generate_key_pair(&self) -> Result<RsaKeyPair> {
        generate(self.modulus_bits())
    }

    fn load_key_pair(
        &self,
        public_key: &str,
        private_key: Option<&str>,
        key_size_bits: usize,
    ) -> Result<RsaKeyPair> {
        load(public_key, private_key, key_size_bits)
    }

    fn encrypt(&self, plaintext: &[u8], key_pair: &RsaKeyPair) -> Result<Vec<u8>> {
        check_plaintext_len(plaintext, self.max_plaintext_len(key_pair))?;

        key_pair
            .public
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| Error::EncryptionFailed(format!("RSA PKCS#1 v1.5 encrypt: {}", e)))
    }

    fn decrypt(&self, ciphertext: &[u8], key_pair: &RsaKeyPair) -> Result<Vec<u8>> {
        key_pair
            .private()?
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| Error::DecryptionFailed(format!("RSA PKCS#1 v1.5 decrypt: {}", e)))
    }

    fn export_public_key(&self, key_pair: &RsaKeyPair) -> Result<String> {
        key_pair
            .public
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| Error::InvalidKey(format!("PKCS#1 export failed: {}", e)))
    }

    fn export_private_key(&self, key_pair: &RsaKeyPair) -> Result<Zeroizing<String>> {
        key_pair
            .private()?
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::InvalidKey(format!("PKCS#8 export failed: {}", e)))
    }

    fn max_plaintext_len(&self, key_pair: &RsaKeyPair) -> usize {
        key_pair.size_bytes() - PKCS1V15_OVERHEAD
    }

    fn ciphertext_block_len(&self, key_pair: &RsaKeyPair) -> Option<usize> {
        Some(key_pair.size_bytes())
    }

    fn requires_chunking(&self) -> bool {
        true
    }
}

// ============================================================================
// OAEP PROVIDERS
// ============================================================================

/// RSA OAEP-SHA256 at a configurable modulus size.
///
/// OAEP's usable payload (modulus − 66 bytes) already covers realistic key
/// material, so these generations never chunk.
#[derive(Debug)]
pub struct RsaOaepProvider {
    algorithm: KeyAlgorithm,
    modulus_bits: usize,
}

impl RsaOaepProvider {
    /// The 2048-bit OAEP generation.
    pub fn v2048() -> Self {
        Self {
            algorithm: KeyAlgorithm::RsaOaep2048,
            modulus_bits: 2048,
        }
    }

    /// The 4096-bit OAEP generation, default for new key pairs.
    pub fn v4096() -> Self {
        Self {
            algorithm: KeyAlgorithm::RsaOaep4096,
            modulus_bits: 4096,
        }
    }
}

impl KeyPairProvider for RsaOaepProvider {
    fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }

    fn generate_key_pair(&self) -> Result<RsaKeyPair> {
        generate(self.modulus_bits)
    }

    fn load_key_pair(
        &self,
        public_key: &str,
        private_key: Option<&str>,
        key_size_bits: usize,
    ) -> Result<RsaKeyPair> {
        load(public_key, private_key, key_size_bits)
    }

    fn encrypt(&self, plaintext: &[u8], key_pair: &RsaKeyPair) -> Result<Vec<u8>> {
        check_plaintext_len(plaintext, self.max_plaintext_len(key_pair))?;

        key_pair
            .public
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| Error::EncryptionFailed(format!("RSA-OAEP encrypt: {}", e)))
    }

    fn decrypt(&self, ciphertext: &[u8], key_pair: &RsaKeyPair) -> Result<Vec<u8>> {
        key_pair
            .private()?
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(|e| Error::DecryptionFailed(format!("RSA-OAEP decrypt: {}", e)))
    }

    fn export_public_key(&self, key_pair: &RsaKeyPair) -> Result<String> {
        key_pair
            .public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::InvalidKey(format!("SPKI export failed: {}", e)))
    }

    fn export_private_key(&self, key_pair: &RsaKeyPair) -> Result<Zeroizing<String>> {
        key_pair
            .private()?
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::InvalidKey(format!("PKCS#8 export failed: {}", e)))
    }

    fn max_plaintext_len(&self, key_pair: &RsaKeyPair) -> usize {
        key_pair.size_bytes() - OAEP_SHA256_OVERHEAD
    }

    fn ciphertext_block_len(&self, _key_pair: &RsaKeyPair) -> Option<usize> {
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================
