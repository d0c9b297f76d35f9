//! Cryptographic primitives for lumenchain
//!
//! Signing identities are ed25519: a 64-byte secret (seed plus derived
//! public half) and a 32-byte public key with a canonical base-58 encoding.

use crate::error::ChainError;
use bip39::Mnemonic;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Size of a public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;
/// Size of the full secret (seed plus public half) in bytes.
pub const SECRET_KEY_SIZE: usize = 64;
/// Size of a detached signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;
/// Mnemonic-derived seeds are truncated to this length before key derivation.
pub const SEED_SIZE: usize = 32;

/// A 32-byte ed25519 public key. Equality is byte-wise.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub fn new(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        PublicKey(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let arr: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            ChainError::CryptoError(format!(
                "Public key must be {} bytes, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(PublicKey(arr))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Decodes a base-58 string into a public key.
    pub fn from_base58(encoded: &str) -> Result<Self, ChainError> {
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| ChainError::CryptoError(format!("Invalid base58 public key: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Encodes the public key as a base-58 string.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base58())
    }
}

impl FromStr for PublicKey {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, ChainError> {
        Self::from_base58(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_base58(&s).map_err(serde::de::Error::custom)
    }
}

/// A 64-byte detached ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    pub fn new(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Signature(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let arr: [u8; SIGNATURE_SIZE] = bytes.try_into().map_err(|_| {
            ChainError::CryptoError(format!(
                "Signature must be {} bytes, got {}",
                SIGNATURE_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Signature(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    pub fn from_base58(encoded: &str) -> Result<Self, ChainError> {
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| ChainError::CryptoError(format!("Invalid base58 signature: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Signature({})", self.to_base58())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_base58(&s).map_err(serde::de::Error::custom)
    }
}

/// An ed25519 signing identity. The public key is always the one derived
/// from the secret half at construction; it is never set independently.
#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public_key = PublicKey::new(signing_key.verifying_key().to_bytes());
        KeyPair {
            signing_key,
            public_key,
        }
    }

    /// Creates a KeyPair from the 64-byte secret encoding (seed followed by
    /// the derived public half). Fails if the length is wrong or the public
    /// half does not match the seed.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let arr: [u8; SECRET_KEY_SIZE] = bytes.try_into().map_err(|_| {
            ChainError::CryptoError(format!(
                "Secret key must be {} bytes, got {}",
                SECRET_KEY_SIZE,
                bytes.len()
            ))
        })?;
        let signing_key = SigningKey::from_keypair_bytes(&arr)
            .map_err(|e| ChainError::CryptoError(format!("Invalid secret key bytes: {}", e)))?;
        let public_key = PublicKey::new(signing_key.verifying_key().to_bytes());
        Ok(KeyPair {
            signing_key,
            public_key,
        })
    }

    /// Derives a KeyPair from a BIP-39 mnemonic. The 64-byte BIP-39 seed is
    /// truncated to 32 bytes before key derivation, so the same phrase
    /// always yields the same keypair.
    pub fn from_seed_phrase(phrase: &str) -> Result<Self, ChainError> {
        let mnemonic = Mnemonic::parse(phrase)
            .map_err(|e| ChainError::CryptoError(format!("Invalid mnemonic: {}", e)))?;
        let seed = mnemonic.to_seed("");
        let mut truncated = [0u8; SEED_SIZE];
        truncated.copy_from_slice(&seed[..SEED_SIZE]);
        let signing_key = SigningKey::from_bytes(&truncated);
        let public_key = PublicKey::new(signing_key.verifying_key().to_bytes());
        Ok(KeyPair {
            signing_key,
            public_key,
        })
    }

    /// Generates a fresh 12-word mnemonic and the keypair derived from it.
    pub fn generate_with_seed_phrase() -> Result<(String, Self), ChainError> {
        let mut entropy = [0u8; 16];
        OsRng.fill_bytes(&mut entropy);
        let mnemonic = Mnemonic::from_entropy(&entropy)
            .map_err(|e| ChainError::CryptoError(format!("Failed to generate mnemonic: {}", e)))?;
        let phrase = mnemonic.to_string();
        let keypair = Self::from_seed_phrase(&phrase)?;
        Ok((phrase, keypair))
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Returns the 64-byte secret encoding (seed followed by public half).
    pub fn secret_bytes(&self) -> [u8; SECRET_KEY_SIZE] {
        self.signing_key.to_keypair_bytes()
    }

    /// Encodes both halves as base-58 strings (public, secret).
    pub fn to_base58(&self) -> (String, String) {
        (
            self.public_key.to_base58(),
            bs58::encode(self.secret_bytes()).into_string(),
        )
    }

    /// Decodes base-58 key material back into a KeyPair. The public string
    /// must match the key derived from the secret.
    pub fn from_base58(public: &str, secret: &str) -> Result<Self, ChainError> {
        let secret_bytes = bs58::decode(secret)
            .into_vec()
            .map_err(|e| ChainError::CryptoError(format!("Invalid base58 secret key: {}", e)))?;
        let keypair = Self::from_secret_bytes(&secret_bytes)?;
        let expected = PublicKey::from_base58(public)?;
        if keypair.public_key != expected {
            return Err(ChainError::CryptoError(
                "Public key does not match secret key".to_string(),
            ));
        }
        Ok(keypair)
    }

    /// Signs raw message bytes and returns the detached signature. The
    /// caller owns message canonicalization; the keypair does not interpret
    /// message structure.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::new(self.signing_key.sign(message).to_bytes())
    }
}

/// Verifies a detached signature. Total: any malformed input verifies as
/// false rather than erroring, so untrusted peer data cannot abort the
/// caller.
pub fn verify_signature(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    match VerifyingKey::from_bytes(public_key.as_bytes()) {
        Ok(vk) => {
            let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
            vk.verify_strict(message, &sig).is_ok()
        }
        Err(_) => false,
    }
}
