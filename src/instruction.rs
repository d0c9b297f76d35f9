//! Instructions: opaque, addressed units of intent carried by transactions.

use crate::crypto::PublicKey;
use serde::{Deserialize, Serialize};

/// An account referenced by an instruction, with signer/writable flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: PublicKey,
    #[serde(default)]
    pub is_signer: bool,
    #[serde(default)]
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: PublicKey, is_signer: bool) -> Self {
        AccountMeta {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(pubkey: PublicKey, is_signer: bool) -> Self {
        AccountMeta {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// A single instruction: target program, involved accounts, opaque payload.
/// The payload is never interpreted by the ledger core.
///
/// Construction validates nothing; callers must check [`Instruction::is_valid`]
/// before relying on an instruction sourced from outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: String,
    pub keys: Vec<AccountMeta>,
    #[serde(with = "serde_bytes_b58")]
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn new(program_id: impl Into<String>, keys: Vec<AccountMeta>, data: Vec<u8>) -> Self {
        Instruction {
            program_id: program_id.into(),
            keys,
            data,
        }
    }

    /// Structural well-formedness: at least one account key and a non-empty
    /// program id. The payload may be zero-length.
    pub fn is_valid(&self) -> bool {
        !self.keys.is_empty() && !self.program_id.is_empty()
    }

    /// Low-level byte form: encoded keys, program id bytes, payload bytes,
    /// concatenated in that fixed order. Used for raw transmission only;
    /// transaction signing uses the structural form instead.
    pub fn serialize_to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for meta in &self.keys {
            out.extend_from_slice(meta.pubkey.as_bytes());
            out.push(meta.is_signer as u8);
            out.push(meta.is_writable as u8);
        }
        out.extend_from_slice(self.program_id.as_bytes());
        out.extend_from_slice(&self.data);
        out
    }
}

/// Serializes instruction payloads as base-58 strings in human-readable
/// formats (JSON wire/storage) and as raw bytes in binary ones, so binary
/// payloads never pass through a text encoding implicitly.
mod serde_bytes_b58 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&bs58::encode(data).into_string())
        } else {
            serializer.serialize_bytes(data)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            bs58::decode(&s).into_vec().map_err(serde::de::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}
