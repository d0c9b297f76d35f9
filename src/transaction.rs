//! Transactions: ordered instructions plus authorizing signatures and
//! anti-replay metadata.

use crate::config::FeeConfig;
use crate::crypto::{verify_signature, KeyPair, PublicKey, Signature};
use crate::error::ChainError;
use crate::instruction::Instruction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One authorizing signature and the key it was made with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub public_key: PublicKey,
    pub signature: Signature,
}

/// A transaction under incremental construction: metadata is populated,
/// instructions appended, then the whole thing signed. Signing covers the
/// canonical message, which excludes the signatures themselves.
///
/// The canonical message is recomputed from current state on every use, so
/// any mutation after signing invalidates the collected signatures until the
/// transaction is re-signed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub fee_payer: Option<PublicKey>,
    pub recent_blockhash: Option<String>,
    pub last_valid_block_height: Option<u64>,
    pub instructions: Vec<Instruction>,
    pub signatures: Vec<SignatureEntry>,
}

/// Borrowed view of the signable content. Field order here defines the
/// canonical message layout; do not reorder.
#[derive(Serialize)]
struct SignableMessage<'a> {
    fee_payer: &'a Option<PublicKey>,
    recent_blockhash: &'a Option<String>,
    instructions: &'a [Instruction],
}

impl Transaction {
    pub fn new() -> Self {
        Transaction::default()
    }

    /// Sets the transaction metadata. Idempotent; later calls overwrite
    /// earlier values.
    pub fn populate(
        &mut self,
        fee_payer: PublicKey,
        recent_blockhash: String,
        last_valid_block_height: Option<u64>,
    ) {
        self.fee_payer = Some(fee_payer);
        self.recent_blockhash = Some(recent_blockhash);
        self.last_valid_block_height = last_valid_block_height;
    }

    /// Appends an instruction. Defensive: the instruction is re-validated
    /// here because transactions are assembled from externally-sourced data
    /// on the RPC path. On failure the instruction list is unchanged.
    pub fn add(&mut self, instruction: Instruction) -> Result<(), ChainError> {
        if !instruction.is_valid() {
            return Err(ChainError::InvalidInstruction(
                "Instruction must have a program id and at least one account key".to_string(),
            ));
        }
        self.instructions.push(instruction);
        Ok(())
    }

    /// The canonical signing message: an order-preserving serialization of
    /// {fee_payer, recent_blockhash, instructions}. Signatures are excluded
    /// to avoid circularity.
    pub fn message_bytes(&self) -> Result<Vec<u8>, ChainError> {
        let message = SignableMessage {
            fee_payer: &self.fee_payer,
            recent_blockhash: &self.recent_blockhash,
            instructions: &self.instructions,
        };
        Ok(bincode::serialize(&message)?)
    }

    /// Signs with every supplied keypair, replacing any existing signatures.
    /// Signature order follows keypair order.
    pub fn sign(&mut self, keypairs: &[&KeyPair]) -> Result<(), ChainError> {
        let message = self.message_bytes()?;
        self.signatures = keypairs
            .iter()
            .map(|keypair| SignatureEntry {
                public_key: keypair.public_key(),
                signature: keypair.sign(&message),
            })
            .collect();
        Ok(())
    }

    /// Appends a single signature without disturbing the existing ones, for
    /// progressive multisig collection.
    pub fn partial_sign(&mut self, keypair: &KeyPair) -> Result<(), ChainError> {
        let message = self.message_bytes()?;
        self.signatures.push(SignatureEntry {
            public_key: keypair.public_key(),
            signature: keypair.sign(&message),
        });
        Ok(())
    }

    /// True iff every collected signature verifies against the *current*
    /// canonical message. An unsigned transaction is never authorized.
    /// Never errors; a message that cannot be serialized verifies as false.
    pub fn verify_signatures(&self) -> bool {
        if self.signatures.is_empty() {
            return false;
        }
        let message = match self.message_bytes() {
            Ok(m) => m,
            Err(_) => return false,
        };
        self.signatures
            .iter()
            .all(|entry| verify_signature(&entry.public_key, &message, &entry.signature))
    }

    /// Flat fee: base fee plus a fixed amount per instruction.
    pub fn estimated_fee(&self, fees: &FeeConfig) -> u64 {
        fees.base_fee + fees.per_instruction_fee * self.instructions.len() as u64
    }

    /// All four required fields set: fee payer, recent blockhash, at least
    /// one signature and at least one instruction.
    pub fn is_ready(&self) -> bool {
        self.fee_payer.is_some()
            && self.recent_blockhash.is_some()
            && !self.signatures.is_empty()
            && !self.instructions.is_empty()
    }

    /// Transaction identity for duplicate detection: the first signature's
    /// bytes when present, else a digest of the canonical message.
    pub fn id(&self) -> Result<Vec<u8>, ChainError> {
        if let Some(entry) = self.signatures.first() {
            return Ok(entry.signature.as_bytes().to_vec());
        }
        Ok(Sha256::digest(self.message_bytes()?).to_vec())
    }

    /// Canonical wire form for persistence and transmission. Keys and
    /// signatures travel as base-58 strings.
    pub fn serialize(&self) -> Result<String, ChainError> {
        serde_json::to_string(self)
            .map_err(|e| ChainError::InvalidTransaction(format!("Serialization failed: {}", e)))
    }

    pub fn deserialize(data: &str) -> Result<Self, ChainError> {
        serde_json::from_str(data)
            .map_err(|e| ChainError::InvalidTransaction(format!("Deserialization failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::AccountMeta;

    fn test_instruction(keypair: &KeyPair) -> Instruction {
        Instruction::new(
            "system",
            vec![AccountMeta::new(keypair.public_key(), true)],
            vec![0xDE, 0xAD],
        )
    }

    fn signed_transaction(keypair: &KeyPair) -> Transaction {
        let mut tx = Transaction::new();
        tx.populate(keypair.public_key(), "abc123".to_string(), Some(100));
        tx.add(test_instruction(keypair)).unwrap();
        tx.sign(&[keypair]).unwrap();
        tx
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let tx = signed_transaction(&keypair);
        assert!(tx.verify_signatures());
    }

    #[test]
    fn test_unsigned_transaction_is_not_authorized() {
        let keypair = KeyPair::generate();
        let mut tx = Transaction::new();
        tx.populate(keypair.public_key(), "abc123".to_string(), None);
        tx.add(test_instruction(&keypair)).unwrap();
        assert!(!tx.verify_signatures());
    }

    #[test]
    fn test_mutation_after_signing_invalidates() {
        let keypair = KeyPair::generate();
        let mut tx = signed_transaction(&keypair);
        assert!(tx.verify_signatures());

        // instruction mutation
        tx.add(test_instruction(&keypair)).unwrap();
        assert!(!tx.verify_signatures());

        // re-signing restores authorization
        tx.sign(&[&keypair]).unwrap();
        assert!(tx.verify_signatures());

        // metadata mutation
        tx.populate(keypair.public_key(), "different".to_string(), None);
        assert!(!tx.verify_signatures());
    }

    #[test]
    fn test_partial_sign_collects_multisig() {
        let payer = KeyPair::generate();
        let cosigner = KeyPair::generate();

        let mut tx = Transaction::new();
        tx.populate(payer.public_key(), "abc123".to_string(), None);
        tx.add(test_instruction(&payer)).unwrap();

        tx.partial_sign(&payer).unwrap();
        tx.partial_sign(&cosigner).unwrap();

        assert_eq!(tx.signatures.len(), 2);
        assert_eq!(tx.signatures[0].public_key, payer.public_key());
        assert_eq!(tx.signatures[1].public_key, cosigner.public_key());
        assert!(tx.verify_signatures());
    }

    #[test]
    fn test_sign_replaces_existing_signatures() {
        let payer = KeyPair::generate();
        let cosigner = KeyPair::generate();
        let mut tx = signed_transaction(&payer);
        tx.sign(&[&cosigner]).unwrap();
        assert_eq!(tx.signatures.len(), 1);
        assert_eq!(tx.signatures[0].public_key, cosigner.public_key());
    }

    #[test]
    fn test_add_invalid_instruction_leaves_list_unchanged() {
        let keypair = KeyPair::generate();
        let mut tx = Transaction::new();
        tx.add(test_instruction(&keypair)).unwrap();

        let bad = Instruction::new("system", vec![], vec![]);
        let result = tx.add(bad);
        assert!(matches!(result, Err(ChainError::InvalidInstruction(_))));
        assert_eq!(tx.instructions.len(), 1);
    }

    #[test]
    fn test_estimated_fee() {
        let keypair = KeyPair::generate();
        let mut tx = Transaction::new();
        for _ in 0..3 {
            tx.add(test_instruction(&keypair)).unwrap();
        }
        assert_eq!(tx.estimated_fee(&FeeConfig::default()), 130);
    }

    #[test]
    fn test_is_ready_requires_all_four_fields() {
        let keypair = KeyPair::generate();
        let mut tx = Transaction::new();
        assert!(!tx.is_ready());

        tx.add(test_instruction(&keypair)).unwrap();
        assert!(!tx.is_ready());

        tx.populate(keypair.public_key(), "abc123".to_string(), None);
        assert!(!tx.is_ready());

        tx.sign(&[&keypair]).unwrap();
        assert!(tx.is_ready());
    }

    #[test]
    fn test_wire_roundtrip_preserves_everything() {
        let keypair = KeyPair::generate();
        let tx = signed_transaction(&keypair);

        let wire = tx.serialize().unwrap();
        let restored = Transaction::deserialize(&wire).unwrap();

        assert_eq!(restored.fee_payer, tx.fee_payer);
        assert_eq!(restored.recent_blockhash, tx.recent_blockhash);
        assert_eq!(restored.last_valid_block_height, tx.last_valid_block_height);
        assert_eq!(restored.instructions, tx.instructions);
        assert_eq!(restored.signatures, tx.signatures);
        assert!(restored.verify_signatures());
    }

    #[test]
    fn test_id_uses_first_signature() {
        let keypair = KeyPair::generate();
        let tx = signed_transaction(&keypair);
        assert_eq!(
            tx.id().unwrap(),
            tx.signatures[0].signature.as_bytes().to_vec()
        );
    }
}
