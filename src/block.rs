//! Blocks: hash-linked, ordered containers of transactions.

use crate::error::ChainError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type Sha256Hash = [u8; 32];

/// Sentinel previous-hash carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: Sha256Hash = [0u8; 32];

/// A block binds its index, predecessor hash, timestamp and transaction
/// sequence under a single content hash.
///
/// The stored `hash` is a cache of [`Block::calculate_hash`]; any mutation
/// must be followed by [`Block::refresh_hash`] or the block will fail
/// validation. `add_transaction` refreshes it itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub previous_hash: Sha256Hash,
    pub transactions: Vec<Transaction>,
    pub hash: Sha256Hash,
}

impl Block {
    /// Builds a block and computes its content hash immediately.
    pub fn new(
        index: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        previous_hash: Sha256Hash,
    ) -> Result<Self, ChainError> {
        let mut block = Block {
            index,
            timestamp,
            previous_hash,
            transactions,
            hash: [0u8; 32],
        };
        block.refresh_hash()?;
        Ok(block)
    }

    /// Deterministic content hash over {index, previous_hash, timestamp,
    /// transactions}. Pure and idempotent; transaction order changes the
    /// digest.
    pub fn calculate_hash(&self) -> Result<Sha256Hash, ChainError> {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_le_bytes());
        hasher.update(self.previous_hash);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(bincode::serialize(&self.transactions)?);
        Ok(hasher.finalize().into())
    }

    /// Refreshes the cached hash from current content.
    pub fn refresh_hash(&mut self) -> Result<(), ChainError> {
        self.hash = self.calculate_hash()?;
        Ok(())
    }

    /// Appends a transaction and refreshes the content hash.
    ///
    /// Defensive: rejects transactions that are not ready (missing fee
    /// payer, recent blockhash, signatures or instructions) and duplicates
    /// by transaction identity. On failure the block is unchanged.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<(), ChainError> {
        if !transaction.is_ready() {
            return Err(ChainError::InvalidTransaction(
                "Transaction is not ready: fee payer, recent blockhash, signatures and \
                 instructions must all be set"
                    .to_string(),
            ));
        }

        let id = transaction.id()?;
        for existing in &self.transactions {
            if existing.id()? == id {
                return Err(ChainError::DuplicateTransaction(hex::encode(&id)));
            }
        }

        self.transactions.push(transaction);
        self.refresh_hash()
    }

    /// Re-checks the transaction-set invariants that `add_transaction`
    /// enforces incrementally: every transaction ready, identities unique.
    /// Used when a fully built block crosses a deserialization boundary.
    pub fn check_transactions(&self) -> Result<(), ChainError> {
        let mut seen: Vec<Vec<u8>> = Vec::with_capacity(self.transactions.len());
        for transaction in &self.transactions {
            if !transaction.is_ready() {
                return Err(ChainError::InvalidTransaction(
                    "Block carries a transaction that is not ready".to_string(),
                ));
            }
            let id = transaction.id()?;
            if seen.contains(&id) {
                return Err(ChainError::DuplicateTransaction(hex::encode(&id)));
            }
            seen.push(id);
        }
        Ok(())
    }

    /// Validity relative to a predecessor: linkage plus self-hash
    /// consistency. Transaction signatures are not re-verified at this
    /// layer. Reports rather than errors, so callers can treat a mismatch
    /// as diagnostic.
    pub fn is_valid(&self, previous: &Block) -> bool {
        if self.previous_hash != previous.hash {
            return false;
        }
        match self.calculate_hash() {
            Ok(expected) => expected == self.hash,
            Err(_) => false,
        }
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::instruction::{AccountMeta, Instruction};

    fn signed_transaction(keypair: &KeyPair, blockhash: &str) -> Transaction {
        let mut tx = Transaction::new();
        tx.populate(keypair.public_key(), blockhash.to_string(), None);
        tx.add(Instruction::new(
            "system",
            vec![AccountMeta::new(keypair.public_key(), true)],
            vec![1],
        ))
        .unwrap();
        tx.sign(&[keypair]).unwrap();
        tx
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = Block::new(0, 1672531200000, vec![], GENESIS_PREVIOUS_HASH).unwrap();
        let first = block.calculate_hash().unwrap();
        let second = block.calculate_hash().unwrap();
        assert_eq!(first, second);
        assert_eq!(block.hash, first);
    }

    #[test]
    fn test_transaction_order_changes_hash() {
        let keypair = KeyPair::generate();
        let a = signed_transaction(&keypair, "aaaa");
        let b = signed_transaction(&keypair, "bbbb");

        let ab = Block::new(1, 1000, vec![a.clone(), b.clone()], [1u8; 32]).unwrap();
        let ba = Block::new(1, 1000, vec![b, a], [1u8; 32]).unwrap();
        assert_ne!(ab.hash, ba.hash);
    }

    #[test]
    fn test_add_transaction_refreshes_hash() {
        let keypair = KeyPair::generate();
        let mut block = Block::new(1, 1000, vec![], [1u8; 32]).unwrap();
        let before = block.hash;

        block
            .add_transaction(signed_transaction(&keypair, "aaaa"))
            .unwrap();
        assert_ne!(block.hash, before);
        assert_eq!(block.hash, block.calculate_hash().unwrap());
    }

    #[test]
    fn test_rejects_unready_transaction() {
        let mut block = Block::new(1, 1000, vec![], [1u8; 32]).unwrap();
        let result = block.add_transaction(Transaction::new());
        assert!(matches!(result, Err(ChainError::InvalidTransaction(_))));
        assert!(block.transactions.is_empty());
    }

    #[test]
    fn test_rejects_duplicate_transaction() {
        let keypair = KeyPair::generate();
        let tx = signed_transaction(&keypair, "aaaa");
        let mut block = Block::new(1, 1000, vec![], [1u8; 32]).unwrap();

        block.add_transaction(tx.clone()).unwrap();
        let result = block.add_transaction(tx);
        assert!(matches!(result, Err(ChainError::DuplicateTransaction(_))));
        assert_eq!(block.transactions.len(), 1);
    }

    #[test]
    fn test_check_transactions_rejects_duplicate_identity() {
        let keypair = KeyPair::generate();
        let tx = signed_transaction(&keypair, "aaaa");
        // constructed wholesale, bypassing add_transaction
        let block = Block::new(1, 1000, vec![tx.clone(), tx], [1u8; 32]).unwrap();
        assert!(matches!(
            block.check_transactions(),
            Err(ChainError::DuplicateTransaction(_))
        ));
    }

    #[test]
    fn test_check_transactions_rejects_unready_transaction() {
        let block = Block::new(1, 1000, vec![Transaction::new()], [1u8; 32]).unwrap();
        assert!(matches!(
            block.check_transactions(),
            Err(ChainError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_check_transactions_accepts_distinct_ready_set() {
        let keypair = KeyPair::generate();
        let a = signed_transaction(&keypair, "aaaa");
        let b = signed_transaction(&keypair, "bbbb");
        let block = Block::new(1, 1000, vec![a, b], [1u8; 32]).unwrap();
        assert!(block.check_transactions().is_ok());
    }

    #[test]
    fn test_is_valid_checks_linkage_and_self_hash() {
        let genesis = Block::new(0, 1000, vec![], GENESIS_PREVIOUS_HASH).unwrap();
        let block = Block::new(1, 2000, vec![], genesis.hash).unwrap();
        assert!(block.is_valid(&genesis));

        // broken linkage
        let mut unlinked = block.clone();
        unlinked.previous_hash = [9u8; 32];
        unlinked.refresh_hash().unwrap();
        assert!(!unlinked.is_valid(&genesis));

        // stale hash after silent mutation
        let keypair = KeyPair::generate();
        let mut tampered = block.clone();
        tampered
            .transactions
            .push(signed_transaction(&keypair, "aaaa"));
        assert!(!tampered.is_valid(&genesis));
    }
}
