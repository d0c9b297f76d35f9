//! The chain: ordered blocks from genesis to head, append-only.

use crate::block::{Block, Sha256Hash, GENESIS_PREVIOUS_HASH};
use crate::error::ChainError;
use crate::persistence::{InMemoryPersistence, Persistence};
use crate::transaction::Transaction;

/// Fixed genesis timestamp (2024-01-01T00:00:00Z, ms) so the genesis hash is
/// deterministic across nodes.
pub const GENESIS_TIMESTAMP: u64 = 1_704_067_200_000;

/// An append-only sequence of hash-linked blocks. Append is the only
/// mutation path: no deletion, no reordering.
///
/// The chain itself is single-threaded; callers that share it across tasks
/// must serialize appends behind a lock (the API server wraps it in an
/// `RwLock`), otherwise two concurrent appends could both read the same head
/// and fork the chain.
pub struct Blockchain {
    pub blocks: Vec<Block>,
    pub persistence: Box<dyn Persistence>,
}

impl Blockchain {
    /// Creates a chain with an in-memory persistence backend.
    pub fn new() -> Result<Self, ChainError> {
        Self::new_with_persistence(Box::new(InMemoryPersistence::new()))
    }

    /// Creates a chain over the provided persistence backend, installing and
    /// persisting the genesis block.
    pub fn new_with_persistence(persistence: Box<dyn Persistence>) -> Result<Self, ChainError> {
        let genesis = Self::create_genesis_block()?;
        persistence.save_block(&genesis)?;
        Ok(Blockchain {
            blocks: vec![genesis],
            persistence,
        })
    }

    /// Restores a chain from its persistence backend, auditing the stored
    /// sequence before trusting it. An empty store yields a fresh chain.
    pub fn load(persistence: Box<dyn Persistence>) -> Result<Self, ChainError> {
        let blocks = persistence.load_blocks()?;
        if blocks.is_empty() {
            return Self::new_with_persistence(persistence);
        }
        audit_blocks(&blocks)?;
        Ok(Blockchain {
            blocks,
            persistence,
        })
    }

    /// Genesis: index 0, fixed timestamp, no transactions, sentinel
    /// previous hash.
    pub fn create_genesis_block() -> Result<Block, ChainError> {
        Block::new(0, GENESIS_TIMESTAMP, vec![], GENESIS_PREVIOUS_HASH)
    }

    /// The current head. Fails with `EmptyChain` only for a chain that was
    /// never initialized (the constructors always install genesis).
    pub fn latest(&self) -> Result<&Block, ChainError> {
        self.blocks.last().ok_or(ChainError::EmptyChain)
    }

    /// Hex hash of the current head, the value transactions carry as their
    /// anti-replay reference.
    pub fn latest_blockhash(&self) -> Result<String, ChainError> {
        Ok(self.latest()?.hash_hex())
    }

    /// The index the next appended block will receive.
    pub fn next_index(&self) -> Result<u64, ChainError> {
        Ok(self.latest()?.index + 1)
    }

    /// Appends a block. Authoritative: the caller-supplied index and
    /// previous hash are overwritten from the current head before the block
    /// hash is recomputed — the chain wins over caller intent. Returns the
    /// final block hash.
    ///
    /// The block is persisted before it joins the in-memory sequence; a
    /// failed write aborts the append with the chain unchanged, so the
    /// caller can retry without the disk and memory views diverging.
    pub fn append(&mut self, mut block: Block) -> Result<Sha256Hash, ChainError> {
        let head = self.latest()?;
        block.index = head.index + 1;
        block.previous_hash = head.hash;
        block.refresh_hash()?;

        let hash = block.hash;
        self.persistence.save_block(&block)?;
        self.blocks.push(block);
        Ok(hash)
    }

    /// Acceptance checks for an externally submitted transaction, before it
    /// is embedded in a block:
    /// readiness, signature verification, anti-replay reference equal to
    /// the current head's hash, and an unexpired validity horizon.
    pub fn check_acceptance(&self, transaction: &Transaction) -> Result<(), ChainError> {
        if !transaction.is_ready() {
            return Err(ChainError::InvalidTransaction(
                "Transaction is not ready".to_string(),
            ));
        }
        if !transaction.verify_signatures() {
            return Err(ChainError::InvalidTransaction(
                "Signature verification failed".to_string(),
            ));
        }

        let expected = self.latest_blockhash()?;
        match transaction.recent_blockhash.as_deref() {
            Some(reference) if reference == expected => {}
            Some(reference) => {
                return Err(ChainError::InvalidTransaction(format!(
                    "Recent blockhash {} does not match the latest blockhash {}",
                    reference, expected
                )));
            }
            None => {
                return Err(ChainError::InvalidTransaction(
                    "Missing recent blockhash".to_string(),
                ));
            }
        }

        if let Some(horizon) = transaction.last_valid_block_height {
            let next = self.next_index()?;
            if next > horizon {
                return Err(ChainError::InvalidTransaction(format!(
                    "Transaction expired: valid through block {}, next block is {}",
                    horizon, next
                )));
            }
        }

        Ok(())
    }

    /// Accepts one transaction and appends it in a fresh block. Returns the
    /// new block's hash.
    pub fn record_transaction(&mut self, transaction: Transaction) -> Result<Sha256Hash, ChainError> {
        self.check_acceptance(&transaction)?;
        let head = self.latest()?;
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        let block = Block::new(head.index + 1, timestamp, vec![transaction], head.hash)?;
        self.append(block)
    }

    /// Walks the chain from index 1, checking self-hash consistency and
    /// predecessor linkage. Returns the first failing index, or `None` when
    /// the chain is sound. Stops at the first break.
    pub fn validate(&self) -> Option<u64> {
        for i in 1..self.blocks.len() {
            if !self.blocks[i].is_valid(&self.blocks[i - 1]) {
                return Some(i as u64);
            }
        }
        None
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_none()
    }

    pub fn block(&self, index: u64) -> Result<&Block, ChainError> {
        self.blocks
            .iter()
            .find(|b| b.index == index)
            .ok_or_else(|| ChainError::NotFound(format!("block {}", index)))
    }
}

/// Precise audit used when adopting an externally stored sequence: reports
/// whether the first break is a stale hash or broken linkage.
pub fn audit_blocks(blocks: &[Block]) -> Result<(), ChainError> {
    for i in 1..blocks.len() {
        let current = &blocks[i];
        if current.previous_hash != blocks[i - 1].hash {
            return Err(ChainError::LinkageMismatch(current.index));
        }
        if current.calculate_hash()? != current.hash {
            return Err(ChainError::HashMismatch(current.index));
        }
    }
    Ok(())
}
