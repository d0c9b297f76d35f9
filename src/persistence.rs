//! Database persistence layer for lumenchain

use crate::block::{Block, Sha256Hash};
use crate::error::ChainError;
use crate::transaction::Transaction;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Abstraction for persistence backends. A saved block and the head-index
/// marker must land together: a crash may lose both but never one.
pub trait Persistence: Send + Sync {
    /// Persists a block and updates the head index in one atomic batch.
    fn save_block(&self, block: &Block) -> Result<(), ChainError>;
    /// Loads all stored blocks in index order.
    fn load_blocks(&self) -> Result<Vec<Block>, ChainError>;
    /// The stored head index, if any block has been saved.
    fn head_index(&self) -> Result<Option<u64>, ChainError>;
    /// Key-value metadata write.
    fn put(&self, key: &str, value: &str) -> Result<(), ChainError>;
    /// Key-value metadata read; `None` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, ChainError>;
}

const HEAD_INDEX_KEY: &str = "head_index";

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, ChainError> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                idx INTEGER PRIMARY KEY,
                hash BLOB NOT NULL,
                previous_hash BLOB NOT NULL,
                timestamp INTEGER NOT NULL,
                transactions TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create blocks table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| {
            ChainError::DatabaseError(format!("Failed to create metadata table: {}", e))
        })?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ChainError> {
        self.conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))
    }
}

fn hash_from_row(bytes: Vec<u8>) -> Result<Sha256Hash, rusqlite::Error> {
    bytes.try_into().map_err(|_| rusqlite::Error::InvalidQuery)
}

impl Persistence for Database {
    fn save_block(&self, block: &Block) -> Result<(), ChainError> {
        let transactions_json = serde_json::to_string(&block.transactions).map_err(|e| {
            ChainError::DatabaseError(format!("Failed to serialize transactions: {}", e))
        })?;

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(|e| {
            ChainError::DatabaseError(format!("Failed to start transaction: {}", e))
        })?;

        tx.execute(
            "INSERT OR REPLACE INTO blocks (idx, hash, previous_hash, timestamp, transactions)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                block.index as i64,
                block.hash.to_vec(),
                block.previous_hash.to_vec(),
                block.timestamp as i64,
                transactions_json,
            ],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to save block: {}", e)))?;

        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![HEAD_INDEX_KEY, block.index.to_string()],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to save head index: {}", e)))?;

        tx.commit()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to commit transaction: {}", e)))
    }

    fn load_blocks(&self) -> Result<Vec<Block>, ChainError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT idx, hash, previous_hash, timestamp, transactions
                 FROM blocks ORDER BY idx ASC",
            )
            .map_err(|e| ChainError::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let blocks_iter = stmt
            .query_map([], |row| {
                let index: i64 = row.get(0)?;
                let hash = hash_from_row(row.get(1)?)?;
                let previous_hash = hash_from_row(row.get(2)?)?;
                let timestamp: i64 = row.get(3)?;
                let transactions_json: String = row.get(4)?;
                let transactions: Vec<Transaction> = serde_json::from_str(&transactions_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?;

                Ok(Block {
                    index: index as u64,
                    timestamp: timestamp as u64,
                    previous_hash,
                    transactions,
                    hash,
                })
            })
            .map_err(|e| ChainError::DatabaseError(format!("Failed to query blocks: {}", e)))?;

        let mut blocks = Vec::new();
        for block_result in blocks_iter {
            blocks.push(block_result.map_err(|e| {
                ChainError::DatabaseError(format!("Failed to load block: {}", e))
            })?);
        }
        Ok(blocks)
    }

    fn head_index(&self) -> Result<Option<u64>, ChainError> {
        match self.get(HEAD_INDEX_KEY)? {
            Some(value) => value
                .parse::<u64>()
                .map(Some)
                .map_err(|e| ChainError::DatabaseError(format!("Corrupt head index: {}", e))),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), ChainError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to write metadata: {}", e)))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, ChainError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| ChainError::DatabaseError(format!("Failed to read metadata: {}", e)))
    }
}

/// Simple in-memory persistence implementation useful for tests and
/// ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    blocks: Arc<Mutex<Vec<Block>>>,
    metadata: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_block(&self, block: &Block) -> Result<(), ChainError> {
        let mut blocks = self
            .blocks
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        blocks.retain(|b| b.index != block.index);
        blocks.push(block.clone());
        blocks.sort_by_key(|b| b.index);
        drop(blocks);
        self.put(HEAD_INDEX_KEY, &block.index.to_string())
    }

    fn load_blocks(&self) -> Result<Vec<Block>, ChainError> {
        let blocks = self
            .blocks
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        Ok(blocks.clone())
    }

    fn head_index(&self) -> Result<Option<u64>, ChainError> {
        match self.get(HEAD_INDEX_KEY)? {
            Some(value) => value
                .parse::<u64>()
                .map(Some)
                .map_err(|e| ChainError::DatabaseError(format!("Corrupt head index: {}", e))),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), ChainError> {
        let mut metadata = self
            .metadata
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, ChainError> {
        let metadata = self
            .metadata
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        Ok(metadata.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::GENESIS_PREVIOUS_HASH;

    fn sample_block(index: u64, previous_hash: Sha256Hash) -> Block {
        Block::new(index, 1_704_067_200_000 + index * 1000, vec![], previous_hash).unwrap()
    }

    #[test]
    fn test_database_open() {
        let db = Database::open(":memory:").unwrap();
        assert!(db.conn.lock().unwrap().is_autocommit());
    }

    #[test]
    fn test_save_and_load_blocks() {
        let db = Database::open(":memory:").unwrap();
        let genesis = sample_block(0, GENESIS_PREVIOUS_HASH);
        let next = sample_block(1, genesis.hash);

        db.save_block(&genesis).unwrap();
        db.save_block(&next).unwrap();

        let loaded = db.load_blocks().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].hash, genesis.hash);
        assert_eq!(loaded[1].previous_hash, genesis.hash);
        assert_eq!(db.head_index().unwrap(), Some(1));
    }

    #[test]
    fn test_metadata_roundtrip() {
        let db = Database::open(":memory:").unwrap();
        assert_eq!(db.get("balance:abc").unwrap(), None);
        db.put("balance:abc", "42").unwrap();
        assert_eq!(db.get("balance:abc").unwrap(), Some("42".to_string()));
    }

    #[test]
    fn test_in_memory_mirrors_database() {
        let mem = InMemoryPersistence::new();
        let genesis = sample_block(0, GENESIS_PREVIOUS_HASH);
        mem.save_block(&genesis).unwrap();
        // re-saving the same index replaces, not duplicates
        mem.save_block(&genesis).unwrap();

        assert_eq!(mem.load_blocks().unwrap().len(), 1);
        assert_eq!(mem.head_index().unwrap(), Some(0));
    }
}
