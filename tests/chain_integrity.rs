//! Integration tests for chain construction, auditing and persistence

use lumenchain::block::Block;
use lumenchain::chain::Blockchain;
use lumenchain::error::ChainError;
use lumenchain::persistence::{Database, InMemoryPersistence, Persistence};
use tempfile::TempDir;

/// Helper to append an empty block on top of the current head
fn append_empty_block(chain: &mut Blockchain) -> Result<(), Box<dyn std::error::Error>> {
    let head = chain.latest()?;
    let block = Block::new(head.index + 1, head.timestamp + 1000, vec![], head.hash)?;
    chain.append(block)?;
    Ok(())
}

#[test]
fn test_ten_block_chain_validates() -> Result<(), Box<dyn std::error::Error>> {
    let mut chain = Blockchain::new()?;
    for _ in 0..10 {
        append_empty_block(&mut chain)?;
    }

    assert_eq!(chain.blocks.len(), 11);
    assert!(chain.is_valid());

    // every block links to its predecessor
    for i in 1..chain.blocks.len() {
        assert_eq!(chain.blocks[i].previous_hash, chain.blocks[i - 1].hash);
    }
    Ok(())
}

#[test]
fn test_tamper_detection_reports_first_break() -> Result<(), Box<dyn std::error::Error>> {
    let mut chain = Blockchain::new()?;
    for _ in 0..6 {
        append_empty_block(&mut chain)?;
    }

    // silently mutate block 3's content
    chain.blocks[3].timestamp += 1;
    assert_eq!(chain.validate(), Some(3));
    Ok(())
}

#[test]
fn test_append_is_authoritative() -> Result<(), Box<dyn std::error::Error>> {
    let mut chain = Blockchain::new()?;
    append_empty_block(&mut chain)?;

    // a block computed against genesis rather than the real head
    let stale = Block::new(1, 12345, vec![], chain.blocks[0].hash)?;
    chain.append(stale)?;

    let head = chain.latest()?;
    assert_eq!(head.index, 2);
    assert_eq!(head.previous_hash, chain.blocks[1].hash);
    assert!(chain.is_valid());
    Ok(())
}

#[test]
fn test_chain_survives_reload_from_disk() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("ledger.db");
    let db_path = db_path.to_str().ok_or("non-utf8 temp path")?.to_string();

    let head_hash = {
        let database = Database::open(&db_path)?;
        let mut chain = Blockchain::new_with_persistence(Box::new(database))?;
        for _ in 0..4 {
            append_empty_block(&mut chain)?;
        }
        chain.latest_blockhash()?
    };

    let database = Database::open(&db_path)?;
    let restored = Blockchain::load(Box::new(database))?;

    assert_eq!(restored.blocks.len(), 5);
    assert_eq!(restored.latest_blockhash()?, head_hash);
    assert!(restored.is_valid());
    Ok(())
}

#[test]
fn test_loading_a_broken_store_fails() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryPersistence::new();
    let genesis = Blockchain::create_genesis_block()?;
    // block 1 does not link to genesis
    let orphan = Block::new(1, genesis.timestamp + 1000, vec![], [9u8; 32])?;
    store.save_block(&genesis)?;
    store.save_block(&orphan)?;

    let result = Blockchain::load(Box::new(store));
    assert!(matches!(result, Err(ChainError::LinkageMismatch(1))));
    Ok(())
}

#[test]
fn test_fresh_store_yields_genesis_only() -> Result<(), Box<dyn std::error::Error>> {
    let chain = Blockchain::load(Box::new(InMemoryPersistence::new()))?;
    assert_eq!(chain.blocks.len(), 1);
    assert_eq!(chain.latest()?.index, 0);
    Ok(())
}
