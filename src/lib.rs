//! Lumenchain - a minimal append-only ledger of signed transactions
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`chain`] - The block sequence, append and full-chain validation
//! - [`block`] - Block structure and content hashing
//! - [`transaction`] - Transactions, canonical signing message, fees
//! - [`instruction`] - Addressed, opaque units of intent
//!
//! ## Cryptography
//! - [`crypto`] - ed25519 keypairs, signatures, base-58 encodings
//!
//! ## State Management
//! - [`persistence`] - Database layer (SQLite) and in-memory backend
//!
//! ## Integration
//! - [`api`] - JSON RPC server (axum)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod block;
pub mod chain;
pub mod instruction;
pub mod transaction;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// State Management
// ============================================================================
pub mod persistence;

// ============================================================================
// Integration
// ============================================================================
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
