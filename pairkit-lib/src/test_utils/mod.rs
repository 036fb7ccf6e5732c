//! Test utilities for Pairkit.
//!
//! Deterministic stand-ins for the chain-facing collaborators:
//! - [`TestSigner`]: Ed25519 key material that signs the way a wallet does
//! - [`MockTransaction`]: a transaction block with predictable bytes
//! - [`MockLedger`] and [`MockGateway`]: record every call and can be told to fail
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pairkit_lib::test_utils::{MockLedger, MockTransaction, TestSigner};
//!
//! let signer = TestSigner::from_seed([7u8; 32]);
//! let ledger = MockLedger::new();
//! let tx = MockTransaction::new(b"transfer".to_vec());
//! ```

mod fixtures;
mod mocks;

pub use fixtures::{test_token, TestSigner};
pub use mocks::{MockGateway, MockLedger, MockTransaction};
