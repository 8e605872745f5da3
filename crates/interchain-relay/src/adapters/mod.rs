//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements outbound port traits for the relay engine.

mod in_memory_ledger;
mod signers;

pub use in_memory_ledger::InMemoryLedger;
pub use signers::StaticSigners;
