//! Ledger service library modules.
//!
//! Owns the append-only transaction log and the per-user account snapshot.
//! Every write runs through the serializable posting protocol; token
//! validation is delegated to the identity service.

pub mod config;
pub mod doc;
pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod server;
