//! Postgres persistence adapters for the ledger service.
//!
//! `DieselLedgerStore` is the only implementation of the `LedgerStore`
//! port; the whole write protocol lives inside its serializable
//! transaction. Row structs and schema stay private to this module.

mod diesel_ledger_store;
mod models;
mod schema;

pub use diesel_ledger_store::{DieselLedgerStore, StoreTuning};
