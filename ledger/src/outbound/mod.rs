//! Outbound adapters: Postgres persistence and the identity client.

mod identity_client;
pub mod persistence;

pub use identity_client::HttpTokenVerifier;
