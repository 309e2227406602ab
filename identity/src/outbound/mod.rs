//! Outbound adapters: Postgres persistence and credential hashing.

mod argon2_hasher;
pub mod persistence;

pub use argon2_hasher::Argon2CredentialHasher;
