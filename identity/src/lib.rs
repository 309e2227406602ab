//! Identity service library modules.
//!
//! Owns user identities and credentials: public registration and login,
//! self-service profile management, external token minting, and the
//! internal-bearer-protected validation endpoint the ledger calls.

pub mod config;
pub mod doc;
pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod server;
