//! HTTP inbound adapter exposing the identity REST surface.

pub mod auth;
pub mod state;
pub mod users;

pub use tally_core::ApiResult;
