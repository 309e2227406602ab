//! Plumbing shared by the tally services.
//!
//! Holds the concerns that must behave identically in every service: the
//! wire error envelope and its HTTP mapping, the request tracing
//! middleware, and the async Postgres connection pool wrapper. Domain logic
//! never lives here.

pub mod bearer;
pub mod error;
pub mod health;
pub mod pool;
pub mod trace;

pub use bearer::bearer_token;
pub use error::{ApiResult, Error, ErrorCode};
pub use health::HealthState;
pub use pool::{DbPool, PoolConfig, PoolError};
pub use trace::{Trace, current_trace_id};
