//! Postgres persistence adapters for the identity service.
//!
//! Thin Diesel adapters translating between row structs and domain types.
//! Row and schema definitions stay private to this module; the domain only
//! ever sees its own types and the port error enum.

mod diesel_user_repository;
mod models;
mod schema;

pub use diesel_user_repository::DieselUserRepository;
