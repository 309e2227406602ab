//! Identity domain: user model, ports, and the account service.

pub mod ports;
mod service;
mod user;

pub use service::{IdentityService, LoginOutcome, TokenValidation};
pub use user::{
    EmailAddress, EmailValidationError, NameValidationError, Password, PasswordValidationError,
    PersonName, ProfileUpdate, Registration, User, UserId,
};
