//! OpenAPI document for the identity service.

use utoipa::OpenApi;

use crate::domain::{EmailAddress, PersonName, User, UserId};
use crate::inbound::http::auth::{
    LoginRequest, LoginResponse, LoginUser, ValidateTokenRequest, ValidateTokenResponse,
};
use crate::inbound::http::users::{RegisterRequest, UpdateUserRequest};

/// Aggregated API description served to tooling.
#[derive(OpenApi)]
#[openapi(
    info(title = "tally-identity", description = "User identities and tokens"),
    paths(
        crate::inbound::http::users::register,
        crate::inbound::http::users::list_users,
        crate::inbound::http::users::get_user,
        crate::inbound::http::users::update_user,
        crate::inbound::http::users::delete_user,
        crate::inbound::http::auth::login,
        crate::inbound::http::auth::validate_user_jwt,
    ),
    components(schemas(
        User,
        UserId,
        EmailAddress,
        PersonName,
        RegisterRequest,
        UpdateUserRequest,
        LoginRequest,
        LoginUser,
        LoginResponse,
        ValidateTokenRequest,
        ValidateTokenResponse,
        tally_core::Error,
        tally_core::ErrorCode,
    )),
    tags(
        (name = "users", description = "Registration and profile management"),
        (name = "auth", description = "Login and token validation"),
    )
)]
pub struct ApiDoc;
