//! Authentication handlers and guards.
//!
//! Login mints external tokens; the validation endpoint answers peer
//! services holding an internal bearer. Guards concentrate header parsing
//! so the resource handlers stay focused on request/response mapping.

use actix_web::{HttpRequest, HttpResponse, post, web};
use serde::{Deserialize, Serialize};
use tally_core::{Error, bearer_token};
use tally_tokens::HmacSecret;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use super::ApiResult;
use super::state::HttpState;
use crate::domain::{User, UserId};

/// Resolve the external-token principal for a protected identity endpoint.
pub fn require_principal(req: &HttpRequest, state: &HttpState) -> ApiResult<UserId> {
    let token = bearer_token(req)?;
    state.service.authenticate(token)
}

/// Enforce the internal bearer guarding the peer validation endpoint.
pub fn require_internal(req: &HttpRequest, secret: &HmacSecret) -> ApiResult<()> {
    let token = bearer_token(req)?;
    tally_tokens::verify_internal(secret, token).map_err(|err| {
        debug!(reason = %err, "internal token rejected");
        Error::unauthorized("invalid internal token")
    })?;
    Ok(())
}

/// Login request body.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// User fields echoed back at login.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginUser {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for LoginUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email.as_str().to_owned(),
            first_name: user.first_name.as_str().to_owned(),
            last_name: user.last_name.as_str().to_owned(),
        }
    }
}

/// Login response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user: LoginUser,
    pub access_token: String,
}

/// Authenticate credentials and mint an external token.
#[utoipa::path(
    post,
    path = "/api/v1/auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login success", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = Error),
    ),
    tags = ["auth"],
)]
#[post("/auth")]
pub async fn login(
    state: web::Data<HttpState>,
    payload: web::Json<LoginRequest>,
) -> ApiResult<web::Json<LoginResponse>> {
    let LoginRequest { email, password } = payload.into_inner();
    let outcome = state.service.login(&email, &password).await?;
    Ok(web::Json(LoginResponse {
        user: outcome.user.into(),
        access_token: outcome.access_token,
    }))
}

/// Peer validation request body.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ValidateTokenRequest {
    pub user_token: String,
}

/// Peer validation response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

/// Validate an external token for a peer service.
///
/// Guarded by the internal bearer; a rejected user token is still a 200
/// with `valid: false` so peers can distinguish "bad client token" from
/// "I am not allowed to ask".
#[utoipa::path(
    post,
    path = "/api/v1/auth/validate-user-jwt",
    request_body = ValidateTokenRequest,
    responses(
        (status = 200, description = "Validation verdict", body = ValidateTokenResponse),
        (status = 401, description = "Missing or invalid internal token", body = Error),
    ),
    tags = ["auth"],
)]
#[post("/auth/validate-user-jwt")]
pub async fn validate_user_jwt(
    req: HttpRequest,
    state: web::Data<HttpState>,
    payload: web::Json<ValidateTokenRequest>,
) -> ApiResult<HttpResponse> {
    require_internal(&req, &state.internal_secret)?;
    let validation = state.service.validate_token(&payload.user_token);
    Ok(HttpResponse::Ok().json(ValidateTokenResponse {
        valid: validation.valid,
        user_id: validation.user_id.map(|id| id.as_uuid()),
    }))
}
