//! User resource handlers: registration and self-service profile access.

use actix_web::{HttpRequest, HttpResponse, delete, get, patch, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tally_core::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::ApiResult;
use super::auth::require_principal;
use super::state::HttpState;
use crate::domain::{
    EmailAddress, Password, PersonName, ProfileUpdate, Registration, User, UserId,
};

/// Registration request body.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Self-update request body; omitted fields are left untouched.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

fn field_error(field: &str, message: impl std::fmt::Display) -> Error {
    Error::invalid_request(message.to_string()).with_details(json!({ "field": field }))
}

fn parse_registration(payload: RegisterRequest) -> Result<Registration, Error> {
    Ok(Registration {
        email: EmailAddress::new(payload.email).map_err(|err| field_error("email", err))?,
        first_name: PersonName::new(payload.first_name)
            .map_err(|err| field_error("first_name", err))?,
        last_name: PersonName::new(payload.last_name)
            .map_err(|err| field_error("last_name", err))?,
        password: Password::new(payload.password).map_err(|err| field_error("password", err))?,
    })
}

fn parse_update(payload: UpdateUserRequest) -> Result<ProfileUpdate, Error> {
    let first_name = payload
        .first_name
        .map(PersonName::new)
        .transpose()
        .map_err(|err| field_error("first_name", err))?;
    let last_name = payload
        .last_name
        .map(PersonName::new)
        .transpose()
        .map_err(|err| field_error("last_name", err))?;
    let password = payload
        .password
        .map(Password::new)
        .transpose()
        .map_err(|err| field_error("password", err))?;
    Ok(ProfileUpdate {
        first_name,
        last_name,
        password,
    })
}

/// Register a new user.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Validation failure", body = Error),
        (status = 409, description = "Email already registered", body = Error),
    ),
    tags = ["users"],
)]
#[post("/users")]
pub async fn register(
    state: web::Data<HttpState>,
    payload: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let registration = parse_registration(payload.into_inner())?;
    let user = state.service.register(registration).await?;
    Ok(HttpResponse::Created().json(user))
}

/// List registered users.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses(
        (status = 200, description = "Users, newest first", body = [User]),
        (status = 401, description = "Unauthorised", body = Error),
    ),
    tags = ["users"],
)]
#[get("/users")]
pub async fn list_users(
    req: HttpRequest,
    state: web::Data<HttpState>,
) -> ApiResult<web::Json<Vec<User>>> {
    require_principal(&req, &state)?;
    let users = state.service.list().await?;
    Ok(web::Json(users))
}

/// Fetch a user; owners only.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    responses(
        (status = 200, description = "User record", body = User),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 403, description = "Not the owner", body = Error),
        (status = 404, description = "No such user", body = Error),
    ),
    tags = ["users"],
)]
#[get("/users/{id}")]
pub async fn get_user(
    req: HttpRequest,
    state: web::Data<HttpState>,
    id: web::Path<Uuid>,
) -> ApiResult<web::Json<User>> {
    let principal = require_principal(&req, &state)?;
    let user = state
        .service
        .fetch(principal, UserId::new(id.into_inner()))
        .await?;
    Ok(web::Json(user))
}

/// Update a user; owners only.
#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "Validation failure", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 403, description = "Not the owner", body = Error),
        (status = 404, description = "No such user", body = Error),
    ),
    tags = ["users"],
)]
#[patch("/users/{id}")]
pub async fn update_user(
    req: HttpRequest,
    state: web::Data<HttpState>,
    id: web::Path<Uuid>,
    payload: web::Json<UpdateUserRequest>,
) -> ApiResult<web::Json<User>> {
    let principal = require_principal(&req, &state)?;
    let update = parse_update(payload.into_inner())?;
    let user = state
        .service
        .update(principal, UserId::new(id.into_inner()), update)
        .await?;
    Ok(web::Json(user))
}

/// Delete a user; owners only.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 403, description = "Not the owner", body = Error),
        (status = 404, description = "No such user", body = Error),
    ),
    tags = ["users"],
)]
#[delete("/users/{id}")]
pub async fn delete_user(
    req: HttpRequest,
    state: web::Data<HttpState>,
    id: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let principal = require_principal(&req, &state)?;
    state
        .service
        .remove(principal, UserId::new(id.into_inner()))
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
