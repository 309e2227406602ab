//! `Authorization: Bearer` header parsing shared by both services.

use actix_web::HttpRequest;
use actix_web::http::header::AUTHORIZATION;

use crate::error::{ApiResult, Error};

/// Extract the bearer token from a request.
///
/// A missing header, a non-bearer scheme, and an empty token all map to
/// `UNAUTHORIZED`; callers never see the distinction and neither do clients.
pub fn bearer_token(req: &HttpRequest) -> ApiResult<&str> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| Error::unauthorized("missing bearer token"))?;
    let value = header
        .to_str()
        .map_err(|_| Error::unauthorized("malformed authorization header"))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::unauthorized("malformed authorization header"))
}
