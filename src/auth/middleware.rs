use actix_web::http::header::Header;
use actix_web::{Error, FromRequest, HttpRequest, dev::Payload, web};
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use std::future::{Ready, ready};

use crate::auth::jwt;
use crate::workflow::Actor;

/// The caller, resolved from the bearer token.
pub struct AuthenticatedActor(pub Actor);

impl FromRequest for AuthenticatedActor {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).map(AuthenticatedActor))
    }
}

fn authenticate(req: &HttpRequest) -> Result<Actor, Error> {
    // 1. Extract the Bearer token from the Authorization header.
    let auth = Authorization::<Bearer>::parse(req).map_err(|_| {
        actix_web::error::ErrorUnauthorized("Authorization header must be: Bearer <token>")
    })?;

    // 2. Get the signing secret from app data.
    let secret = req.app_data::<web::Data<JwtSecret>>().ok_or_else(|| {
        actix_web::error::ErrorInternalServerError("JWT secret not configured")
    })?;

    // 3. Validate the JWT.
    let claims = jwt::validate_token(auth.as_ref().token(), &secret.0)
        .map_err(|e| actix_web::error::ErrorUnauthorized(format!("Invalid token: {e}")))?;

    // 4. Extract the party from claims.
    let id = claims
        .user_id()
        .map_err(actix_web::error::ErrorUnauthorized)?;
    let role = claims
        .party_role()
        .map_err(actix_web::error::ErrorForbidden)?;

    Ok(Actor::new(id, role))
}

/// Wrapper type to store the JWT secret in Actix app data.
#[derive(Clone)]
pub struct JwtSecret(pub String);
