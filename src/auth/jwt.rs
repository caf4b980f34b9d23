use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::offers::PartyRole;

/// Supabase JWT claims.
///
/// The `sub` field is the user's UUID in `auth.users`. Which side of the
/// marketplace the user is on lives in `app_metadata`, which only the
/// service role can write.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Token expiration (Unix timestamp).
    pub exp: usize,
    pub iat: Option<usize>,
    pub iss: Option<String>,
    pub email: Option<String>,
    /// Supabase role (e.g. "authenticated").
    pub role: Option<String>,
    pub app_metadata: Option<AppMetadata>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppMetadata {
    pub party_role: Option<PartyRole>,
}

impl Claims {
    /// Extract the user UUID from the `sub` claim.
    pub fn user_id(&self) -> Result<Uuid, String> {
        Uuid::parse_str(&self.sub).map_err(|e| format!("Invalid UUID in sub claim: {e}"))
    }

    pub fn party_role(&self) -> Result<PartyRole, String> {
        self.app_metadata
            .as_ref()
            .and_then(|m| m.party_role)
            .ok_or_else(|| "Token carries no party role".to_string())
    }
}

/// Validate a Supabase JWT and return the decoded claims.
///
/// Supabase signs JWTs with HS256 using the project's JWT secret.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| format!("{:?}", e.kind()))
}
