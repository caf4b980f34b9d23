//! JWT validation against a locally minted HS256 token.
//!
//! No running server or database is needed.
//!
//! Run with: `cargo test --test auth_test`
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use uuid::Uuid;

use collab_backend::auth::jwt::{AppMetadata, Claims, validate_token};
use collab_backend::models::offers::PartyRole;

const TEST_SECRET: &str = "test-secret-at-least-256-bits-long-for-hs256-xxxxxxx";

fn claims_for(sub: &str, party_role: Option<PartyRole>, exp_offset: i64) -> Claims {
    let now = Utc::now().timestamp();
    Claims {
        sub: sub.to_string(),
        exp: (now + exp_offset) as usize,
        iat: Some(now as usize),
        iss: Some("https://example.supabase.co/auth/v1".to_string()),
        email: Some("alice@example.com".to_string()),
        role: Some("authenticated".to_string()),
        app_metadata: Some(AppMetadata { party_role }),
    }
}

fn mint(claims: &Claims, secret: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to encode test JWT")
}

#[test]
fn test_valid_token_decodes_correctly() {
    let user_id = Uuid::new_v4();
    let token = mint(
        &claims_for(&user_id.to_string(), Some(PartyRole::Marketer), 3600),
        TEST_SECRET,
    );

    let claims = validate_token(&token, TEST_SECRET).expect("Token should be valid");

    assert_eq!(claims.user_id().unwrap(), user_id);
    assert_eq!(claims.party_role().unwrap(), PartyRole::Marketer);
    assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
}

#[test]
fn test_expired_token_is_rejected() {
    // Well past the 60s default leeway.
    let token = mint(
        &claims_for(&Uuid::new_v4().to_string(), Some(PartyRole::Creator), -300),
        TEST_SECRET,
    );

    let result = validate_token(&token, TEST_SECRET);
    assert!(result.unwrap_err().contains("ExpiredSignature"));
}

#[test]
fn test_wrong_secret_is_rejected() {
    let token = mint(
        &claims_for(&Uuid::new_v4().to_string(), Some(PartyRole::Creator), 3600),
        TEST_SECRET,
    );

    let result = validate_token(&token, "completely-wrong-secret-xxxxxxxxxxxxxxxxxxx");
    assert!(result.unwrap_err().contains("InvalidSignature"));
}

#[test]
fn test_garbage_token_is_rejected() {
    assert!(validate_token("not.a.valid.jwt", TEST_SECRET).is_err());
}

#[test]
fn test_token_without_party_role() {
    let mut claims = claims_for(&Uuid::new_v4().to_string(), None, 3600);
    assert!(claims.party_role().is_err());

    claims.app_metadata = None;
    let token = mint(&claims, TEST_SECRET);
    let decoded = validate_token(&token, TEST_SECRET).expect("Token should be valid");
    assert!(decoded.party_role().is_err());
}

#[test]
fn test_non_uuid_subject_is_rejected() {
    let claims = claims_for("service-account", Some(PartyRole::Creator), 3600);
    assert!(claims.user_id().unwrap_err().contains("Invalid UUID"));
}
