//! HTTP surface: bearer auth, JSON shapes and error categories, served
//! from the in-memory store.
//!
//! Run with: `cargo test --test http_test`
mod common;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};

use collab_backend::auth::JwtSecret;
use collab_backend::auth::jwt::{AppMetadata, Claims};
use collab_backend::handlers;
use collab_backend::models::offers::PartyRole;
use collab_backend::workflow::Actor;

use common::Harness;

const TEST_SECRET: &str = "test-secret-at-least-256-bits-long-for-hs256-xxxxxxx";

fn bearer(actor: Actor) -> (&'static str, String) {
    bearer_with_role(actor, Some(actor.role))
}

fn bearer_with_role(actor: Actor, party_role: Option<PartyRole>) -> (&'static str, String) {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: actor.id.to_string(),
        exp: now + 3600,
        iat: Some(now),
        iss: None,
        email: None,
        role: Some("authenticated".to_string()),
        app_metadata: Some(AppMetadata { party_role }),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("Failed to encode test JWT");
    ("Authorization", format!("Bearer {token}"))
}

fn draft_body(h: &Harness, amount: &str) -> Value {
    json!({
        "counterpart_id": h.creator.id,
        "offer_name": "Spring launch",
        "offer_type": "custom",
        "terms": {
            "proposed_amount": amount,
            "description": "Two posts and a story",
            "deliverables": ["instagram"],
            "desired_review_date": "2026-03-01",
            "desired_post_date": "2026-03-05"
        },
        "agreed_to_terms": true
    })
}

macro_rules! app {
    ($h:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($h.state.clone()))
                .app_data(web::Data::new(JwtSecret(TEST_SECRET.to_string())))
                .service(web::scope("/api").configure(handlers::init_routes)),
        )
        .await
    };
}

#[actix_web::test]
async fn test_draft_send_and_history_round_trip() {
    let h = Harness::new();
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/api/offers")
        .insert_header(bearer(h.marketer))
        .set_json(draft_body(&h, "500"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let offer: Value = test::read_body_json(resp).await;
    assert_eq!(offer["status"], "draft");
    let id = offer["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/offers/{id}/send"))
        .insert_header(bearer(h.marketer))
        .set_json(json!({ "version": offer["version"] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let sent: Value = test::read_body_json(resp).await;
    assert_eq!(sent["status"], "sent");
    assert_eq!(sent["awaiting"], "creator");

    let req = test::TestRequest::post()
        .uri(&format!("/api/offers/{id}/respond"))
        .insert_header(bearer(h.creator))
        .set_json(json!({
            "version": sent["version"],
            "action": "counter",
            "terms": {
                "proposed_amount": "600",
                "description": "Two posts and a story",
                "deliverables": ["instagram"],
                "desired_review_date": "2026-03-01",
                "desired_post_date": "2026-03-05"
            }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let countered: Value = test::read_body_json(resp).await;
    assert_eq!(countered["awaiting"], "marketer");

    let req = test::TestRequest::get()
        .uri(&format!("/api/offers/{id}/history"))
        .insert_header(bearer(h.creator))
        .to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(history["events"].as_array().unwrap().len(), 2);
    assert_eq!(history["events"][1]["action"], "countered");
    assert_eq!(history["replay"]["status"], "sent");
    assert_eq!(history["replay"]["terms"]["proposed_amount"], "600");
}

#[actix_web::test]
async fn test_requests_without_a_party_are_refused() {
    let h = Harness::new();
    let app = app!(h);

    let req = test::TestRequest::get().uri("/api/offers").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/offers")
        .insert_header(bearer_with_role(h.creator, None))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/offers")
        .insert_header(("Authorization", "Bearer not.a.jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_errors_carry_a_distinct_category() {
    let h = Harness::new();
    let app = app!(h);
    let draft = h.save(h.draft(50)).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/offers/{}/send", draft.id))
        .insert_header(bearer(h.marketer))
        .set_json(json!({ "version": draft.version }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["category"], "validation");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["field"].as_str())
        .collect();
    assert!(fields.contains(&"proposed_amount"));

    let req = test::TestRequest::post()
        .uri(&format!("/api/offers/{}/send", draft.id))
        .insert_header(bearer(h.marketer))
        .set_json(json!({ "version": draft.version + 3 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["category"], "stale_version");
    assert_eq!(body["details"]["current_version"], draft.version);

    h.payments.decline("insufficient funds");
    let valid = h.save(h.draft(500)).await;
    let req = test::TestRequest::post()
        .uri(&format!("/api/offers/{}/send", valid.id))
        .insert_header(bearer(h.marketer))
        .set_json(json!({ "version": valid.version }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["category"], "payment_failed");
}

#[actix_web::test]
async fn test_milestone_submission_and_review_over_http() {
    let h = Harness::new();
    let app = app!(h);
    let view = h.accepted_deal(h.draft(500)).await;
    let milestone = &view.milestones[0];

    let req = test::TestRequest::post()
        .uri("/api/submissions")
        .insert_header(bearer(h.creator))
        .set_json(json!({
            "target": "milestone",
            "milestone_id": milestone.id,
            "version": milestone.version,
            "files": [{
                "file_name": "reel-cover.png",
                "mime_type": "image/png",
                "data": STANDARD.encode([1u8, 2, 3, 4])
            }],
            "social_links": ["https://www.instagram.com/p/abc/"]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let receipt: Value = test::read_body_json(resp).await;
    assert_eq!(receipt["kind"], "milestone");
    assert_eq!(receipt["record"]["status"], "submitted");
    let version = receipt["record"]["version"].clone();

    let req = test::TestRequest::post()
        .uri(&format!("/api/milestones/{}/review", milestone.id))
        .insert_header(bearer(h.marketer))
        .set_json(json!({
            "version": version,
            "decision": "reject",
            "feedback": "needs higher resolution"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let reviewed: Value = test::read_body_json(resp).await;
    assert_eq!(reviewed["status"], "rejected");

    let req = test::TestRequest::post()
        .uri("/api/submissions")
        .insert_header(bearer(h.creator))
        .set_json(json!({
            "target": "milestone",
            "milestone_id": milestone.id,
            "version": reviewed["version"],
            "files": [{ "file_name": "a.png", "mime_type": "image/png", "data": "%%%" }]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::get()
        .uri(&format!("/api/deals/by-offer/{}", view.deal.offer_id))
        .insert_header(bearer(h.marketer))
        .to_request();
    let deal: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(deal["status"], "active");
    assert_eq!(deal["milestones"][0]["status"], "rejected");
}
