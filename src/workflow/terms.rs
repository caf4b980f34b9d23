//! Offer term validation and evidence link parsing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashSet;
use url::Url;

use crate::error::{AppResult, ValidationErrors};
use crate::models::evidence::SocialLink;
use crate::models::offers::{Platform, Terms};

pub const MIN_OFFER_AMOUNT: Decimal = Decimal::ONE_HUNDRED;
pub const MAX_OFFER_AMOUNT: Decimal = Decimal::from_parts(500_000, 0, 0, false, 0);

/// Checks run on every draft save. Drafts may be incomplete, but never
/// contradictory: the post date cannot precede the review date.
pub fn validate_draft(offer_name: &str, terms: &Terms) -> AppResult<()> {
    let mut errors = ValidationErrors::default();

    if offer_name.trim().is_empty() {
        errors.add("offer_name", "must not be empty");
    }
    if terms.proposed_amount.is_sign_negative() {
        errors.add("proposed_amount", "must not be negative");
    } else if terms.proposed_amount > MAX_OFFER_AMOUNT {
        errors.add(
            "proposed_amount",
            format!("must be at most {MAX_OFFER_AMOUNT}"),
        );
    }
    check_date_order(terms, &mut errors);

    errors.into_result()
}

/// Full validation applied on send and on every counter.
pub fn validate_terms(terms: &Terms) -> AppResult<()> {
    let mut errors = ValidationErrors::default();

    if terms.proposed_amount < MIN_OFFER_AMOUNT || terms.proposed_amount > MAX_OFFER_AMOUNT {
        errors.add(
            "proposed_amount",
            format!("must be between {MIN_OFFER_AMOUNT} and {MAX_OFFER_AMOUNT}"),
        );
    }
    if terms.description.trim().is_empty() {
        errors.add("description", "must not be empty");
    }
    if terms.deliverables.is_empty() {
        errors.add("deliverables", "at least one deliverable is required");
    } else if has_duplicates(&terms.deliverables) {
        errors.add("deliverables", "must not repeat a platform");
    }
    if terms.desired_review_date.is_none() {
        errors.add("desired_review_date", "is required");
    }
    if terms.desired_post_date.is_none() {
        errors.add("desired_post_date", "is required");
    }
    check_date_order(terms, &mut errors);
    check_milestone_plan(terms, &mut errors);

    errors.into_result()
}

/// Send-time validation: complete terms plus the sender's agreement.
pub fn validate_for_send(terms: &Terms, agreed_to_terms: bool) -> AppResult<()> {
    let mut errors = match validate_terms(terms) {
        Ok(()) => ValidationErrors::default(),
        Err(crate::error::AppError::Validation(errors)) => errors,
        Err(other) => return Err(other),
    };
    if !agreed_to_terms {
        errors.add("agreed_to_terms", "the terms of service must be accepted");
    }
    errors.into_result()
}

fn check_date_order(terms: &Terms, errors: &mut ValidationErrors) {
    if let (Some(review), Some(post)) = (terms.desired_review_date, terms.desired_post_date) {
        if post < review {
            errors.add(
                "desired_post_date",
                format!("{post} is before the review date {review}"),
            );
        }
    }
}

fn check_milestone_plan(terms: &Terms, errors: &mut ValidationErrors) {
    if terms.milestone_plan.is_empty() {
        return;
    }

    let offered: HashSet<Platform> = terms.deliverables.iter().copied().collect();
    let mut total = Decimal::ZERO;
    for (i, planned) in terms.milestone_plan.iter().enumerate() {
        let field = format!("milestone_plan[{i}]");
        if planned.name.trim().is_empty() {
            errors.add(format!("{field}.name"), "must not be empty");
        }
        if planned.amount <= Decimal::ZERO {
            errors.add(format!("{field}.amount"), "must be positive");
        }
        if planned.deliverables.is_empty() {
            errors.add(format!("{field}.deliverables"), "must not be empty");
        }
        if planned.deliverables.iter().any(|p| !offered.contains(p)) {
            errors.add(
                format!("{field}.deliverables"),
                "must be a subset of the offer deliverables",
            );
        }
        total += planned.amount;
    }
    if total != terms.proposed_amount {
        errors.add(
            "milestone_plan",
            format!(
                "amounts sum to {total}, expected {}",
                terms.proposed_amount
            ),
        );
    }
}

fn has_duplicates(platforms: &[Platform]) -> bool {
    let mut seen = HashSet::new();
    platforms.iter().any(|p| !seen.insert(*p))
}

/// Whole cents, rounding half away from zero.
pub fn to_cents(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED).round().to_i64()
}

/// Parse post links submitted as evidence. Only absolute http(s) URLs
/// are accepted.
pub fn parse_social_links(raw: &[String], now: DateTime<Utc>) -> AppResult<Vec<SocialLink>> {
    let mut errors = ValidationErrors::default();
    let mut links = Vec::with_capacity(raw.len());

    for (i, value) in raw.iter().enumerate() {
        match Url::parse(value.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
                links.push(SocialLink {
                    platform: platform_for_host(url.host_str().unwrap_or_default()),
                    url: url.to_string(),
                    added_at: now,
                });
            }
            Ok(_) => errors.add(format!("social_links[{i}]"), "must be an http(s) URL"),
            Err(e) => errors.add(format!("social_links[{i}]"), e.to_string()),
        }
    }

    errors.into_result()?;
    Ok(links)
}

fn platform_for_host(host: &str) -> Option<Platform> {
    let host = host.trim_start_matches("www.").trim_start_matches("m.");
    let matches = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

    if matches("instagram.com") {
        Some(Platform::Instagram)
    } else if matches("tiktok.com") {
        Some(Platform::Tiktok)
    } else if matches("youtube.com") || matches("youtu.be") {
        Some(Platform::Youtube)
    } else if matches("twitter.com") || matches("x.com") {
        Some(Platform::Twitter)
    } else if matches("facebook.com") || matches("fb.watch") {
        Some(Platform::Facebook)
    } else if matches("linkedin.com") {
        Some(Platform::Linkedin)
    } else if matches("snapchat.com") {
        Some(Platform::Snapchat)
    } else if matches("pinterest.com") || matches("pin.it") {
        Some(Platform::Pinterest)
    } else if matches("twitch.tv") {
        Some(Platform::Twitch)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::offers::PlannedMilestone;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, d).unwrap()
    }

    fn terms(amount: i64) -> Terms {
        Terms {
            proposed_amount: Decimal::from(amount),
            description: "Two reels and a story".to_string(),
            deliverables: vec![Platform::Instagram, Platform::Tiktok],
            desired_review_date: Some(date(10)),
            desired_post_date: Some(date(12)),
            milestone_plan: vec![],
        }
    }

    fn fields(err: AppError) -> ValidationErrors {
        match err {
            AppError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn amount_bounds_are_inclusive() {
        assert!(validate_terms(&terms(100)).is_ok());
        assert!(validate_terms(&terms(500_000)).is_ok());

        let low = fields(validate_terms(&terms(50)).unwrap_err());
        assert!(low.has_field("proposed_amount"));
        assert!(validate_terms(&terms(500_001)).is_err());
    }

    #[test]
    fn post_date_before_review_date_is_rejected_even_in_drafts() {
        let mut t = terms(500);
        t.desired_post_date = Some(date(9));

        assert!(fields(validate_draft("Launch", &t).unwrap_err()).has_field("desired_post_date"));
        assert!(fields(validate_terms(&t).unwrap_err()).has_field("desired_post_date"));
    }

    #[test]
    fn drafts_may_be_incomplete() {
        let t = Terms {
            proposed_amount: Decimal::ZERO,
            description: String::new(),
            deliverables: vec![],
            desired_review_date: None,
            desired_post_date: None,
            milestone_plan: vec![],
        };
        assert!(validate_draft("Untitled", &t).is_ok());

        let errors = fields(validate_terms(&t).unwrap_err());
        for field in ["proposed_amount", "description", "deliverables", "desired_review_date"] {
            assert!(errors.has_field(field), "missing {field}");
        }
    }

    #[test]
    fn send_requires_agreement() {
        let errors = fields(validate_for_send(&terms(500), false).unwrap_err());
        assert_eq!(errors.0.len(), 1);
        assert!(errors.has_field("agreed_to_terms"));
    }

    #[test]
    fn milestone_plan_must_sum_to_amount_and_stay_within_deliverables() {
        let mut t = terms(1000);
        t.milestone_plan = vec![
            PlannedMilestone {
                name: "Reels".into(),
                amount: Decimal::from(600),
                deliverables: vec![Platform::Instagram],
                due_date: None,
            },
            PlannedMilestone {
                name: "Video".into(),
                amount: Decimal::from(300),
                deliverables: vec![Platform::Youtube],
                due_date: None,
            },
        ];

        let errors = fields(validate_terms(&t).unwrap_err());
        assert!(errors.has_field("milestone_plan"));
        assert!(errors.has_field("milestone_plan[1].deliverables"));
    }

    #[test]
    fn social_links_must_be_http_urls() {
        let now = Utc::now();
        let links = parse_social_links(
            &[
                "https://www.instagram.com/p/abc".to_string(),
                "https://example.com/post".to_string(),
            ],
            now,
        )
        .unwrap();
        assert_eq!(links[0].platform, Some(Platform::Instagram));
        assert_eq!(links[1].platform, None);

        let err = parse_social_links(&["ftp://files.example.com/x".to_string()], now);
        assert!(fields(err.unwrap_err()).has_field("social_links[0]"));
    }

    #[test]
    fn cents_round_half_away_from_zero() {
        assert_eq!(to_cents(Decimal::new(12345, 3)), Some(1235));
        assert_eq!(to_cents(Decimal::from(500)), Some(50_000));
    }
}
