//! Integration tests for `POST /api/v1/voice/generate`.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use artforge_core::credit::CreditAccount;
use artforge_providers::resolver::ServerMode;

use common::{
    bearer_token, body_json, default_account, post_json, test_config, MockBehavior, MockProvider,
    TestHarness,
};

const USER: i64 = 7;

fn hosted_harness_with(account: CreditAccount) -> TestHarness {
    TestHarness::new(test_config(ServerMode::Hosted), account)
}

// ---------------------------------------------------------------------------
// Standard tier
// ---------------------------------------------------------------------------

#[tokio::test]
async fn standard_tier_without_credential_falls_back() {
    let mut config = test_config(ServerMode::SelfHosted);
    config.providers.playht_api_key = None;
    let harness = TestHarness::new(config, default_account(USER));
    let provider = MockProvider::new("playht", MockBehavior::VoiceOk);
    let app = harness.build_app(vec![provider.clone()]);

    let response = post_json(
        app,
        "/api/v1/voice/generate",
        json!({ "text": "hello adventurer", "voice": "nova", "tier": "standard" }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["fallback"], true);
    assert_eq!(body["text"], "hello adventurer");
    assert_eq!(body["speed"], 1.0);
    assert!(body["message"].is_string());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn standard_tier_falls_back_when_provider_sheds_load() {
    let harness = TestHarness::new(test_config(ServerMode::SelfHosted), default_account(USER));
    let app = harness.build_app(vec![MockProvider::new("playht", MockBehavior::FailApi(429))]);

    let response = post_json(
        app,
        "/api/v1/voice/generate",
        json!({ "text": "hello adventurer", "voice": "nova", "tier": "standard", "speed": 1.25 }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["fallback"], true);
    assert_eq!(body["speed"], 1.25);
}

#[tokio::test]
async fn standard_tier_returns_audio_when_provider_healthy() {
    let harness = TestHarness::new(test_config(ServerMode::SelfHosted), default_account(USER));
    let app = harness.build_app(vec![MockProvider::new("playht", MockBehavior::VoiceOk)]);

    let response = post_json(
        app,
        "/api/v1/voice/generate",
        json!({ "text": "hello adventurer", "voice": "nova", "tier": "standard" }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["format"], "wav");
    assert_eq!(body["creditsUsed"], 0);
    assert!(body["audioBase64"].is_string());
}

#[tokio::test]
async fn standard_tier_hard_failure_is_an_error_not_fallback() {
    let harness = TestHarness::new(test_config(ServerMode::SelfHosted), default_account(USER));
    let app = harness.build_app(vec![MockProvider::new("playht", MockBehavior::FailApi(500))]);

    let response = post_json(
        app,
        "/api/v1/voice/generate",
        json!({ "text": "hello adventurer", "voice": "nova", "tier": "standard" }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
}

// ---------------------------------------------------------------------------
// HD tier
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hd_success_costs_one_credit() {
    let harness = hosted_harness_with(CreditAccount {
        user_id: USER,
        monthly_alloc: 5,
        monthly_used: 0,
        top_up_credits: 0,
    });
    let app = harness.build_app(vec![MockProvider::new("playht", MockBehavior::VoiceOk)]);

    let response = post_json(
        app,
        "/api/v1/voice/generate",
        json!({ "text": "hello adventurer", "voice": "nova", "tier": "hd" }),
        Some(&bearer_token(USER)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["creditsUsed"], 1);
    assert_eq!(body["hdCreditsRemaining"], 4);
    assert_eq!(body["format"], "wav");
    assert_eq!(body["durationEstimate"], 1.5);
    assert_eq!(harness.credits.snapshot(USER).monthly_used, 1);
}

#[tokio::test]
async fn hd_draws_from_top_up_when_monthly_exhausted() {
    // Monthly exhausted, three top-up credits banked.
    let harness = hosted_harness_with(CreditAccount {
        user_id: USER,
        monthly_alloc: 5,
        monthly_used: 5,
        top_up_credits: 3,
    });
    let app = harness.build_app(vec![MockProvider::new("playht", MockBehavior::VoiceOk)]);

    let response = post_json(
        app,
        "/api/v1/voice/generate",
        json!({ "text": "hello adventurer", "voice": "nova", "tier": "hd" }),
        Some(&bearer_token(USER)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let account = harness.credits.snapshot(USER);
    assert_eq!(account.top_up_credits, 2);
    assert_eq!(account.monthly_used, 5);
}

#[tokio::test]
async fn hd_timeout_refunds_the_reservation_and_returns_502() {
    // Provider timeout after the reservation: the monthly debit must be
    // reversed and the caller gets a 502 with no audio payload.
    let harness = hosted_harness_with(CreditAccount {
        user_id: USER,
        monthly_alloc: 5,
        monthly_used: 0,
        top_up_credits: 0,
    });
    let app = harness.build_app(vec![MockProvider::new("playht", MockBehavior::Timeout)]);

    let response = post_json(
        app,
        "/api/v1/voice/generate",
        json!({ "text": "hello adventurer", "voice": "nova", "tier": "hd" }),
        Some(&bearer_token(USER)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
    assert!(body.get("audioBase64").is_none());
    assert_eq!(harness.credits.snapshot(USER).monthly_used, 0);
}

#[tokio::test]
async fn hd_refund_goes_back_to_the_same_source() {
    let harness = hosted_harness_with(CreditAccount {
        user_id: USER,
        monthly_alloc: 5,
        monthly_used: 5,
        top_up_credits: 2,
    });
    let app = harness.build_app(vec![MockProvider::new("playht", MockBehavior::FailApi(500))]);

    let response = post_json(
        app,
        "/api/v1/voice/generate",
        json!({ "text": "hello adventurer", "voice": "nova", "tier": "hd" }),
        Some(&bearer_token(USER)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let account = harness.credits.snapshot(USER);
    assert_eq!(account.top_up_credits, 2);
    assert_eq!(account.monthly_used, 5);
}

#[tokio::test]
async fn hd_with_empty_ledger_is_402_before_any_provider_call() {
    let harness = hosted_harness_with(CreditAccount {
        user_id: USER,
        monthly_alloc: 5,
        monthly_used: 5,
        top_up_credits: 0,
    });
    let provider = MockProvider::new("playht", MockBehavior::VoiceOk);
    let app = harness.build_app(vec![provider.clone()]);

    let response = post_json(
        app,
        "/api/v1/voice/generate",
        json!({ "text": "hello adventurer", "voice": "nova", "tier": "hd" }),
        Some(&bearer_token(USER)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn hd_requires_authentication_in_hosted_mode() {
    let harness = hosted_harness_with(default_account(USER));
    let app = harness.build_app(vec![MockProvider::new("playht", MockBehavior::VoiceOk)]);

    let response = post_json(
        app,
        "/api/v1/voice/generate",
        json!({ "text": "hello adventurer", "voice": "nova", "tier": "hd" }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn over_long_text_is_rejected_with_400() {
    let harness = TestHarness::new(test_config(ServerMode::SelfHosted), default_account(USER));
    let app = harness.build_app(vec![MockProvider::new("playht", MockBehavior::VoiceOk)]);

    let response = post_json(
        app,
        "/api/v1/voice/generate",
        json!({ "text": "x".repeat(501), "voice": "nova", "tier": "standard" }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_tier_is_rejected_with_400() {
    let harness = TestHarness::new(test_config(ServerMode::SelfHosted), default_account(USER));
    let app = harness.build_app(vec![MockProvider::new("playht", MockBehavior::VoiceOk)]);

    let response = post_json(
        app,
        "/api/v1/voice/generate",
        json!({ "text": "hello", "voice": "nova", "tier": "ultra" }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn out_of_range_speed_is_clamped() {
    let mut config = test_config(ServerMode::SelfHosted);
    config.providers.playht_api_key = None;
    let harness = TestHarness::new(config, default_account(USER));
    let app = harness.build_app(vec![MockProvider::new("playht", MockBehavior::VoiceOk)]);

    // Fallback echoes the normalized speed, making the clamp observable.
    let response = post_json(
        app,
        "/api/v1/voice/generate",
        json!({ "text": "hello", "voice": "nova", "tier": "standard", "speed": 9.0 }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["speed"], 2.0);
}
