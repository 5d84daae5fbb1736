//! Failure injection tests for the dispatch pipeline against mock vendors.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use mail_dispatch::config::ConfigError;
use mail_dispatch::lifecycle::build_service;
use mail_dispatch::provider::ProviderError;
use mail_dispatch::resilience::{CallError, CircuitState};
use mail_dispatch::{Attachment, DispatchConfig, DispatchError, ProviderRegistry};

mod common;

#[tokio::test]
async fn test_retry_until_vendor_recovers() {
    let vendor = common::start_programmable_vendor(|n| async move {
        if n <= 2 {
            (503, "Service Unavailable".into())
        } else {
            (202, String::new())
        }
    })
    .await;

    let service = build_service(&common::sendgrid_config(&vendor), &ProviderRegistry::default()).unwrap();
    let receipt = service
        .send_email("user@example.com", "Welcome", "<p>Hello</p>", "Hello", Vec::new())
        .await
        .expect("should succeed after retries");

    assert_eq!(receipt.provider, "SendGrid");
    assert_eq!(receipt.attempts, 3);
    assert_eq!(vendor.request_count(), 3);

    let request = &vendor.requests()[0];
    assert_eq!(request.path, "/v3/mail/send");
    assert_eq!(request.header("authorization"), Some("Bearer SG.test-key"));
    let body = request.json();
    assert_eq!(body["personalizations"][0]["to"][0]["email"], "user@example.com");
    assert_eq!(body["from"]["email"], "alerts@example.com");
    assert_eq!(body["content"][0]["type"], "text/plain");
    assert_eq!(body["content"][1]["value"], "<p>Hello</p>");
}

#[tokio::test]
async fn test_persistent_failure_exhausts_retries() {
    let vendor = common::start_programmable_vendor(|_| async { (500, "boom".into()) }).await;

    let service = build_service(&common::sendgrid_config(&vendor), &ProviderRegistry::default()).unwrap();
    let err = service
        .send_email("user@example.com", "Welcome", "", "Hello", Vec::new())
        .await
        .unwrap_err();

    match err {
        DispatchError::RetryExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            match last {
                CallError::Failed(ProviderError::Rejected { status, body }) => {
                    assert_eq!(status, 500);
                    assert_eq!(body, "boom");
                }
                other => panic!("unexpected cause: {other:?}"),
            }
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(vendor.request_count(), 3);
}

#[tokio::test]
async fn test_open_breaker_short_circuits_vendor() {
    let vendor = common::start_mock_vendor(500).await;

    let mut config = common::sendgrid_config(&vendor);
    config.retry.max_attempts = 1;
    config.breaker.volume_threshold = 4;
    config.breaker.reset_timeout_ms = 60_000;
    let service = build_service(&config, &ProviderRegistry::default()).unwrap();

    for _ in 0..4 {
        let err = service
            .send_email("user@example.com", "Report", "", "body", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err.last_cause(), Some(CallError::Failed(_))));
    }
    assert_eq!(service.breaker_state(), CircuitState::Open);

    let err = service
        .send_email("user@example.com", "Report", "", "body", Vec::new())
        .await
        .unwrap_err();
    assert!(err.last_cause().is_some_and(|c| c.is_open()));
    assert_eq!(vendor.request_count(), 4, "open breaker must not reach the vendor");
}

#[tokio::test]
async fn test_half_open_trial_closes_breaker() {
    let vendor = common::start_programmable_vendor(|n| async move {
        if n <= 4 {
            (502, "Bad Gateway".into())
        } else {
            (202, String::new())
        }
    })
    .await;

    let mut config = common::sendgrid_config(&vendor);
    config.retry.max_attempts = 1;
    config.breaker.volume_threshold = 4;
    config.breaker.reset_timeout_ms = 200;
    let service = build_service(&config, &ProviderRegistry::default()).unwrap();

    for _ in 0..4 {
        assert!(service
            .send_email("user@example.com", "Digest", "", "body", Vec::new())
            .await
            .is_err());
    }
    assert_eq!(service.breaker_state(), CircuitState::Open);

    common::pause(300).await;

    let receipt = service
        .send_email("user@example.com", "Digest", "", "body", Vec::new())
        .await
        .expect("trial call should reach the recovered vendor");
    assert_eq!(receipt.attempts, 1);
    assert_eq!(service.breaker_state(), CircuitState::Closed);
    assert_eq!(vendor.request_count(), 5);
}

#[tokio::test]
async fn test_slow_vendor_counts_as_timeout() {
    let vendor = common::start_programmable_vendor(|_| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        (202, String::new())
    })
    .await;

    let mut config = common::sendgrid_config(&vendor);
    config.retry.max_attempts = 1;
    config.breaker.timeout_ms = 100;
    let service = build_service(&config, &ProviderRegistry::default()).unwrap();

    let err = service
        .send_email("user@example.com", "Slow", "", "body", Vec::new())
        .await
        .unwrap_err();

    assert!(err.last_cause().is_some_and(|c| c.is_timeout()));
    assert_eq!(service.breaker_snapshot().failures, 1);
}

#[tokio::test]
async fn test_mailgun_request_shape() {
    let vendor = common::start_mock_vendor(200).await;

    let mut config = DispatchConfig::default();
    config.provider.name = "mailgun".to_string();
    config.provider.mailgun.api_key = Some("key-123".to_string());
    config.provider.mailgun.domain = Some("mg.example.com".to_string());
    config.provider.mailgun.base_url = vendor.base_url();
    let service = build_service(&config, &ProviderRegistry::default()).unwrap();

    let receipt = service
        .send_email(
            "user@example.com",
            "Invoice",
            "<p>Attached</p>",
            "Attached",
            vec![Attachment::new("invoice.pdf", b"%PDF-1.4".to_vec(), "application/pdf")],
        )
        .await
        .unwrap();
    assert_eq!(receipt.provider, "Mailgun");

    let request = &vendor.requests()[0];
    assert_eq!(request.path, "/v3/mg.example.com/messages");
    let expected_auth = format!("Basic {}", STANDARD.encode("api:key-123"));
    assert_eq!(request.header("authorization"), Some(expected_auth.as_str()));
    assert!(request
        .header("content-type")
        .is_some_and(|ct| ct.starts_with("multipart/form-data")));

    let body = request.body_text();
    assert!(body.contains("name=\"subject\""));
    assert!(body.contains("Invoice"));
    assert!(body.contains("filename=\"invoice.pdf\""));
}

#[tokio::test]
async fn test_malformed_attachment_rejected_before_mailgun() {
    let vendor = common::start_mock_vendor(200).await;

    let mut config = DispatchConfig::default();
    config.provider.name = "mailgun".to_string();
    config.provider.mailgun.api_key = Some("key-123".to_string());
    config.provider.mailgun.domain = Some("mg.example.com".to_string());
    config.provider.mailgun.base_url = vendor.base_url();
    config.retry.max_attempts = 1;
    config.breaker.volume_threshold = 2;
    let service = build_service(&config, &ProviderRegistry::default()).unwrap();

    for _ in 0..5 {
        let err = service
            .send_email(
                "user@example.com",
                "Invoice",
                "",
                "Attached",
                vec![Attachment::new("invoice.pdf", b"%PDF".to_vec(), "pdf please")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidMessage(_)), "{err:?}");
    }

    assert_eq!(vendor.request_count(), 0);
    assert_eq!(service.breaker_state(), CircuitState::Closed);
    assert_eq!(service.breaker_snapshot().failures, 0);
}

#[tokio::test]
async fn test_postmark_request_shape() {
    let vendor = common::start_mock_vendor(200).await;

    let mut config = DispatchConfig::default();
    config.provider.name = "Postmark".to_string();
    config.provider.postmark.server_token = Some("pm-token".to_string());
    config.provider.postmark.base_url = vendor.base_url();
    let service = build_service(&config, &ProviderRegistry::default()).unwrap();

    service
        .send_email("user@example.com", "Receipt", "<b>Thanks</b>", "Thanks", Vec::new())
        .await
        .unwrap();

    let request = &vendor.requests()[0];
    assert_eq!(request.path, "/email");
    assert_eq!(request.header("x-postmark-server-token"), Some("pm-token"));
    let body = request.json();
    assert_eq!(body["To"], "user@example.com");
    assert_eq!(body["Subject"], "Receipt");
    assert_eq!(body["HtmlBody"], "<b>Thanks</b>");
}

#[tokio::test]
async fn test_vendor_rejection_body_is_preserved() {
    let vendor = common::start_programmable_vendor(|_| async {
        (400, r#"{"errors":[{"message":"invalid from"}]}"#.into())
    })
    .await;

    let mut config = common::sendgrid_config(&vendor);
    config.retry.max_attempts = 2;
    let service = build_service(&config, &ProviderRegistry::default()).unwrap();

    let err = service
        .send_email("user@example.com", "Hi", "", "Hi", Vec::new())
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("after 2 attempts"), "{message}");
    assert!(message.contains("invalid from"), "{message}");
}

#[test]
fn test_missing_credentials_are_fatal() {
    let config = DispatchConfig::default();
    let err = build_service(&config, &ProviderRegistry::default()).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::MissingSetting { setting: "sendgrid.api_key", .. }
    ));
}

#[test]
fn test_custom_provider_can_be_registered() {
    use async_trait::async_trait;
    use mail_dispatch::{EmailMessage, ProviderAdapter};

    struct Discard;

    #[async_trait]
    impl ProviderAdapter for Discard {
        fn name(&self) -> &'static str {
            "Discard"
        }

        async fn send(&self, _message: &EmailMessage) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    let mut registry = ProviderRegistry::with_builtin();
    registry.register("Discard", |_, _| Ok(Arc::new(Discard)));

    let mut config = DispatchConfig::default();
    config.provider.name = "DISCARD".to_string();
    let service = build_service(&config, &registry).unwrap();
    assert_eq!(service.provider(), "Discard");
}
