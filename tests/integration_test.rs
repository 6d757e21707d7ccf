//! End-to-end tests against a running quakemesh server.
//!
//! Point `BASE_URL` at a deployment backed by an empty (or resettable)
//! database. The pipeline test drives the full ingestion → correlation →
//! alert → resolution cycle through the public HTTP surface, so it assumes
//! the demonstration configuration: quorum 2, window 10 s, cool-down 5 s.

use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use uuid::Uuid;

use quakemesh::models::{AlertStatus, ReportOutcome, ReportSubmission, StatusResponse};

const OPERATOR_TOKEN: &str = "test-operator-token";

fn base_url() -> String {
    std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into())
}

fn submission(device: Uuid, lat: f64, lng: f64, magnitude: f32) -> ReportSubmission {
    // ---
    ReportSubmission {
        device_uuid: device,
        latitude: lat,
        longitude: lng,
        magnitude,
    }
}

async fn resolve(client: &Client, base: &str) -> Result<()> {
    // ---
    let res = client
        .post(format!("{}/seismic/resolve", base))
        .bearer_auth(OPERATOR_TOKEN)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

async fn report(
    client: &Client,
    base: &str,
    submission: &ReportSubmission,
) -> Result<ReportOutcome> {
    // ---
    let res = client
        .post(format!("{}/seismic/report", base))
        .json(submission)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK, "submission should be accepted");
    Ok(res.json().await?)
}

async fn status(client: &Client, base: &str) -> Result<StatusResponse> {
    // ---
    Ok(client
        .get(format!("{}/seismic/status", base))
        .send()
        .await?
        .json()
        .await?)
}

// ---

/// Full detection cycle: below-quorum SAFE, quorum CRITICAL with event
/// detail, idempotent resolution, a truly reset window afterwards, and
/// expiry of readings that age past the trailing window.
/// Runs as one sequential test because the scenarios share global state.
#[tokio::test]
async fn full_detection_cycle() -> Result<()> {
    // ---
    let base = base_url();
    let client = Client::new();

    // Start from a clean slate.
    resolve(&client, &base).await?;

    let d1 = Uuid::new_v4();
    let d2 = Uuid::new_v4();

    // One device below quorum: advisory SAFE, global state stays SAFE.
    let outcome = report(&client, &base, &submission(d1, 23.78, 90.40, 0.4)).await?;
    assert_eq!(outcome.status, AlertStatus::Safe);
    assert_eq!(outcome.distinct_device_count, 1);
    assert_eq!(status(&client, &base).await?.status, AlertStatus::Safe);

    // Second distinct device inside the window crosses quorum.
    let outcome = report(&client, &base, &submission(d2, 23.81, 90.41, 0.4)).await?;
    assert_eq!(outcome.status, AlertStatus::Critical);
    assert!(outcome.distinct_device_count >= 2);

    // Authoritative state flips, with the event detail attached. Epicenter
    // is the quorum-crossing submission's location.
    let polled = status(&client, &base).await?;
    assert_eq!(polled.status, AlertStatus::Critical);
    let event = polled.event.expect("CRITICAL status must carry event detail");
    assert_eq!(event.event_type, "Earthquake");
    assert!((event.epicenter_lat - 23.81).abs() < 1e-9);
    assert!((event.epicenter_lng - 90.41).abs() < 1e-9);

    // Resolution resets everything, and is idempotent.
    resolve(&client, &base).await?;
    resolve(&client, &base).await?;
    let polled = status(&client, &base).await?;
    assert_eq!(polled.status, AlertStatus::Safe);
    assert!(polled.event.is_none());

    // Window was truly reset: a single fresh device does not re-trigger.
    let d3 = Uuid::new_v4();
    let outcome = report(&client, &base, &submission(d3, 23.79, 90.39, 0.6)).await?;
    assert_eq!(outcome.status, AlertStatus::Safe);
    assert_eq!(outcome.distinct_device_count, 1);
    assert_eq!(status(&client, &base).await?.status, AlertStatus::Safe);

    // Same identity again, immediately: the server-side cool-down rejects
    // the reading (the device row is reused, never forked).
    let res = client
        .post(format!("{}/seismic/report", base))
        .json(&submission(d3, 23.79, 90.39, 0.6))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    // The rejected reading contributed nothing to the window.
    let d4 = Uuid::new_v4();
    let outcome = report(&client, &base, &submission(d4, 23.80, 90.42, 0.5)).await?;
    assert!(outcome.distinct_device_count >= 2, "d3 and d4 both counted");

    // Window expiry: a first device reports, then a second one only after
    // the 10 s window has fully elapsed. The first reading has aged out, so
    // the second submission sees a single distinct device and the system
    // never leaves SAFE.
    resolve(&client, &base).await?;
    let d5 = Uuid::new_v4();
    let outcome = report(&client, &base, &submission(d5, 23.77, 90.38, 0.4)).await?;
    assert_eq!(outcome.distinct_device_count, 1);

    tokio::time::sleep(Duration::from_secs(11)).await;

    let d6 = Uuid::new_v4();
    let outcome = report(&client, &base, &submission(d6, 23.82, 90.43, 0.4)).await?;
    assert_eq!(outcome.status, AlertStatus::Safe);
    assert_eq!(
        outcome.distinct_device_count, 1,
        "aged-out reading must not count toward quorum"
    );
    assert_eq!(status(&client, &base).await?.status, AlertStatus::Safe);

    // Leave the deployment SAFE for whoever runs next.
    resolve(&client, &base).await?;
    Ok(())
}

#[tokio::test]
async fn validation_rejects_before_any_write() -> Result<()> {
    // ---
    let base = base_url();
    let client = Client::new();

    let bad = submission(Uuid::new_v4(), 91.0, 90.40, 0.4);
    let res = client
        .post(format!("{}/seismic/report", base))
        .json(&bad)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn resolution_requires_authenticated_caller() -> Result<()> {
    // ---
    let base = base_url();
    let client = Client::new();

    let res = client
        .post(format!("{}/seismic/resolve", base))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn dashboard_reads_respond() -> Result<()> {
    // ---
    let base = base_url();
    let client = Client::new();

    for path in ["/seismic/logs", "/seismic/chart", "/seismic/risk-distribution"] {
        let res = client.get(format!("{}{}", base, path)).send().await?;
        assert_eq!(res.status(), StatusCode::OK, "GET {} should succeed", path);
    }
    Ok(())
}

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    // ---
    let base = base_url();
    let client = Client::new();

    let res = client.get(format!("{}/health", base)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}
