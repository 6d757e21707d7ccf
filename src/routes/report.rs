// src/routes/report.rs
//! Reading ingestion and correlation: `POST /seismic/report`.
//!
//! One submission runs as a single transaction: device registry upsert,
//! server-side cool-down check, reading insert, then the correlation pass
//! that may promote the window into a disaster event and flip the global
//! alert state to CRITICAL. Any failure rolls the whole thing back, so a
//! device row is never created without its reading and a reading is never
//! stored without being correlated.

use axum::{
    extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse, routing::post,
    Json, Router,
};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{friendly_model, AlertStatus, ReportOutcome, ReportSubmission};
use crate::routes::{bearer_token, caller_ref};
use crate::{alert, Config};

/// Event type tag for promoted clusters. Only earthquakes for now.
const EVENT_TYPE_EARTHQUAKE: &str = "Earthquake";

/// Magnitude estimate recorded on promotion until a real estimator exists.
const PLACEHOLDER_EVENT_MAGNITUDE: f32 = 5.0;

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/seismic/report", post(handler))
}

/// Outcome of one ingestion transaction.
enum Ingest {
    Accepted(ReportOutcome),
    /// Device submitted again inside its cool-down window; last-seen was
    /// refreshed but no reading was stored.
    Cooldown,
}

async fn handler(
    State((pool, config)): State<(PgPool, Config)>,
    headers: HeaderMap,
    Json(submission): Json<ReportSubmission>,
) -> impl IntoResponse {
    // ---
    if let Err(reason) = submission.validate() {
        debug!("POST /seismic/report - rejected payload: {}", reason);
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": reason })))
            .into_response();
    }

    // Identity linking degrades to anonymous: a reading is never dropped
    // because the caller's credential could not be resolved. Only the
    // derived opaque reference is persisted, never the credential.
    let user_ref = bearer_token(&headers).map(|token| caller_ref(&token));
    if user_ref.is_none() {
        debug!("POST /seismic/report - anonymous submission");
    }

    let device_model = friendly_model(
        headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(""),
    );

    match ingest(&pool, &config, &submission, &device_model, user_ref.as_deref()).await {
        Ok(Ingest::Accepted(outcome)) => {
            info!(
                "POST /seismic/report - device {} magnitude {:.2}g -> {} ({} distinct devices)",
                submission.device_uuid,
                submission.magnitude,
                outcome.status.as_str(),
                outcome.distinct_device_count
            );
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Ok(Ingest::Cooldown) => {
            warn!(
                "POST /seismic/report - device {} inside cool-down window, reading dropped",
                submission.device_uuid
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({ "error": "device is in its submission cool-down window" })),
            )
                .into_response()
        }
        Err(e) => {
            error!("POST /seismic/report - transaction failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to store reading" })),
            )
                .into_response()
        }
    }
}

// ---

/// Run the full ingestion transaction for one submission.
async fn ingest(
    pool: &PgPool,
    config: &Config,
    submission: &ReportSubmission,
    device_model: &str,
    user_ref: Option<&str>,
) -> Result<Ingest, sqlx::Error> {
    // ---
    let mut tx = pool.begin().await?;

    let device_id = match upsert_device(
        &mut tx,
        submission.device_uuid,
        device_model,
        user_ref,
        config.device_cooldown_secs,
    )
    .await?
    {
        Some(id) => id,
        None => {
            // Commit so the last-seen refresh survives the rejection.
            tx.commit().await?;
            return Ok(Ingest::Cooldown);
        }
    };

    sqlx::query(
        r#"
        INSERT INTO readings (device_id, latitude, longitude, magnitude_g, detected_at)
        VALUES ($1, $2, $3, $4, NOW())
        "#,
    )
    .bind(device_id)
    .bind(submission.latitude)
    .bind(submission.longitude)
    .bind(submission.magnitude)
    .execute(&mut *tx)
    .await?;

    let distinct_device_count = correlate(&mut tx, config, submission).await?;

    tx.commit().await?;

    let status = if distinct_device_count >= i64::from(config.quorum_threshold) {
        AlertStatus::Critical
    } else {
        AlertStatus::Safe
    };

    Ok(Ingest::Accepted(ReportOutcome {
        status,
        distinct_device_count,
    }))
}

/// Look up or create the device row for a stable client identity.
///
/// The lookup takes a row lock so concurrent submissions from one device
/// serialize on the cool-down check. Returns `None` when the device is
/// still inside its cool-down window (last-seen is refreshed regardless;
/// the same identity must never fork into two rows).
async fn upsert_device(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    client_uuid: Uuid,
    device_model: &str,
    user_ref: Option<&str>,
    cooldown_secs: u32,
) -> Result<Option<i64>, sqlx::Error> {
    // ---
    let existing: Option<(i64, bool)> = sqlx::query_as(
        r#"
        SELECT device_id, last_seen > NOW() - make_interval(secs => $2) AS in_cooldown
        FROM devices
        WHERE client_uuid = $1
        FOR UPDATE
        "#,
    )
    .bind(client_uuid)
    .bind(f64::from(cooldown_secs))
    .fetch_optional(&mut **tx)
    .await?;

    match existing {
        Some((device_id, in_cooldown)) => {
            sqlx::query(
                r#"
                UPDATE devices
                SET last_seen = NOW(), user_ref = COALESCE($2, user_ref)
                WHERE device_id = $1
                "#,
            )
            .bind(device_id)
            .bind(user_ref)
            .execute(&mut **tx)
            .await?;

            if in_cooldown {
                Ok(None)
            } else {
                Ok(Some(device_id))
            }
        }
        None => {
            // First contact. Two racing first contacts for one identity hit
            // the UNIQUE constraint; the loser's transaction fails and the
            // client retries per the error contract.
            let (device_id,): (i64,) = sqlx::query_as(
                r#"
                INSERT INTO devices (client_uuid, device_model, user_ref, last_seen)
                VALUES ($1, $2, $3, NOW())
                RETURNING device_id
                "#,
            )
            .bind(client_uuid)
            .bind(device_model)
            .bind(user_ref)
            .fetch_one(&mut **tx)
            .await?;

            Ok(Some(device_id))
        }
    }
}

/// Correlation pass: count distinct devices in the trailing window and, on
/// quorum, promote to an active disaster event and raise the global alert.
///
/// The window is evaluated live against `NOW()` on every ingestion rather
/// than from fixed buckets, so late and early submissions are handled
/// uniformly. Returns the distinct-device count.
async fn correlate(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    config: &Config,
    submission: &ReportSubmission,
) -> Result<i64, sqlx::Error> {
    // ---
    let distinct_device_count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT device_id)
        FROM readings
        WHERE detected_at > NOW() - make_interval(secs => $1)
        "#,
    )
    .bind(f64::from(config.window_secs))
    .fetch_one(&mut **tx)
    .await?;

    if distinct_device_count >= i64::from(config.quorum_threshold) {
        promote(&mut **tx, submission).await?;
    }

    Ok(distinct_device_count)
}

/// Promote the current window into an active disaster event and force the
/// alert state to CRITICAL.
///
/// The partial unique index on (event_type) WHERE is_active makes the insert
/// a no-op when an event of this type is already active, so promotion is
/// idempotent under concurrent quorum crossings.
async fn promote(conn: &mut PgConnection, submission: &ReportSubmission) -> Result<(), sqlx::Error> {
    // ---
    let inserted = sqlx::query(
        r#"
        INSERT INTO disaster_events
            (event_id, event_type, epicenter_lat, epicenter_lng, magnitude, is_active, started_at)
        VALUES ($1, $2, $3, $4, $5, TRUE, NOW())
        ON CONFLICT (event_type) WHERE is_active DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(EVENT_TYPE_EARTHQUAKE)
    .bind(submission.latitude)
    .bind(submission.longitude)
    .bind(PLACEHOLDER_EVENT_MAGNITUDE)
    .execute(&mut *conn)
    .await?;

    if inserted.rows_affected() > 0 {
        info!(
            "Quorum reached - new {} event at ({:.4}, {:.4})",
            EVENT_TYPE_EARTHQUAKE, submission.latitude, submission.longitude
        );
    }

    if alert::transition(conn, AlertStatus::Critical).await? {
        warn!("Alert state raised to CRITICAL");
    }

    Ok(())
}
