// src/routes/logs.rs
//! Read-only dashboard consumers of the reading store: the recent-activity
//! feed (`GET /seismic/logs`), the 24-hour magnitude chart
//! (`GET /seismic/chart`), and the fleet risk distribution
//! (`GET /seismic/risk-distribution`).
//!
//! All three read the same store that resolution purges, so they empty the
//! moment an alert is resolved.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::error;

use crate::models::{risk_distribution, severity_label, ChartPoint, VibrationLog};
use crate::Config;

/// Feed length served to dashboards.
const LOG_LIMIT: i64 = 15;

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new()
        .route("/seismic/logs", get(logs_handler))
        .route("/seismic/chart", get(chart_handler))
        .route("/seismic/risk-distribution", get(risk_handler))
}

async fn logs_handler(State((pool, _config)): State<(PgPool, Config)>) -> impl IntoResponse {
    // ---
    match recent_readings(&pool).await {
        Ok(logs) => (StatusCode::OK, Json(logs)).into_response(),
        Err(e) => {
            error!("GET /seismic/logs - query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to load activity feed" })),
            )
                .into_response()
        }
    }
}

async fn chart_handler(State((pool, _config)): State<(PgPool, Config)>) -> impl IntoResponse {
    // ---
    match chart_points(&pool).await {
        Ok(points) => (StatusCode::OK, Json(points)).into_response(),
        Err(e) => {
            error!("GET /seismic/chart - query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to load chart data" })),
            )
                .into_response()
        }
    }
}

async fn risk_handler(State((pool, _config)): State<(PgPool, Config)>) -> impl IntoResponse {
    // ---
    match latest_magnitudes(&pool).await {
        Ok(magnitudes) => (StatusCode::OK, Json(risk_distribution(&magnitudes))).into_response(),
        Err(e) => {
            error!("GET /seismic/risk-distribution - query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to load risk distribution" })),
            )
                .into_response()
        }
    }
}

// ---

async fn recent_readings(pool: &PgPool) -> Result<Vec<VibrationLog>, sqlx::Error> {
    // ---
    let rows: Vec<(i64, Option<String>, f64, f64, f32, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT r.reading_id, d.device_model, r.latitude, r.longitude, r.magnitude_g, r.detected_at
        FROM readings r
        LEFT JOIN devices d ON r.device_id = d.device_id
        ORDER BY r.detected_at DESC
        LIMIT $1
        "#,
    )
    .bind(LOG_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(reading_id, device_model, latitude, longitude, magnitude, detected_at)| {
                VibrationLog {
                    reading_id,
                    sensor: device_model.unwrap_or_else(|| "Unknown Device".into()),
                    latitude,
                    longitude,
                    magnitude,
                    severity: severity_label(magnitude).to_string(),
                    detected_at,
                }
            },
        )
        .collect())
}

/// Average magnitude per minute over the trailing 24 hours.
async fn chart_points(pool: &PgPool) -> Result<Vec<ChartPoint>, sqlx::Error> {
    // ---
    let rows: Vec<(String, f32)> = sqlx::query_as(
        r#"
        SELECT to_char(date_trunc('minute', detected_at), 'HH24:MI') AS time,
               AVG(magnitude_g)::real AS magnitude
        FROM readings
        WHERE detected_at > NOW() - INTERVAL '24 hours'
        GROUP BY date_trunc('minute', detected_at)
        ORDER BY date_trunc('minute', detected_at) ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(time, magnitude)| ChartPoint { time, magnitude })
        .collect())
}

/// Most recent magnitude reported by each device.
async fn latest_magnitudes(pool: &PgPool) -> Result<Vec<f32>, sqlx::Error> {
    // ---
    let rows: Vec<(f32,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT ON (device_id) magnitude_g
        FROM readings
        ORDER BY device_id, detected_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(m,)| m).collect())
}
