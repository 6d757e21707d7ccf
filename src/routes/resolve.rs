// src/routes/resolve.rs
//! Resolution ("I am safe"): `POST /seismic/resolve`.
//!
//! Atomically deactivates every active disaster event, purges the reading
//! history (this is what resets the trailing correlation window to zero),
//! and returns the alert state to SAFE. Idempotent: resolving an already
//! safe system leaves it safe.

use axum::{
    extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse, routing::post,
    Json, Router,
};
use sqlx::PgPool;
use tracing::{error, info};

use crate::models::AlertStatus;
use crate::routes::bearer_token;
use crate::{alert, Config};

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/seismic/resolve", post(handler))
}

async fn handler(
    State((pool, _config)): State<(PgPool, Config)>,
    headers: HeaderMap,
) -> impl IntoResponse {
    // ---
    // Resolution is a human action on behalf of an authenticated caller.
    // The credential itself is opaque here; verification belongs to the
    // auth collaborator fronting this service.
    if bearer_token(&headers).is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "resolution requires an authenticated caller" })),
        )
            .into_response();
    }

    match resolve(&pool).await {
        Ok(purged_readings) => {
            info!(
                "POST /seismic/resolve - system reset to SAFE, {} readings purged",
                purged_readings
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({ "status": "SAFE" })),
            )
                .into_response()
        }
        Err(e) => {
            error!("POST /seismic/resolve - transaction failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to resolve alert" })),
            )
                .into_response()
        }
    }
}

// ---

/// Deactivate events, purge readings, drop the alert to SAFE.
///
/// Deleting readings (rather than aging them out) keeps the window query
/// trivially correct after a reset; any consumer of historical readings must
/// treat this as a destructive operation. Returns the purge count.
async fn resolve(pool: &PgPool) -> Result<u64, sqlx::Error> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE disaster_events SET is_active = FALSE WHERE is_active = TRUE")
        .execute(&mut *tx)
        .await?;

    let purged = sqlx::query("DELETE FROM readings")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    alert::transition(&mut *tx, AlertStatus::Safe).await?;

    tx.commit().await?;
    Ok(purged)
}
