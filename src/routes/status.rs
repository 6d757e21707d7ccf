// src/routes/status.rs
//! Alert-state poll: `GET /seismic/status`.
//!
//! Every connected client polls this route (~2 s interval). The reply is the
//! singleton alert state; when CRITICAL it also carries the active event so
//! the client can render epicenter and magnitude without a second request.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use sqlx::PgPool;
use tracing::error;

use crate::models::{AlertStatus, EventDetail, StatusResponse};
use crate::{alert, Config};

// ---

pub fn router() -> Router<(PgPool, Config)> {
    // ---
    Router::new().route("/seismic/status", get(handler))
}

async fn handler(State((pool, _config)): State<(PgPool, Config)>) -> impl IntoResponse {
    // ---
    let snap = match alert::snapshot(&pool).await {
        Ok(s) => s,
        Err(e) => {
            error!("GET /seismic/status - failed to read alert state: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to read alert state" })),
            )
                .into_response();
        }
    };

    let event = if snap.status == AlertStatus::Critical {
        match active_event(&pool).await {
            Ok(detail) => detail,
            Err(e) => {
                // Status is still served; detail lookup is best-effort.
                error!("GET /seismic/status - failed to load event detail: {}", e);
                None
            }
        }
    } else {
        None
    };

    (
        StatusCode::OK,
        Json(StatusResponse {
            status: snap.status,
            changed_at: snap.changed_at,
            event,
        }),
    )
        .into_response()
}

// ---

/// Fetch the currently active event, if any.
async fn active_event(pool: &PgPool) -> Result<Option<EventDetail>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, EventDetail>(
        r#"
        SELECT event_id, event_type, epicenter_lat, epicenter_lng, magnitude, started_at
        FROM disaster_events
        WHERE is_active = TRUE
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await
}
