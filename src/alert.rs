//! Alert-state singleton access.
//!
//! All writes to the global SAFE/CRITICAL flag go through [`transition`]
//! rather than an unconditional overwrite: the update is a no-op when the
//! stored status already matches, and every real change bumps a monotonic
//! version and the change timestamp. Concurrent writers can still disagree
//! about the final status (last writer wins), but a stale write can no
//! longer masquerade as a fresh transition.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::models::AlertStatus;

// ---

/// Point-in-time view of the alert-state row.
#[derive(Debug, Clone)]
pub struct AlertSnapshot {
    // ---
    pub status: AlertStatus,
    pub version: i64,
    pub changed_at: DateTime<Utc>,
}

/// Move the singleton to `to`, if it is not there already.
///
/// Runs inside the caller's transaction so a rolled-back ingestion never
/// leaves a stray CRITICAL behind. Returns `true` when a transition
/// actually occurred.
pub async fn transition(conn: &mut PgConnection, to: AlertStatus) -> Result<bool, sqlx::Error> {
    // ---
    let res = sqlx::query(
        r#"
        UPDATE alert_state
        SET status = $1, version = version + 1, changed_at = NOW()
        WHERE status <> $1
        "#,
    )
    .bind(to.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(res.rows_affected() > 0)
}

/// Read the current alert state.
pub async fn snapshot(pool: &PgPool) -> Result<AlertSnapshot, sqlx::Error> {
    // ---
    let (status, version, changed_at): (String, i64, DateTime<Utc>) =
        sqlx::query_as("SELECT status, version, changed_at FROM alert_state LIMIT 1")
            .fetch_one(pool)
            .await?;

    Ok(AlertSnapshot {
        status: AlertStatus::from_db(&status),
        version,
        changed_at,
    })
}
