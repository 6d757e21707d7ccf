//! Database schema management for `quakemesh`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the device registry, the reading store feeding the correlation
/// window, the disaster-event table, and the alert-state singleton. Safe to
/// call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Device registry: one row per stable client identity.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            device_id    BIGSERIAL PRIMARY KEY,
            client_uuid  UUID        NOT NULL UNIQUE,
            device_model TEXT        NOT NULL,
            user_ref     TEXT,
            last_seen    TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Reading store: input to the trailing-window correlation query.
    // Rows are bulk-deleted by the resolve operation.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            reading_id  BIGSERIAL PRIMARY KEY,
            device_id   BIGINT           NOT NULL REFERENCES devices (device_id),
            latitude    DOUBLE PRECISION NOT NULL,
            longitude   DOUBLE PRECISION NOT NULL,
            magnitude_g REAL             NOT NULL,
            detected_at TIMESTAMPTZ      NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_detected_at
            ON readings (detected_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS disaster_events (
            event_id      UUID PRIMARY KEY,
            event_type    TEXT             NOT NULL,
            epicenter_lat DOUBLE PRECISION NOT NULL,
            epicenter_lng DOUBLE PRECISION NOT NULL,
            magnitude     REAL             NOT NULL,
            is_active     BOOLEAN          NOT NULL,
            started_at    TIMESTAMPTZ      NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // At most one active event per type. Concurrent quorum-crossing
    // transactions race on promotion; the partial unique index makes the
    // insert idempotent (ON CONFLICT DO NOTHING) instead of duplicating.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS uniq_active_event_per_type
            ON disaster_events (event_type)
            WHERE is_active;
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Alert-state singleton. The boolean primary key with a CHECK pins the
    // table to a single row; `version` increments on every status change so
    // writers never silently clobber a newer transition.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alert_state (
            singleton  BOOLEAN PRIMARY KEY DEFAULT TRUE CHECK (singleton),
            status     TEXT        NOT NULL,
            version    BIGINT      NOT NULL,
            changed_at TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO alert_state (singleton, status, version, changed_at)
        VALUES (TRUE, 'SAFE', 0, NOW())
        ON CONFLICT (singleton) DO NOTHING;
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
