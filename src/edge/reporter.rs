// src/edge/reporter.rs
//! Reporting client: identity, cool-down, and the backend HTTP calls.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use reqwest::{Client, StatusCode};
use uuid::Uuid;

use crate::models::{AlertStatus, ReportOutcome, ReportSubmission, StatusResponse};

/// Client-side per-device cool-down: at most one submission per window,
/// regardless of how many threshold crossings occur inside it.
pub const SUBMISSION_COOLDOWN: Duration = Duration::from_secs(5);

/// Interval at which clients poll `/seismic/status`.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Fallback location when no fix is available (Dhaka city center).
pub const FALLBACK_LOCATION: (f64, f64) = (23.8103, 90.4125);

// ---

/// Load the installation's stable device identity, generating and persisting
/// it on first run. The same token is reused for the lifetime of the
/// installation so the registry never forks one device into two rows.
pub fn load_or_create_identity(path: &Path) -> Result<Uuid> {
    // ---
    if let Ok(contents) = fs::read_to_string(path) {
        if let Ok(id) = contents.trim().parse::<Uuid>() {
            return Ok(id);
        }
        tracing::warn!(
            "Identity file {} is corrupt, generating a new device identity",
            path.display()
        );
    }

    let id = Uuid::new_v4();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create identity directory {}", parent.display()))?;
    }
    fs::write(path, id.to_string())
        .with_context(|| format!("Failed to persist device identity to {}", path.display()))?;
    Ok(id)
}

/// Fixed-window suppression: one acquisition per window.
#[derive(Debug)]
pub struct Cooldown {
    // ---
    window: Duration,
    last: Option<Instant>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Try to acquire the window at `now`; arms it on success.
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        // ---
        match self.last {
            Some(last) if now.duration_since(last) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }
}

/// Local full-screen alert overlay state.
///
/// Shown whenever the polled status is CRITICAL; the only local escape is
/// the explicit "I am safe" action, which resolves server-side and then
/// dismisses. A SAFE poll (someone else resolved) also clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    Hidden,
    Shown,
}

impl Overlay {
    pub fn apply(self, status: AlertStatus) -> Self {
        // ---
        match status {
            AlertStatus::Critical => Overlay::Shown,
            AlertStatus::Safe => Overlay::Hidden,
        }
    }

    pub fn dismiss(self) -> Self {
        Overlay::Hidden
    }
}

// ---

/// The device-resident reporting client.
pub struct Reporter {
    // ---
    http: Client,
    base_url: String,
    device_uuid: Uuid,
    cooldown: Cooldown,
    location: Option<(f64, f64)>,
}

impl Reporter {
    pub fn new(base_url: impl Into<String>, device_uuid: Uuid) -> Result<Self> {
        // ---
        let http = Client::builder()
            .user_agent(concat!("quakemesh-reporter/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            device_uuid,
            cooldown: Cooldown::new(SUBMISSION_COOLDOWN),
            location: None,
        })
    }

    /// Record the latest location fix.
    pub fn set_location(&mut self, latitude: f64, longitude: f64) {
        self.location = Some((latitude, longitude));
    }

    /// Offer a candidate magnitude from the sampler. Returns the submission
    /// to send, or `None` when the cool-down suppresses it entirely (the
    /// candidate never reaches the network).
    pub fn offer(&mut self, magnitude_g: f64) -> Option<ReportSubmission> {
        // ---
        if !self.cooldown.try_acquire() {
            return None;
        }
        let (latitude, longitude) = self.location.unwrap_or(FALLBACK_LOCATION);
        Some(ReportSubmission {
            device_uuid: self.device_uuid,
            latitude,
            longitude,
            magnitude: magnitude_g as f32,
        })
    }

    /// Submit one reading. The reply is advisory; the authoritative state is
    /// whatever the status poll returns.
    pub async fn submit(&self, submission: &ReportSubmission) -> Result<ReportOutcome> {
        // ---
        let url = format!("{}/seismic/report", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(submission)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            bail!("server rejected submission: device cool-down window");
        }

        let outcome = response
            .error_for_status()
            .context("Submission rejected")?
            .json::<ReportOutcome>()
            .await
            .context("Malformed submission reply")?;
        Ok(outcome)
    }

    /// Poll the global alert state.
    pub async fn poll_status(&self) -> Result<StatusResponse> {
        // ---
        let url = format!("{}/seismic/status", self.base_url);
        let status = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .error_for_status()
            .context("Status poll rejected")?
            .json::<StatusResponse>()
            .await
            .context("Malformed status reply")?;
        Ok(status)
    }

    /// "I am safe": resolve the active alert on behalf of the user.
    pub async fn resolve(&self, auth_token: &str) -> Result<()> {
        // ---
        let url = format!("{}/seismic/resolve", self.base_url);
        self.http
            .post(&url)
            .bearer_auth(auth_token)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .error_for_status()
            .context("Resolution rejected")?;
        Ok(())
    }
}
