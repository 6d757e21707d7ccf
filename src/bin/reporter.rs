//! Edge reporting client for the `quakemesh` backend.
//!
//! Reads whitespace-separated `x y z` acceleration samples (m/s², one per
//! line) from stdin — e.g. piped from a sensor daemon — gates them through
//! the local threshold and cool-down, and submits candidates to the server.
//! Concurrently polls the global alert state every 2 seconds and renders the
//! CRITICAL overlay on the terminal. Typing `safe` performs the "I am safe"
//! resolution.
//!
//! # Environment Variables
//! - `QUAKEMESH_URL` (optional) – backend base URL (default: `http://localhost:8080`)
//! - `QUAKEMESH_IDENTITY_FILE` (optional) – device identity path
//!   (default: `.quakemesh-device-id`)
//! - `QUAKEMESH_TOKEN` (optional) – bearer credential used for resolution
//! - `QUAKEMESH_THRESHOLD_G` (optional) – local threshold override

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::filter::EnvFilter;

use quakemesh::edge::{
    load_or_create_identity, MotionSample, Overlay, Reporter, Sampler, DEFAULT_THRESHOLD_G,
    STATUS_POLL_INTERVAL,
};
use quakemesh::models::AlertStatus;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    let base_url =
        env::var("QUAKEMESH_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let identity_file = env::var("QUAKEMESH_IDENTITY_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".quakemesh-device-id"));
    let auth_token = env::var("QUAKEMESH_TOKEN").ok();

    let threshold_g = match env::var("QUAKEMESH_THRESHOLD_G") {
        Ok(v) => v
            .parse::<f64>()
            .map_err(|e| anyhow::anyhow!("Invalid QUAKEMESH_THRESHOLD_G: {}", e))?,
        Err(_) => DEFAULT_THRESHOLD_G,
    };

    let device_uuid = load_or_create_identity(&identity_file)?;
    info!("Device identity: {} ({})", device_uuid, identity_file.display());
    info!("Reporting to {} with threshold {:.2} g", base_url, threshold_g);

    let sampler = Sampler::new(threshold_g, true);
    let mut reporter = Reporter::new(base_url, device_uuid)?;
    let mut overlay = Overlay::Hidden;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut poll = tokio::time::interval(STATUS_POLL_INTERVAL);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }
                if line.eq_ignore_ascii_case("safe") {
                    match &auth_token {
                        Some(token) => match reporter.resolve(token).await {
                            Ok(()) => {
                                overlay = overlay.dismiss();
                                info!("Alert resolved - system reset to SAFE");
                            }
                            Err(e) => warn!("Resolution failed: {}", e),
                        },
                        None => warn!("Cannot resolve: QUAKEMESH_TOKEN not set"),
                    }
                    continue;
                }

                let Some(sample) = parse_sample(line) else {
                    warn!("Unparseable sample line: {:?}", line);
                    continue;
                };

                if let Some(magnitude) = sampler.evaluate(&sample) {
                    // Cool-down may still suppress the candidate locally.
                    if let Some(submission) = reporter.offer(magnitude) {
                        match reporter.submit(&submission).await {
                            Ok(outcome) => info!(
                                "Submitted {:.2} g -> {} ({} distinct devices)",
                                magnitude,
                                outcome.status.as_str(),
                                outcome.distinct_device_count
                            ),
                            Err(e) => warn!("Submission failed: {}", e),
                        }
                    }
                }
            }
            _ = poll.tick() => {
                match reporter.poll_status().await {
                    Ok(status) => {
                        let next = overlay.apply(status.status);
                        if next != overlay {
                            match status.status {
                                AlertStatus::Critical => {
                                    render_alert(&status);
                                }
                                AlertStatus::Safe => info!("Alert cleared - status SAFE"),
                            }
                        }
                        overlay = next;
                    }
                    Err(e) => warn!("Status poll failed: {}", e),
                }
            }
        }
    }

    Ok(())
}

// ---

/// Parse one `x y z` stdin line into a motion sample.
fn parse_sample(line: &str) -> Option<MotionSample> {
    // ---
    let mut parts = line.split_whitespace();
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(MotionSample { x, y, z })
}

/// Terminal rendition of the full-screen CRITICAL overlay.
fn render_alert(status: &quakemesh::models::StatusResponse) {
    // ---
    eprintln!("==================================================");
    eprintln!("  EARTHQUAKE ALERT - STATUS CRITICAL");
    if let Some(event) = &status.event {
        eprintln!(
            "  {} near ({:.4}, {:.4}), est. magnitude {:.1}",
            event.event_type, event.epicenter_lat, event.epicenter_lng, event.magnitude
        );
    }
    eprintln!("  Type 'safe' when you are out of danger.");
    eprintln!("==================================================");
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_parse_sample() {
        // ---
        let sample = parse_sample("0.1 -9.8 0.02").unwrap();
        assert!((sample.y + 9.8).abs() < 1e-9);

        assert!(parse_sample("").is_none());
        assert!(parse_sample("1.0 2.0").is_none());
        assert!(parse_sample("1.0 2.0 3.0 4.0").is_none());
        assert!(parse_sample("a b c").is_none());
    }
}
