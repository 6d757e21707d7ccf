//! Data models for the seismic detection pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// Global alert state observed by every connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    #[serde(rename = "SAFE")]
    Safe,
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl AlertStatus {
    // ---
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Safe => "SAFE",
            AlertStatus::Critical => "CRITICAL",
        }
    }

    /// Parse the stored form; unknown values fall back to `Safe` so a
    /// corrupted singleton row degrades to the non-alarming state.
    pub fn from_db(s: &str) -> Self {
        match s {
            "CRITICAL" => AlertStatus::Critical,
            _ => AlertStatus::Safe,
        }
    }
}

/// One reading submission from an edge device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSubmission {
    // ---
    /// Stable client-generated device identity.
    pub device_uuid: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    /// Peak ground acceleration proxy, in g.
    pub magnitude: f32,
}

impl ReportSubmission {
    /// Validate the payload before any write.
    ///
    /// Coordinates must be finite and within range; magnitude must be a
    /// finite positive value. Returns a caller-facing message on failure.
    pub fn validate(&self) -> Result<(), &'static str> {
        // ---
        if !self.latitude.is_finite() || self.latitude.abs() > 90.0 {
            return Err("latitude must be a finite value in [-90, 90]");
        }
        if !self.longitude.is_finite() || self.longitude.abs() > 180.0 {
            return Err("longitude must be a finite value in [-180, 180]");
        }
        if !self.magnitude.is_finite() || self.magnitude <= 0.0 {
            return Err("magnitude must be a finite positive value in g");
        }
        Ok(())
    }
}

/// Synchronous reply to a reading submission.
///
/// Advisory only: the status label reflects whether this submission's window
/// met quorum, but the authoritative value is the alert state as polled.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportOutcome {
    // ---
    pub status: AlertStatus,
    pub distinct_device_count: i64,
}

/// Detail of the active disaster event, attached to CRITICAL status replies.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventDetail {
    // ---
    pub event_id: Uuid,
    pub event_type: String,
    pub epicenter_lat: f64,
    pub epicenter_lng: f64,
    pub magnitude: f32,
    pub started_at: DateTime<Utc>,
}

/// Reply to a status poll.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    // ---
    pub status: AlertStatus,
    pub changed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventDetail>,
}

/// One row of the recent-activity feed.
#[derive(Debug, Serialize)]
pub struct VibrationLog {
    // ---
    pub reading_id: i64,
    pub sensor: String,
    pub latitude: f64,
    pub longitude: f64,
    pub magnitude: f32,
    pub severity: String,
    pub detected_at: DateTime<Utc>,
}

/// One point of the 24-hour magnitude chart: minute bucket and average
/// magnitude within it.
#[derive(Debug, Serialize)]
pub struct ChartPoint {
    // ---
    pub time: String,
    pub magnitude: f32,
}

/// One bucket of the fleet risk distribution.
#[derive(Debug, Serialize, PartialEq)]
pub struct RiskBucket {
    // ---
    pub name: &'static str,
    pub value: i64,
}

/// Bucket the latest per-device magnitudes into the severity distribution
/// rendered by the dashboard.
pub fn risk_distribution(latest_magnitudes: &[f32]) -> Vec<RiskBucket> {
    // ---
    let (mut safe, mut warning, mut danger) = (0, 0, 0);
    for &magnitude in latest_magnitudes {
        match severity_label(magnitude) {
            "danger" => danger += 1,
            "warning" => warning += 1,
            _ => safe += 1,
        }
    }
    vec![
        RiskBucket { name: "safe", value: safe },
        RiskBucket { name: "warning", value: warning },
        RiskBucket { name: "danger", value: danger },
    ]
}

/// Severity label for a single reading's magnitude (in g), as rendered by
/// the activity feed.
pub fn severity_label(magnitude: f32) -> &'static str {
    // ---
    if magnitude > 1.0 {
        "danger"
    } else if magnitude > 0.3 {
        "warning"
    } else {
        "safe"
    }
}

/// Collapse a raw browser user-agent string into a short sensor label.
pub fn friendly_model(user_agent: &str) -> String {
    // ---
    if user_agent.contains("Mozilla") {
        if user_agent.contains("Android") {
            "Android Device".into()
        } else if user_agent.contains("iPhone") {
            "iOS Device".into()
        } else {
            "Web Browser".into()
        }
    } else if user_agent.is_empty() {
        "Unknown Device".into()
    } else {
        user_agent.to_string()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn submission(lat: f64, lng: f64, magnitude: f32) -> ReportSubmission {
        // ---
        ReportSubmission {
            device_uuid: Uuid::new_v4(),
            latitude: lat,
            longitude: lng,
            magnitude,
        }
    }

    #[test]
    fn test_validation_accepts_plausible_reading() {
        // ---
        assert!(submission(23.8103, 90.4125, 0.4).validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_coordinates() {
        // ---
        assert!(submission(91.0, 90.0, 0.4).validate().is_err());
        assert!(submission(23.0, 181.0, 0.4).validate().is_err());
        assert!(submission(f64::NAN, 90.0, 0.4).validate().is_err());
        assert!(submission(23.0, f64::INFINITY, 0.4).validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_magnitude() {
        // ---
        assert!(submission(23.0, 90.0, 0.0).validate().is_err());
        assert!(submission(23.0, 90.0, -0.5).validate().is_err());
        assert!(submission(23.0, 90.0, f32::NAN).validate().is_err());
    }

    #[test]
    fn test_severity_thresholds() {
        // ---
        assert_eq!(severity_label(0.1), "safe");
        assert_eq!(severity_label(0.3), "safe");
        assert_eq!(severity_label(0.31), "warning");
        assert_eq!(severity_label(1.0), "warning");
        assert_eq!(severity_label(1.2), "danger");
    }

    #[test]
    fn test_friendly_model_cleanup() {
        // ---
        let android = "Mozilla/5.0 (Linux; Android 14; Pixel 8)";
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
        assert_eq!(friendly_model(android), "Android Device");
        assert_eq!(friendly_model(iphone), "iOS Device");
        assert_eq!(friendly_model("Mozilla/5.0 (X11; Linux x86_64)"), "Web Browser");
        assert_eq!(friendly_model("quakemesh-reporter/0.1"), "quakemesh-reporter/0.1");
        assert_eq!(friendly_model(""), "Unknown Device");
    }

    #[test]
    fn test_risk_distribution_buckets() {
        // ---
        let buckets = risk_distribution(&[0.1, 0.2, 0.5, 1.5, 0.4]);
        assert_eq!(
            buckets,
            vec![
                RiskBucket { name: "safe", value: 2 },
                RiskBucket { name: "warning", value: 2 },
                RiskBucket { name: "danger", value: 1 },
            ]
        );

        // An empty fleet yields empty buckets, not an empty reply.
        let buckets = risk_distribution(&[]);
        assert!(buckets.iter().all(|b| b.value == 0));
        assert_eq!(buckets.len(), 3);
    }

    #[test]
    fn test_alert_status_round_trip() {
        // ---
        assert_eq!(AlertStatus::from_db("CRITICAL"), AlertStatus::Critical);
        assert_eq!(AlertStatus::from_db("SAFE"), AlertStatus::Safe);
        // Unknown stored values degrade to SAFE rather than alarming.
        assert_eq!(AlertStatus::from_db("garbage"), AlertStatus::Safe);
        assert_eq!(
            serde_json::to_string(&AlertStatus::Critical).unwrap(),
            "\"CRITICAL\""
        );
    }
}
