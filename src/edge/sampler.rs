// src/edge/sampler.rs
//! Motion sampling: raw acceleration to candidate magnitudes.

use serde::Deserialize;

/// Standard gravity, m/s².
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Default operator threshold on the 0–3 g scale. Only magnitudes above it
/// become submission candidates.
pub const DEFAULT_THRESHOLD_G: f64 = 1.5;

// ---

/// One raw acceleration sample, in m/s² per axis.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MotionSample {
    // ---
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MotionSample {
    /// Scalar magnitude in g: the Euclidean norm of the three axes divided
    /// by standard gravity. When the sensor reports gravity-inclusive data
    /// (the combined-sensor API), the constant 1 g bias is removed; a device
    /// at rest then reads ~0 g instead of ~1 g. Clamped at zero.
    pub fn magnitude_g(&self, includes_gravity: bool) -> f64 {
        // ---
        let norm = (self.x * self.x + self.y * self.y + self.z * self.z).sqrt() / STANDARD_GRAVITY;
        if includes_gravity {
            (norm - 1.0).max(0.0)
        } else {
            norm
        }
    }
}

/// Threshold gate over a stream of motion samples.
#[derive(Debug, Clone)]
pub struct Sampler {
    // ---
    threshold_g: f64,
    includes_gravity: bool,
}

impl Sampler {
    pub fn new(threshold_g: f64, includes_gravity: bool) -> Self {
        Self {
            threshold_g,
            includes_gravity,
        }
    }

    /// Operator adjustment of the local threshold.
    pub fn set_threshold(&mut self, threshold_g: f64) {
        self.threshold_g = threshold_g;
    }

    /// Evaluate one sample; returns the magnitude (in g) only when it
    /// exceeds the local threshold.
    pub fn evaluate(&self, sample: &MotionSample) -> Option<f64> {
        // ---
        let magnitude = sample.magnitude_g(self.includes_gravity);
        if magnitude > self.threshold_g {
            Some(magnitude)
        } else {
            None
        }
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_G, true)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_resting_device_reads_zero_with_gravity_sensor() {
        // ---
        // A combined-gravity sensor at rest reports exactly 1 g on one axis.
        let sample = MotionSample {
            x: 0.0,
            y: 0.0,
            z: STANDARD_GRAVITY,
        };
        assert!(sample.magnitude_g(true).abs() < 1e-9);
        assert!((sample.magnitude_g(false) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_magnitude_is_euclidean_norm() {
        // ---
        let sample = MotionSample {
            x: 3.0,
            y: 4.0,
            z: 0.0,
        };
        let expected = 5.0 / STANDARD_GRAVITY;
        assert!((sample.magnitude_g(false) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_gravity_bias_clamps_at_zero() {
        // ---
        // Sub-gravity norms are sensor noise, not negative shaking.
        let sample = MotionSample {
            x: 0.0,
            y: 0.0,
            z: 4.0,
        };
        assert_eq!(sample.magnitude_g(true), 0.0);
    }

    #[test]
    fn test_threshold_gate() {
        // ---
        let sampler = Sampler::default();

        // Gentle motion stays below the 1.5 g default.
        let gentle = MotionSample {
            x: 0.0,
            y: 0.0,
            z: STANDARD_GRAVITY * 1.4,
        };
        assert!(sampler.evaluate(&gentle).is_none());

        // Violent shaking crosses it.
        let violent = MotionSample {
            x: 0.0,
            y: 0.0,
            z: STANDARD_GRAVITY * 3.0,
        };
        let magnitude = sampler.evaluate(&violent).expect("candidate expected");
        assert!((magnitude - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_operator_can_lower_threshold() {
        // ---
        let mut sampler = Sampler::new(DEFAULT_THRESHOLD_G, true);
        let moderate = MotionSample {
            x: 0.0,
            y: 0.0,
            z: STANDARD_GRAVITY * 1.8,
        };
        assert!(sampler.evaluate(&moderate).is_none());

        sampler.set_threshold(0.5);
        assert!(sampler.evaluate(&moderate).is_some());
    }
}
