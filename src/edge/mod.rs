//! Edge contract: the device-resident half of the pipeline.
//!
//! `sampler` turns raw 3-axis motion data into threshold-gated scalar
//! magnitudes; `reporter` owns the persistent device identity, the 5-second
//! submission cool-down, and the HTTP calls against the backend (submit,
//! status poll, resolve). The gateway re-exports the types the binary and
//! tests need (EMBP).

mod reporter;
mod sampler;

pub use reporter::{
    load_or_create_identity, Cooldown, Overlay, Reporter, FALLBACK_LOCATION,
    STATUS_POLL_INTERVAL, SUBMISSION_COOLDOWN,
};
pub use sampler::{MotionSample, Sampler, DEFAULT_THRESHOLD_G, STANDARD_GRAVITY};
