//! Behavioral statistics learned from classified events.
//!
//! - [`EmaTracker`]: smoothed effort, ignore-rate and interaction frequency
//!   per subject, with optimistic concurrency.
//! - [`PatternTracker`]: local day/hour histograms per activity.
//! - [`PreferenceSource`]: read side consumed by the response policy.
//!
//! All trackers are best-effort from the pipeline's point of view: a failure
//! in one never blocks another.

mod ema;
mod pattern;
mod preferences;

pub use ema::{round4, smooth, EmaConfig, EmaMetric, EmaRecord, EmaSample, EmaTracker, EmaUpdate};
pub use pattern::{PatternHabit, PatternTracker};
pub use preferences::{EmaPreferenceSource, PreferenceSource};
