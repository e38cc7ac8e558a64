//! Decision policy knobs for the camera monitor.

use chrono::TimeDelta;

use crate::compare::DEFAULT_BINARIZATION_THRESHOLD;
use crate::types::{WatchError, WatchResult};

/// Time and magnitude gates applied to every incoming frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Minimum spacing between two evaluations.
    pub consideration_interval: TimeDelta,
    /// Minimum spacing between two saved frames.
    pub min_save_interval: TimeDelta,
    /// Time since the last save before a stable-image check is attempted.
    pub min_stable_duration: TimeDelta,
    /// Frames are not evaluated for this long after `start()`.
    pub start_up_grace: TimeDelta,
    /// Upper bound on comparison image size, in megapixels.
    pub comparison_megapixel_ceiling: f64,
    /// Fraction changed above which a frame is materially different.
    pub change_threshold: f64,
    /// Per-channel delta (0-255) above which a sample counts as changed.
    pub binarization_threshold: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            consideration_interval: TimeDelta::seconds(1),
            min_save_interval: TimeDelta::seconds(5),
            min_stable_duration: TimeDelta::seconds(30),
            start_up_grace: TimeDelta::seconds(10),
            comparison_megapixel_ceiling: 0.5,
            change_threshold: 1e-5,
            binarization_threshold: DEFAULT_BINARIZATION_THRESHOLD,
        }
    }
}

impl MonitorConfig {
    /// Reject settings the monitor cannot honor.
    pub fn validate(&self) -> WatchResult<()> {
        if self.consideration_interval < TimeDelta::zero() {
            return Err(invalid("consideration_interval must not be negative"));
        }
        // Saved frames are named with one-second resolution.
        if self.min_save_interval < TimeDelta::seconds(1) {
            return Err(invalid("min_save_interval must be at least one second"));
        }
        if self.min_stable_duration < TimeDelta::zero() || self.start_up_grace < TimeDelta::zero() {
            return Err(invalid("durations must not be negative"));
        }
        if !(self.comparison_megapixel_ceiling > 0.0 && self.comparison_megapixel_ceiling.is_finite()) {
            return Err(invalid("comparison_megapixel_ceiling must be positive"));
        }
        if !(self.change_threshold >= 0.0 && self.change_threshold.is_finite()) {
            return Err(invalid("change_threshold must be a non-negative number"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> WatchError {
    WatchError::InvalidConfig(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_sub_second_save_interval_rejected() {
        let config = MonitorConfig {
            min_save_interval: TimeDelta::milliseconds(500),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(WatchError::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_thresholds_rejected() {
        let nan = MonitorConfig {
            change_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());

        let zero_ceiling = MonitorConfig {
            comparison_megapixel_ceiling: 0.0,
            ..Default::default()
        };
        assert!(zero_ceiling.validate().is_err());
    }
}
