use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackpressureError {
    #[error("total cost must be positive")]
    ZeroTotalCost,
    #[error("percent threshold {0} must lie in 1..=99")]
    PercentThreshold(u64),
    #[error("low watermark bounds inverted: min={min} max={max}")]
    LowWatermarkBounds { min: u64, max: u64 },
    #[error("max low watermark {max} exceeds total cost {total}")]
    LowWatermarkAboveTotal { max: u64, total: u64 },
    #[error("idle thresholds inverted: frozen={frozen} death={death}")]
    IdleThresholds { frozen: u64, death: u64 },
    #[error("recalculation step must be positive")]
    ZeroRecalculationStep,
}

/// Absolute tuning for one external queue's windows. Every cost field shares
/// the unit of the cost estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    pub check_sequence: bool,
    pub total_cost: u64,
    pub cost_change_to_recalculate: u64,
    pub min_low_watermark: u64,
    pub max_low_watermark: u64,
    pub percent_threshold: u64,
    pub cost_change_until_frozen: u64,
    pub cost_change_until_death: u64,
    pub window_timeout: Duration,
}

impl WindowParams {
    pub fn validate(&self) -> Result<(), BackpressureError> {
        if self.total_cost == 0 {
            return Err(BackpressureError::ZeroTotalCost);
        }
        if self.percent_threshold == 0 || self.percent_threshold >= 100 {
            return Err(BackpressureError::PercentThreshold(self.percent_threshold));
        }
        if self.min_low_watermark > self.max_low_watermark {
            return Err(BackpressureError::LowWatermarkBounds {
                min: self.min_low_watermark,
                max: self.max_low_watermark,
            });
        }
        if self.max_low_watermark > self.total_cost {
            return Err(BackpressureError::LowWatermarkAboveTotal {
                max: self.max_low_watermark,
                total: self.total_cost,
            });
        }
        if self.cost_change_until_frozen > self.cost_change_until_death {
            return Err(BackpressureError::IdleThresholds {
                frozen: self.cost_change_until_frozen,
                death: self.cost_change_until_death,
            });
        }
        if self.cost_change_to_recalculate == 0 {
            return Err(BackpressureError::ZeroRecalculationStep);
        }
        Ok(())
    }

    /// Fair share of the total budget when `active` windows compete for it.
    pub fn share_for(&self, active: usize) -> u64 {
        let active = active.max(1) as u64;
        (self.total_cost / active).max(self.min_low_watermark)
    }
}

#[cfg(test)]
pub(crate) fn test_params(total_cost: u64) -> WindowParams {
    WindowParams {
        check_sequence: true,
        total_cost,
        cost_change_to_recalculate: total_cost / 10,
        min_low_watermark: total_cost / 10,
        max_low_watermark: total_cost * 9 / 10,
        percent_threshold: 80,
        cost_change_until_frozen: total_cost * 5,
        cost_change_until_death: total_cost * 10,
        window_timeout: Duration::from_secs(60),
    }
}
