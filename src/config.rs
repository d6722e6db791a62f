use crate::backpressure::{BackpressureError, WindowParams};
use crate::front::classes::{ExtQueueId, IntQueueId, LaneGroup};
use crate::front::int_queue::LaneLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming a JSON configuration file.
pub const CONFIG_ENV: &str = "BLOCKFRONT_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("window settings for {queue}: {source}")]
    Window {
        queue: ExtQueueId,
        #[source]
        source: BackpressureError,
    },
    #[error("{field} must be positive")]
    Zero { field: &'static str },
    #[error("{field}={value} outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Cost-window tuning, expressed in percent of each external queue's total
/// cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub check_sequence: bool,
    pub cost_change_to_recalculate_percent: u64,
    pub min_low_watermark_percent: u64,
    pub max_low_watermark_percent: u64,
    pub percent_threshold: u64,
    pub cost_change_until_frozen_percent: u64,
    pub cost_change_until_death_percent: u64,
    pub timeout_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            check_sequence: true,
            cost_change_to_recalculate_percent: 10,
            min_low_watermark_percent: 10,
            max_low_watermark_percent: 90,
            percent_threshold: 80,
            cost_change_until_frozen_percent: 500,
            cost_change_until_death_percent: 1000,
            timeout_ms: 60_000,
        }
    }
}

impl WindowConfig {
    pub fn params_for(&self, total_cost: u64) -> WindowParams {
        let part = |percent: u64| total_cost.saturating_mul(percent) / 100;
        WindowParams {
            check_sequence: self.check_sequence,
            total_cost,
            cost_change_to_recalculate: part(self.cost_change_to_recalculate_percent),
            min_low_watermark: part(self.min_low_watermark_percent),
            max_low_watermark: part(self.max_low_watermark_percent),
            percent_threshold: self.percent_threshold,
            cost_change_until_frozen: part(self.cost_change_until_frozen_percent),
            cost_change_until_death: part(self.cost_change_until_death_percent),
            window_timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Total cost budget of every external queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtQueueConfig {
    pub put_tablet_log: u64,
    pub put_async_blob: u64,
    pub put_user_data: u64,
    pub get_async_read: u64,
    pub get_fast_read: u64,
    pub get_discover: u64,
    pub get_low_read: u64,
}

impl Default for ExtQueueConfig {
    fn default() -> Self {
        Self {
            put_tablet_log: 1_000_000_000,
            put_async_blob: 2_000_000_000,
            put_user_data: 1_000_000_000,
            get_async_read: 2_000_000_000,
            get_fast_read: 1_000_000_000,
            get_discover: 1_000_000_000,
            get_low_read: 2_000_000_000,
        }
    }
}

impl ExtQueueConfig {
    pub fn total_cost(&self, queue: ExtQueueId) -> u64 {
        match queue {
            ExtQueueId::PutTabletLog => self.put_tablet_log,
            ExtQueueId::PutAsyncBlob => self.put_async_blob,
            ExtQueueId::PutUserData => self.put_user_data,
            ExtQueueId::GetAsyncRead => self.get_async_read,
            ExtQueueId::GetFastRead => self.get_fast_read,
            ExtQueueId::GetDiscover => self.get_discover,
            ExtQueueId::GetLowRead => self.get_low_read,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneCaps {
    pub max_in_flight_count: u64,
    pub max_in_flight_cost: u64,
}

impl From<LaneCaps> for LaneLimits {
    fn from(caps: LaneCaps) -> Self {
        LaneLimits {
            max_in_flight_count: caps.max_in_flight_count,
            max_in_flight_cost: caps.max_in_flight_cost,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    pub gets: LaneCaps,
    pub discover: LaneCaps,
    pub log_puts: LaneCaps,
    pub huge_puts: LaneCaps,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            gets: LaneCaps {
                max_in_flight_count: 10,
                max_in_flight_cost: 100_000_000,
            },
            discover: LaneCaps {
                max_in_flight_count: 10,
                max_in_flight_cost: 100_000_000,
            },
            log_puts: LaneCaps {
                max_in_flight_count: 1_000,
                max_in_flight_cost: 10_000_000_000,
            },
            huge_puts: LaneCaps {
                max_in_flight_count: 10,
                max_in_flight_cost: 150_000_000,
            },
        }
    }
}

impl LaneConfig {
    pub fn limits(&self, lane: IntQueueId) -> LaneLimits {
        let caps = match lane.group() {
            LaneGroup::Gets => self.gets,
            LaneGroup::Discover => self.discover,
            LaneGroup::LogPuts => self.log_puts,
            LaneGroup::HugePuts => self.huge_puts,
        };
        caps.into()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Accept requests without a scope when the group has one.
    pub allow_unscoped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontConfig {
    pub window: WindowConfig,
    pub ext_queues: ExtQueueConfig,
    pub lanes: LaneConfig,
    pub access: AccessConfig,
}

impl FrontConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: FrontConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Loads the file named by `BLOCKFRONT_CONFIG`, or the defaults when the
    /// variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn window_params(&self, queue: ExtQueueId) -> WindowParams {
        self.window.params_for(self.ext_queues.total_cost(queue))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let window = &self.window;
        check_range("window.percent_threshold", window.percent_threshold, 1, 99)?;
        check_range(
            "window.min_low_watermark_percent",
            window.min_low_watermark_percent,
            0,
            100,
        )?;
        check_range(
            "window.max_low_watermark_percent",
            window.max_low_watermark_percent,
            window.min_low_watermark_percent,
            100,
        )?;
        check_range(
            "window.cost_change_to_recalculate_percent",
            window.cost_change_to_recalculate_percent,
            1,
            100,
        )?;
        if window.timeout_ms == 0 {
            return Err(ConfigError::Zero {
                field: "window.timeout_ms",
            });
        }
        for queue in ExtQueueId::ALL {
            if self.ext_queues.total_cost(queue) == 0 {
                return Err(ConfigError::Zero {
                    field: "ext_queues.total_cost",
                });
            }
            self.window_params(queue)
                .validate()
                .map_err(|source| ConfigError::Window { queue, source })?;
        }
        for (field, caps) in [
            ("lanes.gets", self.lanes.gets),
            ("lanes.discover", self.lanes.discover),
            ("lanes.log_puts", self.lanes.log_puts),
            ("lanes.huge_puts", self.lanes.huge_puts),
        ] {
            if caps.max_in_flight_count == 0 || caps.max_in_flight_cost == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
