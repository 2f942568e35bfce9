use crate::error::ConfigError;
use crate::global_variables::{
    DEFAULT_CAR_SPEED, DEFAULT_CONCURRENT_CARS, DEFAULT_LEFT_CARS, DEFAULT_RIGHT_CARS,
    DEFAULT_TIME_UNIT_MS, DEFAULT_TUNNEL_LENGTH, MAX_CROSSING_SECS,
};
use crate::simulation_engine::tunnel::FlowDirection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parameters of one simulation run. Missing JSON fields take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub tunnel_length: u32,
    pub batch_quota: u32,
    pub vehicle_speed: u32,
    pub right_count: u32,
    pub left_count: u32,
    pub initial_direction: FlowDirection,
    pub time_unit_ms: u64,
    /// Each worker stops after this many crossings. Unbounded when absent.
    pub max_crossings_per_vehicle: Option<u64>,
    /// Appends every admission to this CSV file when set.
    pub trace_path: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tunnel_length: DEFAULT_TUNNEL_LENGTH,
            batch_quota: DEFAULT_CONCURRENT_CARS,
            vehicle_speed: DEFAULT_CAR_SPEED,
            right_count: DEFAULT_RIGHT_CARS,
            left_count: DEFAULT_LEFT_CARS,
            initial_direction: FlowDirection::FlowRight,
            time_unit_ms: DEFAULT_TIME_UNIT_MS,
            max_crossings_per_vehicle: None,
            trace_path: None,
        }
    }
}

impl SimulationConfig {
    /// Loads a JSON configuration file and validates it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("tunnel_length", u64::from(self.tunnel_length))?;
        positive("batch_quota", u64::from(self.batch_quota))?;
        positive("vehicle_speed", u64::from(self.vehicle_speed))?;
        positive("time_unit_ms", self.time_unit_ms)?;
        if let Some(max) = self.max_crossings_per_vehicle {
            positive("max_crossings_per_vehicle", max)?;
        }
        if self.right_count.checked_add(self.left_count).is_none() {
            return Err(ConfigError::Invalid {
                field: "left_count",
                reason: "total vehicle count overflows".to_string(),
            });
        }
        self.crossing_time()?;
        Ok(())
    }

    /// Time one car spends in the tunnel, computed the way workers do.
    pub fn crossing_time(&self) -> Result<Duration, ConfigError> {
        let factor = f64::from(self.tunnel_length) / f64::from(self.vehicle_speed);
        let secs = factor * self.time_unit().as_secs_f64();
        if !secs.is_finite() || secs > MAX_CROSSING_SECS {
            return Err(ConfigError::Invalid {
                field: "time_unit_ms",
                reason: format!("crossing time of {} s is too long", secs),
            });
        }
        Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::Invalid {
            field: "time_unit_ms",
            reason: e.to_string(),
        })
    }

    pub fn total_vehicles(&self) -> u32 {
        self.right_count + self.left_count
    }

    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }
}

fn positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
