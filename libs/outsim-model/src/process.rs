//! Process model adapter
//!
//! The simulated plant behind the outstation. Binary-output indices map 1:1 to
//! actuator channels, analog-input indices map 1:1 to read channels.

use errors::{SimError, SimResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Seam between the outstation engine and the simulated process
///
/// `step` is driven by the update scheduler once per tick, `actuate` by the
/// command handler after an accepted operate.
pub trait ProcessModel: Send {
    /// Advance the simulation by one tick
    fn step(&mut self) -> SimResult<()>;

    /// Current value of an analog read channel
    fn read(&self, channel: usize) -> SimResult<f64>;

    /// Drive an actuator channel
    fn actuate(&mut self, channel: usize, state: bool) -> SimResult<()>;

    /// Number of analog read channels
    fn analog_channels(&self) -> usize;

    /// Number of actuator channels
    fn actuator_channels(&self) -> usize;
}

// Tank channel layout
pub const CHANNEL_LEVEL: usize = 0;
pub const CHANNEL_TEMPERATURE: usize = 1;
pub const ACTUATOR_FILL_VALVE: usize = 0;
pub const ACTUATOR_DRAIN_VALVE: usize = 1;

const LEVEL_MIN: f64 = 0.0;
const LEVEL_MAX: f64 = 100.0;

fn default_fill_rate() -> f64 {
    0.8
}
fn default_drain_rate() -> f64 {
    1.0
}
fn default_leak_rate() -> f64 {
    0.05
}
fn default_noise() -> f64 {
    0.1
}
fn default_setpoint() -> f64 {
    60.0
}
fn default_initial_level() -> f64 {
    50.0
}
fn default_ambient_temperature() -> f64 {
    25.0
}

/// Tank parameters, all rates in level units per tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankParams {
    #[serde(default = "default_fill_rate")]
    pub fill_rate: f64,
    #[serde(default = "default_drain_rate")]
    pub drain_rate: f64,
    #[serde(default = "default_leak_rate")]
    pub leak_rate: f64,
    /// Uniform noise amplitude added each tick
    #[serde(default = "default_noise")]
    pub noise: f64,
    /// Target level, reported by the trend log only
    #[serde(default = "default_setpoint")]
    pub setpoint: f64,
    #[serde(default = "default_initial_level")]
    pub initial_level: f64,
    #[serde(default = "default_ambient_temperature")]
    pub ambient_temperature: f64,
}

impl Default for TankParams {
    fn default() -> Self {
        Self {
            fill_rate: default_fill_rate(),
            drain_rate: default_drain_rate(),
            leak_rate: default_leak_rate(),
            noise: default_noise(),
            setpoint: default_setpoint(),
            initial_level: default_initial_level(),
            ambient_temperature: default_ambient_temperature(),
        }
    }
}

/// Tank with a fill valve and a drain valve
///
/// Level moves by `+fill_rate` (fill open), `-drain_rate` (drain open),
/// `-leak_rate` (always) and uniform noise, clamped to `[0, 100]`.
/// Temperature stays at ambient.
#[derive(Debug)]
pub struct TankModel {
    params: TankParams,
    level: f64,
    temperature: f64,
    fill_valve: bool,
    drain_valve: bool,
    rng: StdRng,
}

impl TankModel {
    pub fn new(params: TankParams) -> Self {
        Self::with_rng(params, StdRng::from_entropy())
    }

    /// Deterministic noise sequence
    pub fn with_seed(params: TankParams, seed: u64) -> Self {
        Self::with_rng(params, StdRng::seed_from_u64(seed))
    }

    fn with_rng(params: TankParams, rng: StdRng) -> Self {
        Self {
            level: params.initial_level.clamp(LEVEL_MIN, LEVEL_MAX),
            temperature: params.ambient_temperature,
            fill_valve: false,
            drain_valve: false,
            params,
            rng,
        }
    }

    pub fn params(&self) -> &TankParams {
        &self.params
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn valves(&self) -> (bool, bool) {
        (self.fill_valve, self.drain_valve)
    }
}

impl ProcessModel for TankModel {
    fn step(&mut self) -> SimResult<()> {
        let p = &self.params;
        let mut delta = -p.leak_rate;
        if self.fill_valve {
            delta += p.fill_rate;
        }
        if self.drain_valve {
            delta -= p.drain_rate;
        }
        if p.noise > 0.0 {
            delta += self.rng.gen_range(-p.noise..=p.noise);
        }

        let next = self.level + delta;
        if !next.is_finite() {
            return Err(SimError::adapter(format!(
                "tank level diverged: {} + {}",
                self.level, delta
            )));
        }
        self.level = next.clamp(LEVEL_MIN, LEVEL_MAX);
        Ok(())
    }

    fn read(&self, channel: usize) -> SimResult<f64> {
        match channel {
            CHANNEL_LEVEL => Ok(self.level),
            CHANNEL_TEMPERATURE => Ok(self.temperature),
            other => Err(SimError::adapter(format!("no read channel {}", other))),
        }
    }

    fn actuate(&mut self, channel: usize, state: bool) -> SimResult<()> {
        match channel {
            ACTUATOR_FILL_VALVE => self.fill_valve = state,
            ACTUATOR_DRAIN_VALVE => self.drain_valve = state,
            other => return Err(SimError::adapter(format!("no actuator channel {}", other))),
        }
        tracing::debug!("Tank actuator {} -> {}", channel, u8::from(state));
        Ok(())
    }

    fn analog_channels(&self) -> usize {
        2
    }

    fn actuator_channels(&self) -> usize {
        2
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn quiet_params() -> TankParams {
        TankParams {
            fill_rate: 2.0,
            drain_rate: 3.0,
            leak_rate: 0.5,
            noise: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_initial_reads() {
        let tank = TankModel::new(TankParams::default());
        assert_eq!(tank.read(CHANNEL_LEVEL).unwrap(), 50.0);
        assert_eq!(tank.read(CHANNEL_TEMPERATURE).unwrap(), 25.0);
        assert!(tank.read(2).is_err());
    }

    #[test]
    fn test_fill_and_leak() {
        let mut tank = TankModel::new(quiet_params());
        tank.actuate(ACTUATOR_FILL_VALVE, true).unwrap();
        tank.step().unwrap();
        assert!((tank.level() - 51.5).abs() < 1e-9);

        tank.actuate(ACTUATOR_DRAIN_VALVE, true).unwrap();
        tank.step().unwrap();
        assert!((tank.level() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_level_is_clamped() {
        let mut tank = TankModel::new(TankParams {
            initial_level: 1.0,
            ..quiet_params()
        });
        tank.actuate(ACTUATOR_DRAIN_VALVE, true).unwrap();
        for _ in 0..5 {
            tank.step().unwrap();
        }
        assert_eq!(tank.level(), 0.0);
    }

    #[test]
    fn test_noise_stays_within_amplitude() {
        let params = TankParams {
            leak_rate: 0.0,
            noise: 0.25,
            ..Default::default()
        };
        let mut tank = TankModel::with_seed(params, 7);
        let mut prev = tank.level();
        for _ in 0..100 {
            tank.step().unwrap();
            assert!((tank.level() - prev).abs() <= 0.25 + 1e-9);
            prev = tank.level();
        }
    }

    #[test]
    fn test_unknown_actuator_rejected() {
        let mut tank = TankModel::new(quiet_params());
        let err = tank.actuate(5, true).unwrap_err();
        assert!(matches!(err, SimError::AdapterFailure(_)));
        assert_eq!(tank.valves(), (false, false));
    }
}
