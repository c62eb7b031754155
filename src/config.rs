//! Engine configuration carried from the host into construction.

use std::fmt;

/// Default length of each delay-line channel plane, in samples.
pub const DEFAULT_LOOP_CAPACITY: usize = 3_980_000;

/// Default ring capacity of the telemetry queue.
pub const DEFAULT_TELEMETRY_CAPACITY: usize = 10_000;

/// Default decimation interval for telemetry probes.
pub const DEFAULT_TELEMETRY_INTERVAL: u32 = 97;

/// How the top-level trigger reaches the voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerRouting {
    /// Voice 0 takes the trigger; a busy voice hands it to the next one.
    #[default]
    Cascade,
    /// Every voice sees the top-level trigger directly.
    Broadcast,
}

/// Construction parameters for an [`Engine`](crate::Engine).
///
/// Block size and sample rate are fixed crate constants and not part of the config.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Samples per delay-line channel plane.
    pub loop_capacity: usize,
    /// Telemetry ring capacity.
    pub telemetry_capacity: usize,
    /// One telemetry record is kept every `telemetry_interval` probe evaluations.
    pub telemetry_interval: u32,
    /// Divisor applied to the summed voice planes in the mixdown.
    pub mix_divisor: f32,
    /// Smoothing decay time in ms while the transport gate is open.
    pub vactrol_rise_ms: f32,
    /// Smoothing decay time in ms while the transport gate is closed.
    pub vactrol_fall_ms: f32,
    /// Trigger distribution across voices.
    pub trigger_routing: TriggerRouting,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loop_capacity: DEFAULT_LOOP_CAPACITY,
            telemetry_capacity: DEFAULT_TELEMETRY_CAPACITY,
            telemetry_interval: DEFAULT_TELEMETRY_INTERVAL,
            mix_divisor: crate::VOICE_COUNT as f32,
            vactrol_rise_ms: 2.0,
            vactrol_fall_ms: 2.0,
            trigger_routing: TriggerRouting::Cascade,
        }
    }
}

impl EngineConfig {
    /// Set the delay-line capacity. Small capacities keep tests cheap.
    pub fn with_loop_capacity(mut self, capacity: usize) -> Self {
        self.loop_capacity = capacity;
        self
    }

    /// Set the trigger routing.
    pub fn with_trigger_routing(mut self, routing: TriggerRouting) -> Self {
        self.trigger_routing = routing;
        self
    }

    /// Set the telemetry decimation interval.
    pub fn with_telemetry_interval(mut self, interval: u32) -> Self {
        self.telemetry_interval = interval;
        self
    }

    /// Check that the configuration can back an engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loop_capacity < 2 {
            return Err(ConfigError::LoopCapacityTooSmall(self.loop_capacity));
        }
        if self.telemetry_capacity == 0 {
            return Err(ConfigError::ZeroTelemetryCapacity);
        }
        if self.telemetry_interval == 0 {
            return Err(ConfigError::ZeroTelemetryInterval);
        }
        if !self.mix_divisor.is_finite() || self.mix_divisor == 0.0 {
            return Err(ConfigError::InvalidMixDivisor(self.mix_divisor));
        }
        for ms in [self.vactrol_rise_ms, self.vactrol_fall_ms] {
            if !ms.is_finite() || ms < 0.0 {
                return Err(ConfigError::InvalidDecayTime(ms));
            }
        }
        Ok(())
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Delay planes need at least two samples to interpolate.
    LoopCapacityTooSmall(usize),
    /// Telemetry ring cannot be empty.
    ZeroTelemetryCapacity,
    /// Decimation interval must be positive.
    ZeroTelemetryInterval,
    /// Mix divisor must be finite and nonzero.
    InvalidMixDivisor(f32),
    /// Decay times must be finite and non-negative.
    InvalidDecayTime(f32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LoopCapacityTooSmall(n) => {
                write!(f, "loop capacity {} is too small (minimum 2)", n)
            }
            ConfigError::ZeroTelemetryCapacity => write!(f, "telemetry capacity must be nonzero"),
            ConfigError::ZeroTelemetryInterval => write!(f, "telemetry interval must be nonzero"),
            ConfigError::InvalidMixDivisor(d) => write!(f, "invalid mix divisor {}", d),
            ConfigError::InvalidDecayTime(ms) => write!(f, "invalid decay time {} ms", ms),
        }
    }
}
