//! Grainline: a fixed-topology granular pitch-shifter evaluated block by block.
//!
//! The engine is a small signal-processing machine: a [`graph::Graph`] of typed
//! nodes is compiled into a [`plan::Plan`] and run by [`rt::Runtime`] once per
//! 128-sample block. Stateless nodes run four lanes at a time, stateful nodes run
//! one sample at a time in ascending order. All persistent state lives in a flat
//! [`store::ParameterStore`] shared with the host.

pub mod config;
pub mod context;
pub mod control;
pub mod delay;
pub mod engine;
pub mod error;
pub mod graph;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod mixer;
pub mod node;
pub mod patch;
pub mod plan;
pub mod render;
pub mod rt;
pub mod states;
pub mod store;
pub mod telemetry;
pub mod transport;
pub mod voice;

pub use config::{EngineConfig, TriggerRouting};
pub use engine::Engine;
pub use error::Error;
pub use store::{Param, ParameterStore};
pub use telemetry::{TelemetryKind, TelemetryMessage, TelemetryQueue};

/// Samples per block. Every `process` call consumes and produces exactly one block.
pub const BLOCK_SIZE: usize = 128;

/// Fixed engine sample rate in Hz.
pub const SAMPLE_RATE: f32 = 44100.0;

/// Number of grain voices, always evaluated.
pub const VOICE_COUNT: usize = 5;

/// Width of a vector pass step.
pub const LANES: usize = 4;

/// Output channels (left plane followed by right plane).
pub const CHANNELS: usize = 2;

/// Convert milliseconds to samples at the engine rate.
#[inline]
pub fn ms_to_samples(ms: f32) -> f32 {
    (ms / 1000.0) * SAMPLE_RATE
}

/// Convert samples to milliseconds at the engine rate.
#[inline]
pub fn samples_to_ms(samples: f32) -> f32 {
    1000.0 * samples / SAMPLE_RATE
}
