//! Engine context: the counters that outlive a single block.

use crate::config::EngineConfig;
use crate::telemetry::{Decimator, TelemetryKind, TelemetryQueue};
use crate::{BLOCK_SIZE, SAMPLE_RATE};

/// Elapsed-sample counter, telemetry ring and decimation counter.
///
/// Owned by the engine and passed by reference into every stateful node.
#[derive(Debug, Clone)]
pub struct EngineContext {
    elapsed: u64,
    block_time: f32,
    telemetry: TelemetryQueue,
    decimator: Decimator,
}

impl EngineContext {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            elapsed: 0,
            block_time: 0.0,
            telemetry: TelemetryQueue::new(config.telemetry_capacity),
            decimator: Decimator::new(config.telemetry_interval),
        }
    }

    /// Zero the counters and the telemetry cursor.
    pub fn reset(&mut self) {
        self.elapsed = 0;
        self.block_time = 0.0;
        self.telemetry.clear();
        self.decimator.reset();
    }

    /// Record the host time stamp of the block about to run.
    pub fn begin_block(&mut self, current_time: f32) {
        self.block_time = current_time;
    }

    /// Advance the sample counter by one block.
    pub fn end_block(&mut self) {
        self.elapsed += BLOCK_SIZE as u64;
    }

    /// Samples processed since the last reset. Diagnostic only.
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// Count one probe evaluation at `sample` of the current block and keep
    /// the record if the decimator fires.
    #[inline]
    pub fn probe(&mut self, kind: TelemetryKind, subtype: f32, payload: f32, sample: usize) {
        if self.decimator.tick() {
            let time = self.block_time + sample as f32 / SAMPLE_RATE;
            self.telemetry.push(kind.code(), subtype, payload, time);
        }
    }

    pub fn telemetry(&self) -> &TelemetryQueue {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut TelemetryQueue {
        &mut self.telemetry
    }
}
