//! Engine facade: owns parameter memory, the compiled patch and the context,
//! and exposes the host entry points.

use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::control::{new_control_queue, ControlMsg};
use crate::error::Error;
use crate::invariant_ppt::{assert_invariant, HOST_WRITE_GUARDED};
use crate::patch::{build_patch, Patch};
use crate::plan::Plan;
use crate::rt::{process_block_safe, Runtime};
use crate::store::{MemoryLayout, Param, ParameterStore};
use crate::telemetry::{TelemetryMessage, TelemetryQueue};
use crate::{BLOCK_SIZE, CHANNELS, VOICE_COUNT};
use rtrb::{Consumer, Producer};

/// The granular pitch-shifter.
///
/// Build with [`Engine::new`], call [`Engine::init`] once, then call
/// [`Engine::process`] once per 128-sample block.
pub struct Engine {
    config: EngineConfig,
    store: ParameterStore,
    ctx: EngineContext,
    patch: Patch,
    runtime: Runtime,
    control_rx: Consumer<ControlMsg>,
    control_tx: Option<Producer<ControlMsg>>,
    initialized: bool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("elapsed", &self.ctx.elapsed())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Validate `config`, allocate parameter memory and compile the patch.
    pub fn new(config: EngineConfig) -> Result<Self, Error> {
        config.validate()?;
        let layout = MemoryLayout::new(config.loop_capacity);
        let store = ParameterStore::new(layout);
        let patch = build_patch(&config)?;
        let plan = Plan::compile(&patch.graph)?;
        let runtime = Runtime::new(plan, &patch.graph);
        let ctx = EngineContext::new(&config);
        let (control_tx, control_rx) = new_control_queue();

        log::info!(
            "engine ready: {} words of parameter memory, {} plan steps, {} voices",
            store.len(),
            runtime.plan().steps.len(),
            VOICE_COUNT
        );

        Ok(Self {
            config,
            store,
            ctx,
            patch,
            runtime,
            control_rx,
            control_tx: Some(control_tx),
            initialized: false,
        })
    }

    /// Reset the context and runtime-held node state. Must run before the
    /// first [`Engine::process`] call; parameter memory is left untouched.
    pub fn init(&mut self) {
        self.ctx.reset();
        self.runtime.reset();
        self.initialized = true;
        log::debug!("engine initialized");
    }

    /// Run one block.
    ///
    /// `outputs` receives the left plane followed by the right plane, 128
    /// samples each. The input slice is accepted for host compatibility and is not
    /// read. `current_time` stamps telemetry records written during the block.
    /// Before [`Engine::init`], or when `outputs` is too short, the output is silence.
    pub fn process(&mut self, _inputs: &[f32], outputs: &mut [f32], current_time: f32) {
        if !self.initialized || outputs.len() < CHANNELS * BLOCK_SIZE {
            outputs.fill(0.0);
            return;
        }
        let out = &mut outputs[..CHANNELS * BLOCK_SIZE];

        while let Ok(msg) = self.control_rx.pop() {
            self.apply(msg);
        }

        self.ctx.begin_block(current_time);
        process_block_safe(&mut self.runtime, &mut self.store, &mut self.ctx, out);
        self.ctx.end_block();
    }

    fn apply(&mut self, msg: ControlMsg) {
        match msg {
            ControlMsg::SetParam { param, value } => self.store.write(param, value),
            ControlMsg::Click { level } => self.store.write(Param::Click, level),
            ControlMsg::ClearTelemetry => self.ctx.telemetry_mut().clear(),
        }
    }

    /// Host write of one control slot.
    pub fn set_parameter(&mut self, index: usize, value: f32) -> Result<(), Error> {
        let result = self.store.set_parameter(index, value);
        assert_invariant(
            HOST_WRITE_GUARDED,
            result.is_ok() || Param::from_index(index).is_none(),
            "host control slots are always writable",
            Some("Engine::set_parameter"),
        );
        if let Err(e) = &result {
            log::warn!("rejected write of {} to slot {}: {}", value, index, e);
        }
        result.map_err(Error::from)
    }

    /// Typed host write.
    pub fn set(&mut self, param: Param, value: f32) {
        self.store.write(param, value);
    }

    /// Host write of a contiguous range (typically delay material). Returns
    /// the number of words written.
    pub fn bulk_load(&mut self, index: usize, data: &[f32]) -> usize {
        let written = self.store.bulk_load(index, data);
        if written < data.len() {
            log::warn!(
                "bulk load at {} truncated: {} of {} words written",
                index,
                written,
                data.len()
            );
        }
        written
    }

    /// Write every control parameter's default value.
    pub fn load_default_controls(&mut self) {
        self.store.load_default_controls();
        log::debug!("default controls loaded");
    }

    /// The whole telemetry array, in storage order.
    pub fn flush_telemetry(&self) -> &[TelemetryMessage] {
        self.ctx.telemetry().snapshot()
    }

    /// Reset the telemetry cursor.
    pub fn clear_telemetry(&mut self) {
        self.ctx.telemetry_mut().clear();
    }

    /// Raw telemetry cursor.
    pub fn telemetry_count(&self) -> usize {
        self.ctx.telemetry().count()
    }

    pub fn telemetry(&self) -> &TelemetryQueue {
        self.ctx.telemetry()
    }

    /// Samples processed since [`Engine::init`]. Diagnostic only.
    pub fn elapsed(&self) -> u64 {
        self.ctx.elapsed()
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ParameterStore {
        &mut self.store
    }

    /// The compiled topology, for locating node planes in [`Engine::runtime`].
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    /// Runtime holding every node's output plane from the last block.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Retriggers honoured by `voice` since [`Engine::init`].
    pub fn retriggers(&self, voice: usize) -> Option<u64> {
        let node = *self.patch.voices.get(voice)?;
        self.runtime.retriggers(node)
    }

    /// Take the producer side of the control queue. Returns `None` after the first call.
    pub fn control_producer(&mut self) -> Option<Producer<ControlMsg>> {
        self.control_tx.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriggerRouting;

    fn engine(routing: TriggerRouting) -> Engine {
        let config = EngineConfig::default()
            .with_loop_capacity(4096)
            .with_trigger_routing(routing);
        let mut engine = Engine::new(config).unwrap();
        engine.load_default_controls();
        engine.init();
        engine
    }

    #[test]
    fn engine_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Engine>();
    }

    #[test]
    fn process_before_init_is_silent() {
        let mut engine = Engine::new(EngineConfig::default().with_loop_capacity(64)).unwrap();
        let mut out = vec![1.0; CHANNELS * BLOCK_SIZE];
        engine.process(&[], &mut out, 0.0);
        assert!(out.iter().all(|&x| x == 0.0));
        assert_eq!(engine.elapsed(), 0);
    }

    #[test]
    fn first_block_latches_every_broadcast_voice_once() {
        let mut engine = engine(TriggerRouting::Broadcast);
        let mut out = vec![0.0; CHANNELS * BLOCK_SIZE];
        engine.process(&[], &mut out, 0.0);
        for v in 0..VOICE_COUNT {
            assert_eq!(engine.retriggers(v), Some(1), "voice {}", v);
        }
        assert!(out.iter().all(|x| x.is_finite()));
        assert_eq!(engine.elapsed(), BLOCK_SIZE as u64);
    }

    #[test]
    fn cascade_hands_single_trigger_to_first_voice_only() {
        let mut engine = engine(TriggerRouting::Cascade);
        let mut out = vec![0.0; CHANNELS * BLOCK_SIZE];
        engine.process(&[], &mut out, 0.0);
        assert_eq!(engine.retriggers(0), Some(1));
        for v in 1..VOICE_COUNT {
            assert_eq!(engine.retriggers(v), Some(0));
        }
    }

    #[test]
    fn rejected_write_leaves_memory_untouched() {
        let mut engine = engine(TriggerRouting::Cascade);
        let slot = engine.store().layout().filter_state();
        assert!(engine.set_parameter(slot, 9.0).is_err());
        assert_eq!(engine.store().get(slot), 0.0);
        engine.set_parameter(Param::Semitones.index(), 7.0).unwrap();
        assert_eq!(engine.store().read(Param::Semitones), 7.0);
    }

    #[test]
    fn control_messages_apply_on_next_block() {
        let mut engine = engine(TriggerRouting::Cascade);
        let mut tx = engine.control_producer().unwrap();
        assert!(engine.control_producer().is_none());
        tx.push(ControlMsg::SetParam {
            param: Param::Tempo,
            value: 60.0,
        })
        .unwrap();
        assert_eq!(engine.store().read(Param::Tempo), 120.0);
        let mut out = vec![0.0; CHANNELS * BLOCK_SIZE];
        engine.process(&[], &mut out, 0.0);
        assert_eq!(engine.store().read(Param::Tempo), 60.0);
    }
}
