//! Grain voice: a retriggerable read head over the delay line with a
//! blended triangle / raised-cosine envelope.
//!
//! Every voice runs the same routine, parametrized by its index. Shape
//! controls are read from parameter memory once per block; the per-voice
//! record (phase, latched ratio, latched playhead, accumulator) is loaded at
//! block start and stored back at block end.

use crate::context::EngineContext;
use crate::delay::DelayLine;
use crate::node::wrap_mod;
use crate::states::GrainState;
use crate::store::{Param, ParameterStore, VoiceRecord};
use crate::telemetry::TelemetryKind;
use crate::{ms_to_samples, LANES};
use std::f32::consts::PI;

/// Accumulator wrap point.
pub const ACCUMULATOR_WRAP: f32 = 100_000_000.0;

/// Grain length in units of the density period.
const GRAIN_STRETCH: f32 = 1.1;

/// Block-constant envelope and direction controls shared by all voices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainShape {
    /// Edge fade width in [0, 1].
    pub width: f32,
    /// Weight of the edge fade against the raised cosine.
    pub fade_blend: f32,
    /// Triangle apex in [0, 1].
    pub peak: f32,
    /// 1 forwards, -1 reversed.
    pub direction: f32,
    /// `2^(semitones / 12)`.
    pub transpose: f32,
    /// Grain size control.
    pub size: f32,
}

impl GrainShape {
    pub fn from_store(store: &ParameterStore) -> Self {
        Self {
            width: (1.0 - store.read(Param::FadeWidth)).clamp(0.0, 1.0),
            fade_blend: store.read(Param::FadeBlend),
            peak: store.read(Param::EnvelopePeak),
            direction: if store.read(Param::Reverse) > 0.5 { -1.0 } else { 1.0 },
            transpose: (store.read(Param::Semitones) / 12.0).exp2(),
            size: store.read(Param::GrainSize),
        }
    }

    /// Grain length in samples at `density` grains per second.
    #[inline]
    pub fn duration(&self, density: f32) -> f32 {
        ms_to_samples(self.size * GRAIN_STRETCH * (1.0 / density * 1000.0))
    }

    /// Envelope gain at `phase`.
    #[inline]
    pub fn envelope(&self, phase: f32) -> f32 {
        let tri = triangle(phase, self.peak);
        let clamped = tri.clamp(0.0, 1.0);
        let edge = if clamped >= self.width {
            1.0
        } else {
            let arg = if self.width == 0.0 {
                0.0
            } else {
                clamped * PI / self.width
            };
            (1.0 - arg.cos()) * 0.5
        };
        let raised = (1.0 - (tri * PI).cos()) / 2.0;
        edge * self.fade_blend + raised * (1.0 - self.fade_blend)
    }
}

/// Rises 0→1 over `[0, peak)` and falls 1→0 over `[peak, 1]`.
#[inline]
pub fn triangle(phase: f32, peak: f32) -> f32 {
    if phase < peak {
        if peak == 0.0 {
            0.0
        } else {
            phase / peak
        }
    } else {
        let span = 1.0 - peak;
        1.0 - if span == 0.0 { 0.0 } else { (phase - peak) / span }
    }
}

/// One sample of a voice, before the delay read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Voice was busy at the start of the sample.
    pub active: bool,
    /// A retrigger was honoured on this sample.
    pub fired: bool,
    /// Grain phase after this sample.
    pub phase: f32,
    /// Read position within the loop.
    pub position: f32,
}

/// Advance `record` by one sample.
///
/// `rising` is true on the first sample of a positive trigger. It only takes
/// effect while the voice is idle (previous phase ≤ 0).
#[inline]
pub fn advance(
    record: &mut VoiceRecord,
    rising: bool,
    ratio: f32,
    playhead: f32,
    duration: f32,
    direction: f32,
    loop_len: f32,
) -> Tick {
    let active = record.phase > 0.0;
    let fired = rising && !active;
    if fired {
        record.pitch_ratio = ratio;
        record.playhead = playhead;
        record.accumulator = 0.0;
    }

    let acc = record.accumulator;
    let mut next = acc + record.pitch_ratio;
    if next >= ACCUMULATOR_WRAP {
        next -= ACCUMULATOR_WRAP;
    }
    record.accumulator = next;

    let mut phase = if duration == 0.0 { 0.0 } else { acc / duration };
    if phase >= 1.0 {
        phase = 0.0;
    }
    record.phase = phase;

    Tick {
        active,
        fired,
        phase,
        position: wrap_mod(acc * direction + record.playhead, loop_len),
    }
}

/// Borrowed input planes of one voice for one block.
#[derive(Debug, Clone, Copy)]
pub struct GrainInputs<'a> {
    pub loop_len: &'a [f32],
    pub trigger: &'a [f32],
    pub playhead: &'a [f32],
    pub pitch_offset: &'a [f32],
    pub density: &'a [f32],
}

/// Output planes of one voice for one block.
#[derive(Debug)]
pub struct GrainOutputs<'a> {
    pub left: &'a mut [f32],
    pub through: &'a mut [f32],
    pub gate: &'a mut [f32],
    pub right: &'a mut [f32],
}

/// Run voice `voice` over one block.
pub fn run_grain(
    voice: usize,
    store: &mut ParameterStore,
    ctx: &mut EngineContext,
    state: &mut GrainState,
    inputs: GrainInputs<'_>,
    outputs: GrainOutputs<'_>,
) {
    let shape = GrainShape::from_store(store);

    // Vector pre-pass: grain length and unlatched ratio.
    for ((dur, ratio), (density, offset)) in state
        .duration
        .chunks_exact_mut(LANES)
        .zip(state.ratio.chunks_exact_mut(LANES))
        .zip(
            inputs
                .density
                .chunks_exact(LANES)
                .zip(inputs.pitch_offset.chunks_exact(LANES)),
        )
    {
        for k in 0..LANES {
            dur[k] = shape.duration(density[k]);
            ratio[k] = shape.transpose + offset[k];
        }
    }

    // Scalar scan.
    let mut record = store.voice(voice);
    let capacity = store.layout().loop_capacity();
    let delay = DelayLine::new(store.delay(), capacity);
    for j in 0..outputs.left.len() {
        let trig = inputs.trigger[j];
        let rising = trig > 0.0 && state.previous_trigger <= 0.0;
        state.previous_trigger = trig;

        let tick = advance(
            &mut record,
            rising,
            state.ratio[j],
            inputs.playhead[j],
            state.duration[j],
            shape.direction,
            inputs.loop_len[j],
        );
        if tick.fired {
            state.retriggers += 1;
        }
        ctx.probe(TelemetryKind::VoicePlayhead, voice as f32, tick.position, j);

        let env = shape.envelope(tick.phase);
        state.envelope[j] = env;
        outputs.left[j] = delay.read(0, tick.position, inputs.loop_len[j]) * env;
        outputs.right[j] = delay.read(1, tick.position, inputs.loop_len[j]);
        outputs.gate[j] = if tick.active { 1.0 } else { 0.0 };
    }
    store.store_voice(voice, &record);

    // Vector post-passes: right channel weighting and trigger hand-off.
    for (right, env) in outputs
        .right
        .chunks_exact_mut(LANES)
        .zip(state.envelope.chunks_exact(LANES))
    {
        for k in 0..LANES {
            right[k] *= env[k];
        }
    }
    for ((through, gate), trig) in outputs
        .through
        .chunks_exact_mut(LANES)
        .zip(outputs.gate.chunks_exact(LANES))
        .zip(inputs.trigger.chunks_exact(LANES))
    {
        for k in 0..LANES {
            through[k] = if gate[k] > 0.0 { trig[k] } else { 0.0 };
        }
    }
}
