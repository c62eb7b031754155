//! Top-level control logic shared by all voices: the click port, the two
//! resettable ramps, the density phasor and the ramp-to-trigger detector.
//!
//! Each piece is a small state record with a per-sample `step`, plus a block
//! routine that loads the record from parameter memory, scans the block in
//! ascending sample order and stores it back.

use crate::node::wrap_mod;
use crate::store::{
    ParameterStore, Param, CLICK_LATCH_SLOT, CLICK_RAMP_SLOT, EDGE_HISTORY_SLOT,
    PHASOR_HISTORY_SLOT, PHASOR_SLOT, TRANSPORT_SLOT,
};

/// Self-clearing click port with its latched level.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClickState {
    /// Pending click; nonzero until read.
    pub pending: f32,
    /// Level of the last click.
    pub latched: f32,
}

impl ClickState {
    pub fn load(store: &ParameterStore) -> Self {
        Self {
            pending: store.read(Param::Click),
            latched: store.get(CLICK_LATCH_SLOT),
        }
    }

    pub fn save(&self, store: &mut ParameterStore) {
        store.write(Param::Click, self.pending);
        store.set(CLICK_LATCH_SLOT, self.latched);
    }

    /// Returns `(pulse, level)`. The pulse is the pending click, which is
    /// then cleared; a positive pulse also becomes the latched level.
    #[inline]
    pub fn step(&mut self) -> (f32, f32) {
        let pulse = self.pending;
        if pulse > 0.0 {
            self.pending = 0.0;
            self.latched = pulse;
        }
        (pulse, self.latched)
    }
}

/// The two ramps reset together by a click.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransportState {
    /// Accumulates the latched click level each sample; drives the gate.
    pub click_ramp: f32,
    /// Transport position; advances while the gate is open.
    pub position: f32,
}

impl TransportState {
    pub fn load(store: &ParameterStore) -> Self {
        Self {
            click_ramp: store.get(CLICK_RAMP_SLOT),
            position: store.get(TRANSPORT_SLOT),
        }
    }

    pub fn save(&self, store: &mut ParameterStore) {
        store.set(CLICK_RAMP_SLOT, self.click_ramp);
        store.set(TRANSPORT_SLOT, self.position);
    }

    /// Returns `(gate, position)` for this sample.
    ///
    /// The gate is open while the advanced click ramp lies strictly inside
    /// `(0, window)`. The position is `speed` plus the previous position
    /// wrapped to the loop while the gate is open, `speed` alone otherwise.
    /// A click resets both stored ramps to 0.
    #[inline]
    pub fn step(&mut self, click: f32, level: f32, window: f32, loop_len: f32, speed: f32) -> (f32, f32) {
        let ramp = level + self.click_ramp;
        let gate = if ramp < window && ramp > 0.0 { 1.0 } else { 0.0 };
        let held = if gate > 0.0 {
            wrap_mod(self.position, loop_len)
        } else {
            0.0
        };
        let position = speed + held;
        let clicked = click != 0.0;
        self.position = if clicked { 0.0 } else { position };
        self.click_ramp = if clicked { 0.0 } else { ramp };
        (gate, position)
    }
}

/// Wrapping phase accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhasorState {
    pub accumulator: f32,
}

impl PhasorState {
    pub fn load(store: &ParameterStore) -> Self {
        Self {
            accumulator: store.get(PHASOR_SLOT),
        }
    }

    pub fn save(&self, store: &mut ParameterStore) {
        store.set(PHASOR_SLOT, self.accumulator);
    }

    /// Emit the current phase, then advance by `increment`, subtracting 1 once at or past 1.
    #[inline]
    pub fn step(&mut self, increment: f32) -> f32 {
        let phase = self.accumulator;
        self.accumulator += increment;
        if self.accumulator >= 1.0 {
            self.accumulator -= 1.0;
        }
        phase
    }
}

/// Turns ramp discontinuities into one-sample triggers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeState {
    /// Previous ramp value.
    pub previous: f32,
    /// Previous jump comparison (0 or 1).
    pub jumped: f32,
}

impl EdgeState {
    pub fn load(store: &ParameterStore) -> Self {
        Self {
            previous: store.get(PHASOR_HISTORY_SLOT),
            jumped: store.get(EDGE_HISTORY_SLOT),
        }
    }

    pub fn save(&self, store: &mut ParameterStore) {
        store.set(PHASOR_HISTORY_SLOT, self.previous);
        store.set(EDGE_HISTORY_SLOT, self.jumped);
    }

    /// 1 on the sample where the relative change `(x - prev) / (x + prev)`
    /// first exceeds 0.5 in magnitude, 0 otherwise.
    #[inline]
    pub fn step(&mut self, ramp: f32) -> f32 {
        let prev = self.previous;
        self.previous = ramp;
        let sum = ramp + prev;
        let ratio = if sum == 0.0 { 0.0 } else { (ramp - prev) / sum };
        let jumped = if ratio.abs() > 0.5 { 1.0 } else { 0.0 };
        let delta = jumped - self.jumped;
        self.jumped = jumped;
        if sign(delta) > 0.0 {
            1.0
        } else {
            0.0
        }
    }
}

#[inline]
fn sign(x: f32) -> f32 {
    ((0.0 < x) as i32 - (x < 0.0) as i32) as f32
}

/// Click port over one block.
pub fn run_click(store: &mut ParameterStore, pulse: &mut [f32], level: &mut [f32]) {
    let mut state = ClickState::load(store);
    for (p, l) in pulse.iter_mut().zip(level.iter_mut()) {
        let (np, nl) = state.step();
        *p = np;
        *l = nl;
    }
    state.save(store);
}

/// Transport ramps over one block. `inputs` are click, level, window, loop length, speed.
pub fn run_transport(
    store: &mut ParameterStore,
    inputs: [&[f32]; 5],
    gate: &mut [f32],
    position: &mut [f32],
) {
    let [click, level, window, loop_len, speed] = inputs;
    let mut state = TransportState::load(store);
    for j in 0..gate.len() {
        let (g, p) = state.step(click[j], level[j], window[j], loop_len[j], speed[j]);
        gate[j] = g;
        position[j] = p;
    }
    state.save(store);
}

/// Phasor over one block.
pub fn run_phasor(store: &mut ParameterStore, increment: &[f32], out: &mut [f32]) {
    let mut state = PhasorState::load(store);
    for (o, &inc) in out.iter_mut().zip(increment) {
        *o = state.step(inc);
    }
    state.save(store);
}

/// Ramp-to-trigger over one block.
pub fn run_ramp_to_trig(store: &mut ParameterStore, ramp: &[f32], out: &mut [f32]) {
    let mut state = EdgeState::load(store);
    for (o, &x) in out.iter_mut().zip(ramp) {
        *o = state.step(x);
    }
    state.save(store);
}
