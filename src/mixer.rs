//! Vactrol-style smoothing of the transport gate, used as the mixdown gain.
//!
//! The smoother is a one-pole lowpass whose time constant switches between a
//! rise and a fall time with the gate. Its state persists in the shared
//! filter slot of parameter memory.

use crate::node::t60;
use crate::store::ParameterStore;

/// Pole coefficient for the current gate value.
///
/// The decay time is interpolated between `fall_ms` (gate 0) and `rise_ms`
/// (gate 1) and held to at least one sample.
#[inline]
pub fn vactrol_coefficient(gate: f32, rise_ms: f32, fall_ms: f32) -> f32 {
    let decay_ms = rise_ms * gate + fall_ms * (1.0 - gate);
    t60(crate::ms_to_samples(decay_ms).max(1.0))
}

/// One step of `state ← state·coef + target·(1 − coef)`.
#[inline]
pub fn one_pole(state: f32, target: f32, coef: f32) -> f32 {
    state * coef + target * (1.0 - coef)
}

/// Smoother over one block.
pub fn run_one_pole(store: &mut ParameterStore, target: &[f32], coef: &[f32], out: &mut [f32]) {
    let mut state = store.filter_state();
    for ((o, &t), &c) in out.iter_mut().zip(target).zip(coef) {
        state = one_pole(state, t, c);
        *o = state;
    }
    store.set_filter_state(state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLayout;
    use proptest::prelude::*;

    #[test]
    fn two_ms_pole_matches_t60() {
        let coef = vactrol_coefficient(1.0, 2.0, 2.0);
        let samples: f32 = 88.2;
        assert!((coef - (-crate::node::LN_1000 / samples).exp()).abs() < 1e-6);
    }

    #[test]
    fn short_decay_is_held_to_one_sample() {
        assert_eq!(vactrol_coefficient(0.0, 0.0, 0.0), t60(1.0));
    }

    #[test]
    fn open_gate_converges_to_unity() {
        let mut store = ParameterStore::new(MemoryLayout::new(8));
        let target = [1.0; 128];
        let coef = [vactrol_coefficient(1.0, 2.0, 2.0); 128];
        let mut out = [0.0; 128];
        for _ in 0..8 {
            run_one_pole(&mut store, &target, &coef, &mut out);
        }
        assert!((store.filter_state() - 1.0).abs() < 1e-3);
        assert!(out.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn slew_is_limited_by_coefficient() {
        let mut store = ParameterStore::new(MemoryLayout::new(8));
        let target: Vec<f32> = (0..128).map(|i| if (i / 16) % 2 == 0 { 1.0 } else { 0.0 }).collect();
        let coef: Vec<f32> = target
            .iter()
            .map(|&g| vactrol_coefficient(g, 2.0, 2.0))
            .collect();
        let mut out = vec![0.0; 128];
        run_one_pole(&mut store, &target, &coef, &mut out);
        let mut prev = 0.0;
        for (j, &y) in out.iter().enumerate() {
            assert!((y - prev).abs() <= (1.0 - coef[j]) + 1e-6);
            assert!((0.0..=1.0).contains(&y));
            prev = y;
        }
    }

    #[test]
    fn error_shrinks_by_coefficient_each_sample() {
        let mut store = ParameterStore::new(MemoryLayout::new(8));
        let c = vactrol_coefficient(1.0, 20.0, 20.0);
        let target = [1.0; 128];
        let coef = [c; 128];
        let mut out = [0.0; 128];
        run_one_pole(&mut store, &target, &coef, &mut out);
        let mut prev_err: f32 = -1.0;
        for &y in &out {
            let err = y - 1.0;
            assert!((err / prev_err - c).abs() < 1e-4);
            prev_err = err;
        }
    }

    proptest! {
        #[test]
        fn one_pole_error_is_geometric(
            start in -1.0f32..1.0,
            target in -1.0f32..1.0,
            c in 0.0f32..0.999,
        ) {
            prop_assume!((start - target).abs() > 0.05);
            let next = one_pole(start, target, c);
            let ratio = (next - target) / (start - target);
            prop_assert!((ratio - c).abs() < 1e-4);
        }
    }
}
