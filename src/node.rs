//! Stateless node kernels evaluated in vector passes.

#![forbid(unsafe_code)]

use crate::LANES;

/// ln(1000): the -60 dB decay constant.
pub const LN_1000: f32 = 6.907_755_3;

/// Two-input arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Unguarded IEEE division.
    Div,
    Min,
    Max,
    /// Floored modulo: `a - floor(a / b) * b`.
    Mod,
    /// Truncated remainder shifted into `[0, b)` when negative.
    WrapMod,
}

impl BinaryOp {
    #[inline]
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Min => a.min(b),
            BinaryOp::Max => a.max(b),
            BinaryOp::Mod => a - (a / b).floor() * b,
            BinaryOp::WrapMod => wrap_mod(a, b),
        }
    }

    /// Evaluate over a block, four lanes per step.
    pub fn eval_block(self, a: &[f32], b: &[f32], out: &mut [f32]) {
        match self {
            BinaryOp::Add => lanes2(a, b, out, |x, y| x + y),
            BinaryOp::Sub => lanes2(a, b, out, |x, y| x - y),
            BinaryOp::Mul => lanes2(a, b, out, |x, y| x * y),
            BinaryOp::Div => lanes2(a, b, out, |x, y| x / y),
            BinaryOp::Min => lanes2(a, b, out, f32::min),
            BinaryOp::Max => lanes2(a, b, out, f32::max),
            BinaryOp::Mod => lanes2(a, b, out, |x, y| x - (x / y).floor() * y),
            BinaryOp::WrapMod => lanes2(a, b, out, wrap_mod),
        }
    }
}

/// One-input transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `2^x`.
    Exp2,
    MsToSamples,
    SamplesToMs,
    /// Pole coefficient reaching -60 dB after `x` samples.
    T60,
}

impl UnaryOp {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            UnaryOp::Exp2 => x.exp2(),
            UnaryOp::MsToSamples => crate::ms_to_samples(x),
            UnaryOp::SamplesToMs => crate::samples_to_ms(x),
            UnaryOp::T60 => t60(x),
        }
    }

    pub fn eval_block(self, a: &[f32], out: &mut [f32]) {
        match self {
            UnaryOp::Exp2 => lanes1(a, out, f32::exp2),
            UnaryOp::MsToSamples => lanes1(a, out, crate::ms_to_samples),
            UnaryOp::SamplesToMs => lanes1(a, out, crate::samples_to_ms),
            UnaryOp::T60 => lanes1(a, out, t60),
        }
    }
}

/// `fmod` with negative results shifted up by the divisor.
#[inline]
pub fn wrap_mod(a: f32, b: f32) -> f32 {
    let m = a % b;
    if m >= 0.0 {
        m
    } else {
        b + m
    }
}

#[inline]
pub fn t60(samples: f32) -> f32 {
    (-LN_1000 / samples).exp()
}

#[inline]
fn lanes1(a: &[f32], out: &mut [f32], f: impl Fn(f32) -> f32) {
    for (o, a) in out.chunks_exact_mut(LANES).zip(a.chunks_exact(LANES)) {
        let r: [f32; LANES] = [f(a[0]), f(a[1]), f(a[2]), f(a[3])];
        o.copy_from_slice(&r);
    }
}

#[inline]
fn lanes2(a: &[f32], b: &[f32], out: &mut [f32], f: impl Fn(f32, f32) -> f32) {
    for ((o, a), b) in out
        .chunks_exact_mut(LANES)
        .zip(a.chunks_exact(LANES))
        .zip(b.chunks_exact(LANES))
    {
        let r: [f32; LANES] = [f(a[0], b[0]), f(a[1], b[1]), f(a[2], b[2]), f(a[3], b[3])];
        o.copy_from_slice(&r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floored_mod_is_non_negative_for_positive_divisor() {
        assert_eq!(BinaryOp::Mod.apply(-1.0, 4.0), 3.0);
        assert_eq!(BinaryOp::Mod.apply(9.0, 4.0), 1.0);
    }

    #[test]
    fn wrap_mod_matches_truncated_then_shifted() {
        assert_eq!(wrap_mod(5.5, 4.0), 1.5);
        assert_eq!(wrap_mod(-1.0, 4.0), 3.0);
        assert!(wrap_mod(1.0, 0.0).is_nan());
    }

    #[test]
    fn block_eval_matches_scalar_apply() {
        let a: Vec<f32> = (0..128).map(|i| i as f32 - 40.0).collect();
        let b: Vec<f32> = (0..128).map(|i| (i % 7) as f32 + 1.5).collect();
        let mut out = vec![0.0; 128];
        for op in [
            BinaryOp::Add,
            BinaryOp::Sub,
            BinaryOp::Mul,
            BinaryOp::Div,
            BinaryOp::Min,
            BinaryOp::Max,
            BinaryOp::Mod,
            BinaryOp::WrapMod,
        ] {
            op.eval_block(&a, &b, &mut out);
            for i in 0..128 {
                assert_eq!(out[i], op.apply(a[i], b[i]), "{:?} lane {}", op, i);
            }
        }
    }

    #[test]
    fn t60_reaches_minus_60_db() {
        let c = t60(100.0);
        let level = c.powi(100);
        assert!((level - 0.001).abs() < 1e-5);
    }
}
