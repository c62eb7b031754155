//! Two-plane circular delay line read with linear interpolation.

/// Read-only view over the delay planes of parameter memory.
#[derive(Debug, Clone, Copy)]
pub struct DelayLine<'a> {
    planes: &'a [f32],
    capacity: usize,
}

impl<'a> DelayLine<'a> {
    /// `planes` holds two consecutive planes of `capacity` samples.
    pub fn new(planes: &'a [f32], capacity: usize) -> Self {
        debug_assert_eq!(planes.len(), 2 * capacity);
        Self { planes, capacity }
    }

    /// Interpolated read of `channel` at `position`, wrapping the upper
    /// neighbour at `loop_len` (limited to the plane capacity).
    ///
    /// Positions at or past the plane end restart at 0, negative positions
    /// are shifted up by one capacity.
    #[inline]
    pub fn read(&self, channel: usize, position: f32, loop_len: f32) -> f32 {
        let capacity = self.capacity as f32;
        let mut pos = position;
        if pos >= capacity {
            pos = 0.0;
        } else if pos < 0.0 {
            pos += capacity;
        }
        let floor = pos.floor();
        let frac = pos - floor;

        // Saturating casts; NaN positions land on 0 and propagate through `frac`.
        let mut index = floor as usize;
        if index >= self.capacity {
            index = 0;
        }
        let wrap = wrap_limit(loop_len, self.capacity);
        let mut next = index + 1;
        if next >= wrap {
            next = 0;
        }

        let plane = &self.planes[channel * self.capacity..(channel + 1) * self.capacity];
        (1.0 - frac) * plane[index] + frac * plane[next]
    }
}

/// Upper-neighbour wrap point: the loop length clamped to `[1, capacity]`.
#[inline]
fn wrap_limit(loop_len: f32, capacity: usize) -> usize {
    if loop_len.is_nan() || loop_len < 1.0 {
        return capacity;
    }
    (loop_len as usize).min(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ramp_planes(capacity: usize) -> Vec<f32> {
        let mut planes: Vec<f32> = (0..capacity).map(|i| i as f32).collect();
        planes.extend((0..capacity).map(|i| -(i as f32)));
        planes
    }

    #[test]
    fn reads_integer_positions_exactly() {
        let planes = ramp_planes(16);
        let line = DelayLine::new(&planes, 16);
        assert_eq!(line.read(0, 3.0, 16.0), 3.0);
        assert_eq!(line.read(1, 5.0, 16.0), -5.0);
    }

    #[test]
    fn wraps_next_sample_at_loop_length() {
        let planes = ramp_planes(16);
        let line = DelayLine::new(&planes, 16);
        // Between sample 7 and sample 0 of an 8-sample loop.
        let v = line.read(0, 7.5, 8.0);
        assert!((v - 3.5).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_positions_are_folded() {
        let planes = ramp_planes(16);
        let line = DelayLine::new(&planes, 16);
        assert_eq!(line.read(0, 20.0, 16.0), 0.0);
        assert_eq!(line.read(0, -2.0, 16.0), 14.0);
    }

    #[test]
    fn last_sample_interpolates_toward_loop_start() {
        let planes = ramp_planes(16);
        let line = DelayLine::new(&planes, 16);
        // Loop spans the whole plane: 15.5 sits between sample 15 and sample 0.
        assert_eq!(line.read(0, 15.5, 16.0), 7.5);
        assert_eq!(line.read(1, 15.25, 16.0), -11.25);
    }

    #[test]
    fn nan_position_does_not_panic() {
        let planes = ramp_planes(16);
        let line = DelayLine::new(&planes, 16);
        assert!(line.read(0, f32::NAN, 16.0).is_nan());
    }

    proptest! {
        #[test]
        fn interpolation_matches_formula(p in 0.0f32..64.0, len in 2usize..=64) {
            let capacity = 64;
            let planes: Vec<f32> = (0..2 * capacity).map(|i| ((i * 7919) % 113) as f32).collect();
            let line = DelayLine::new(&planes, capacity);
            let p = p % len as f32;
            let i = p.floor() as usize;
            let frac = p - p.floor();
            prop_assert!((0.0..1.0).contains(&frac));
            let expected = (1.0 - frac) * planes[i % len] + frac * planes[(i + 1) % len];
            let got = line.read(0, p, len as f32);
            prop_assert!((got - expected).abs() <= 1e-3 * expected.abs().max(1.0));
        }
    }
}
