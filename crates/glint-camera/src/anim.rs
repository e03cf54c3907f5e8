// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! Cubic easing records for camera quantities.

/// Instantaneous value and derivative of an [`Animated`] record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<const N: usize> {
    /// Interpolated value.
    pub value: [f64; N],
    /// Derivative in units per second.
    pub deriv: [f64; N],
}

/// One animated quantity eased along a cubic.
///
/// The cubic is pinned by the value and derivative at the start of the
/// window and by the target with a zero derivative at its end, so chained
/// retargets stay C1-continuous: a new goal sampled mid-flight starts from
/// the current value and velocity instead of jumping.
#[derive(Debug, Clone)]
pub struct Animated<const N: usize> {
    value0: [f64; N],
    deriv0: [f64; N],
    target: [f64; N],
    t0: u64,
    t1: u64,
}

impl<const N: usize> Animated<N> {
    /// A record already at rest on `value`.
    pub fn steady(value: [f64; N], now_ms: u64) -> Self {
        Self {
            value0: value,
            deriv0: [0.0; N],
            target: value,
            t0: now_ms,
            t1: now_ms,
        }
    }

    /// The value the record is heading toward.
    pub fn target(&self) -> [f64; N] {
        self.target
    }

    /// Whether the easing window has ended.
    pub fn settled(&self, now_ms: u64) -> bool {
        now_ms >= self.t1
    }

    /// Sample the cubic at `now_ms`.
    ///
    /// At or past the window end this is exactly the target with a zero
    /// derivative; a zero-length window resolves immediately.
    #[allow(clippy::cast_precision_loss)] // millisecond spans sit far below 2^52
    pub fn sample(&self, now_ms: u64) -> Sample<N> {
        if now_ms >= self.t1 {
            return Sample {
                value: self.target,
                deriv: [0.0; N],
            };
        }

        // Shift the window to start at zero and scale to seconds; the
        // normal equations are badly conditioned in milliseconds.
        let t1 = (self.t1 - self.t0) as f64 / 1000.0;
        let t = (now_ms.saturating_sub(self.t0)) as f64 / 1000.0;
        let det = t1 * t1 * t1 * t1;

        let mut value = [0.0; N];
        let mut deriv = [0.0; N];
        for i in 0..N {
            let x0 = self.value0[i];
            let x0d = self.deriv0[i];
            let b0 = self.target[i] - x0 - x0d * t1;
            let b1 = -x0d;
            let a = (3.0 * t1 * t1 * b0 - t1 * t1 * t1 * b1) / det;
            let b = (t1 * t1 * b1 - 2.0 * t1 * b0) / det;
            value[i] = x0 + x0d * t + a * t * t + b * t * t * t;
            deriv[i] = x0d + 2.0 * a * t + 3.0 * b * t * t;
        }
        Sample { value, deriv }
    }

    /// Start easing toward `target` over `duration_ms`.
    ///
    /// The current sample becomes the new starting pose, so retargeting
    /// mid-flight keeps the velocity it already had.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped above
    pub fn retarget(&mut self, target: [f64; N], duration_ms: f64, now_ms: u64) {
        let sample = self.sample(now_ms);
        self.value0 = sample.value;
        self.deriv0 = sample.deriv;
        self.target = target;
        self.t0 = now_ms;
        self.t1 = now_ms.saturating_add(duration_ms.max(0.0) as u64);
    }
}
