//! Axis scales and tick placement.

/// Maps a data interval onto a pixel interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    pub fn map(&self, v: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            return (r0 + r1) / 2.0;
        }
        round2(r0 + (v - d0) / (d1 - d0) * (r1 - r0))
    }

    /// Map `v` after clamping it into the domain, so out-of-range values
    /// are drawn at the axis limit instead of being dropped.
    pub fn map_clamped(&self, v: f64) -> f64 {
        let (lo, hi) = if self.domain.0 <= self.domain.1 {
            self.domain
        } else {
            (self.domain.1, self.domain.0)
        };
        self.map(v.clamp(lo, hi))
    }
}

/// Round a pixel coordinate to two decimals.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Padded `(min, max)` of `values`; degenerate ranges are widened.
pub fn padded_extent<I: IntoIterator<Item = f64>>(values: I, pad: f64) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if hi == lo {
        let delta = if lo == 0.0 { 1.0 } else { lo.abs() * 0.1 };
        return (lo - delta, hi + delta);
    }
    let margin = (hi - lo) * pad;
    (lo - margin, hi + margin)
}

/// Roughly `count` evenly spaced round tick values within `[lo, hi]`.
pub fn nice_ticks(lo: f64, hi: f64, count: usize) -> Vec<f64> {
    if lo.is_nan() || hi.is_nan() || hi <= lo || count == 0 {
        return vec![lo];
    }
    let raw = (hi - lo) / count as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);
    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).map(|i| i as f64 * step).collect()
}

/// Short tick label: integers without decimals, otherwise up to two.
pub fn tick_label(v: f64) -> String {
    if v.abs() >= 1e4 {
        format!("{:.0}", v)
    } else {
        crate::labels::format_number(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_and_clamp() {
        let scale = LinearScale::new((0.0, 10.0), (100.0, 200.0));
        assert_eq!(scale.map(5.0), 150.0);
        assert_eq!(scale.map_clamped(-3.0), 100.0);
        assert_eq!(scale.map_clamped(42.0), 200.0);
    }

    #[test]
    fn test_inverted_range() {
        let scale = LinearScale::new((0.0, 1.0), (300.0, 100.0));
        assert_eq!(scale.map(1.0), 100.0);
    }

    #[test]
    fn test_nice_ticks() {
        assert_eq!(nice_ticks(0.0, 35.0, 7), vec![0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0]);
        let unit = nice_ticks(0.0, 1.0, 5);
        assert_eq!(unit.len(), 6);
        assert_eq!(unit[0], 0.0);
        assert!((unit[5] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_padded_extent_degenerate() {
        assert_eq!(padded_extent([5.0, 5.0], 0.05), (4.5, 5.5));
        assert_eq!(padded_extent(std::iter::empty(), 0.05), (0.0, 1.0));
    }
}
