//! Small numeric helpers shared across pipeline stages.

/// Linearly remaps `value` from `[src_min, src_max]` to `[dst_a, dst_b]`,
/// clamping the input to the source range first. `dst_a` may be larger than
/// `dst_b`, which makes this double as a penalty ramp.
pub fn scale(value: f32, src_min: f32, src_max: f32, dst_a: f32, dst_b: f32) -> f32 {
    debug_assert!(
        src_min <= src_max,
        "scale: src_min {src_min} larger than src_max {src_max}"
    );
    let v = value.clamp(src_min, src_max);
    let t = if src_max > src_min {
        (v - src_min) / (src_max - src_min)
    } else {
        0.0
    };
    dst_a * (1.0 - t) + dst_b * t
}

#[cfg(test)]
mod tests {
    use super::scale;

    #[test]
    fn scale_clamps_and_interpolates() {
        assert_eq!(scale(0.5, 0.0, 1.0, 0.0, 10.0), 5.0);
        assert_eq!(scale(-1.0, 0.0, 1.0, 0.0, 10.0), 0.0);
        assert_eq!(scale(2.0, 0.0, 1.0, 0.0, 10.0), 10.0);
    }

    #[test]
    fn scale_supports_descending_targets() {
        assert_eq!(scale(1.15, 1.15, 1.4, 1.0, 0.8), 1.0);
        assert_eq!(scale(1.4, 1.15, 1.4, 1.0, 0.8), 0.8);
        assert!(scale(1.3, 1.15, 1.4, 1.0, 0.8) < 1.0);
    }
}
