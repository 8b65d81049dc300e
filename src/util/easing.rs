//! Easing curve for colour transitions.

/// Fast start, slow end. `t` is clamped to `[0, 1]`.
#[inline]
#[must_use]
pub fn quadratic_out(t: f32) -> f32 {
    let omt = 1.0 - t.clamp(0.0, 1.0);
    1.0 - omt * omt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_both_endpoints_and_clamps() {
        assert_eq!(quadratic_out(0.0), 0.0);
        assert_eq!(quadratic_out(1.0), 1.0);
        assert_eq!(quadratic_out(-2.0), 0.0);
        assert_eq!(quadratic_out(3.0), 1.0);
    }

    #[test]
    fn front_loads_progress() {
        assert_eq!(quadratic_out(0.5), 0.75);
        assert!(quadratic_out(0.25) > 0.25);
    }
}
