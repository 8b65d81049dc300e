//! Eased transition between two fill-colour tables.

use web_time::{Duration, Instant};

use super::uniforms::FillColorInput;
use crate::util::easing::quadratic_out;

/// Duration of a recolour transition.
pub const COLOR_FILL_DURATION: Duration = Duration::from_millis(150);

/// In-flight recolour: yields an interpolated [`FillColorInput`] each frame
/// until it reaches the target.
#[derive(Debug, Clone)]
pub struct ColorFillAnimation {
    from: FillColorInput,
    to: FillColorInput,
    start: Instant,
    duration: Duration,
}

impl ColorFillAnimation {
    /// Transition from `from` to `to` starting at `start`.
    #[must_use]
    pub fn new(from: FillColorInput, to: FillColorInput, start: Instant) -> Self {
        Self {
            from,
            to,
            start,
            duration: COLOR_FILL_DURATION,
        }
    }

    /// Interpolated input at `now` and whether the transition is finished.
    pub fn sample(&self, now: Instant) -> (FillColorInput, bool) {
        let elapsed = now.saturating_duration_since(self.start);
        if elapsed >= self.duration {
            return (self.to, true);
        }
        let t = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        (self.from.lerp(&self.to, quadratic_out(t)), false)
    }

    /// Final colour table.
    pub fn target(&self) -> &FillColorInput {
        &self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finishes_on_target() {
        let from = FillColorInput::by_element(&[[0.0; 4]]);
        let to = FillColorInput::by_element(&[[1.0; 4]]);
        let start = Instant::now();
        let anim = ColorFillAnimation::new(from, to, start);

        let (mid, done) = anim.sample(start + Duration::from_millis(75));
        assert!(!done);
        let red = mid.color_of(0, 0)[0];
        assert!(red > 0.0 && red < 1.0);

        let (end, done) = anim.sample(start + Duration::from_millis(200));
        assert!(done);
        assert_eq!(end, to);
    }
}
