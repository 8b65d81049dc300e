//! Index windows over the shared billboard buffers, one per configuration,
//! and the timer that steps through them during playback.

use web_time::{Duration, Instant};

use crate::geometry::{
    billboard::INDICES_PER_ATOM, bonds::INDICES_PER_BOND, BondTopology,
};

/// Contiguous range of the index buffer, in indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigurationWindow {
    /// First index of the range.
    pub offset: u32,
    /// Number of indices. Zero means there is nothing to draw.
    pub length: u32,
}

impl ConfigurationWindow {
    /// Window with no indices.
    pub const EMPTY: Self = Self {
        offset: 0,
        length: 0,
    };

    /// Whether a draw over this window should be skipped.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Index range for `draw_indexed`.
    pub fn range(&self) -> std::ops::Range<u32> {
        self.offset..self.offset + self.length
    }
}

/// Bond counts and starts per configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BondWindows {
    per_configuration: Vec<u32>,
    array_starts: Vec<u32>,
}

/// Selects which configuration of a multi-configuration structure is
/// drawn, as an index window into the shared buffers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigurationSelector {
    configuration_count: usize,
    indices_per_configuration: u32,
    current: usize,
    bonds: Option<BondWindows>,
}

impl ConfigurationSelector {
    /// Selector for `configuration_count` configurations of
    /// `atoms_per_configuration` atoms each.
    #[must_use]
    pub fn new(atoms_per_configuration: usize, configuration_count: usize) -> Self {
        Self {
            configuration_count,
            indices_per_configuration: (atoms_per_configuration
                * INDICES_PER_ATOM) as u32,
            current: 0,
            bonds: None,
        }
    }

    /// Selector with no geometry; every window is empty.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Attach per-configuration bond windows.
    pub fn set_bonds(&mut self, topology: &BondTopology) {
        self.bonds = Some(BondWindows {
            per_configuration: topology.per_configuration.clone(),
            array_starts: topology.array_starts(),
        });
    }

    /// Drop bond windows (structure has no bonds).
    pub fn clear_bonds(&mut self) {
        self.bonds = None;
    }

    /// Number of configurations.
    pub fn configuration_count(&self) -> usize {
        self.configuration_count
    }

    /// Index of the configuration currently selected.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Indices in the whole index buffer.
    pub fn total_index_count(&self) -> u32 {
        self.indices_per_configuration * self.configuration_count as u32
    }

    /// Window of configuration `index`, empty if out of range.
    pub fn window(&self, index: usize) -> ConfigurationWindow {
        if index >= self.configuration_count {
            return ConfigurationWindow::EMPTY;
        }
        ConfigurationWindow {
            offset: index as u32 * self.indices_per_configuration,
            length: self.indices_per_configuration,
        }
    }

    /// Window of the current configuration.
    pub fn current_window(&self) -> ConfigurationWindow {
        self.window(self.current)
    }

    /// Bond index window of the current configuration; empty without bonds.
    pub fn current_bond_window(&self) -> ConfigurationWindow {
        let Some(bonds) = &self.bonds else {
            return ConfigurationWindow::EMPTY;
        };
        match (
            bonds.array_starts.get(self.current),
            bonds.per_configuration.get(self.current),
        ) {
            (Some(&start), Some(&count)) => ConfigurationWindow {
                offset: start * INDICES_PER_BOND as u32,
                length: count * INDICES_PER_BOND as u32,
            },
            _ => ConfigurationWindow::EMPTY,
        }
    }

    /// Step to the next configuration, wrapping around. No-op with fewer
    /// than two configurations.
    pub fn advance(&mut self) {
        if self.configuration_count > 1 {
            self.current = (self.current + 1) % self.configuration_count;
        }
    }

    /// Step to the previous configuration, wrapping around.
    pub fn previous(&mut self) {
        if self.configuration_count > 1 {
            self.current = (self.current + self.configuration_count - 1)
                % self.configuration_count;
        }
    }

    /// Jump to configuration `index`. Returns `false` if out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.configuration_count {
            self.current = index;
            true
        } else {
            false
        }
    }
}

/// Timer that advances a [`ConfigurationSelector`] at a fixed rate.
pub struct PlaybackClock {
    last_advance: Instant,
    frame_duration: Duration,
    playing: bool,
    looping: bool,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new(30.0)
    }
}

impl PlaybackClock {
    /// Paused clock stepping at `fps` configurations per second.
    #[must_use]
    pub fn new(fps: f32) -> Self {
        let mut clock = Self {
            last_advance: Instant::now(),
            frame_duration: Duration::ZERO,
            playing: false,
            looping: true,
        };
        clock.set_fps(fps);
        clock
    }

    /// Advance `selector` if playing and a step is due. Returns whether the
    /// configuration changed.
    pub fn tick(
        &mut self,
        now: Instant,
        selector: &mut ConfigurationSelector,
    ) -> bool {
        if !self.playing || selector.configuration_count() < 2 {
            return false;
        }
        if now.duration_since(self.last_advance) < self.frame_duration {
            return false;
        }
        self.last_advance = now;

        let last = selector.configuration_count() - 1;
        if selector.current_index() == last && !self.looping {
            self.playing = false;
            return false;
        }
        selector.advance();
        true
    }

    /// Start or stop playback.
    pub fn set_playing(&mut self, playing: bool) {
        if playing && !self.playing {
            // Reset advance timer so we don't immediately skip frames
            self.last_advance = Instant::now();
        }
        self.playing = playing;
    }

    /// Toggle between playing and paused states.
    pub fn toggle_playback(&mut self) {
        self.set_playing(!self.playing);
    }

    /// Set playback speed in configurations per second (clamped to >= 0.1).
    pub fn set_fps(&mut self, fps: f32) {
        self.frame_duration = Duration::from_secs_f64(1.0 / f64::from(fps.max(0.1)));
    }

    /// Enable or disable wrapping back to the first configuration.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Whether the clock is currently advancing configurations.
    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::billboard::TRIANGLES_PER_ATOM;

    #[test]
    fn windows_tile_the_index_buffer() {
        for count in 1..=6 {
            let selector = ConfigurationSelector::new(37, count);
            let mut expected_offset = 0;
            let mut total = 0;
            for i in 0..count {
                let w = selector.window(i);
                assert_eq!(w.offset, expected_offset);
                assert_eq!(w.offset % (37 * INDICES_PER_ATOM as u32), 0);
                expected_offset = w.offset + w.length;
                total += w.length;
            }
            assert_eq!(total, selector.total_index_count());
        }
    }

    #[test]
    fn advance_is_cyclic() {
        let mut selector = ConfigurationSelector::new(10, 5);
        let start = selector.current_window();
        for _ in 0..5 {
            selector.advance();
        }
        assert_eq!(selector.current_window(), start);
        selector.previous();
        assert_eq!(selector.current_index(), 4);
    }

    #[test]
    fn single_configuration_never_moves() {
        let mut selector = ConfigurationSelector::new(10, 1);
        let full = selector.current_window();
        assert_eq!(full, ConfigurationWindow { offset: 0, length: 60 });
        selector.advance();
        selector.previous();
        assert_eq!(selector.current_window(), full);
    }

    #[test]
    fn no_geometry_gives_empty_window() {
        let selector = ConfigurationSelector::empty();
        assert!(selector.current_window().is_empty());
        assert!(selector.current_bond_window().is_empty());
    }

    #[test]
    fn thousand_atoms_four_configurations() {
        let mut selector = ConfigurationSelector::new(1000, 4);
        let triangles_per_configuration = 1000 * TRIANGLES_PER_ATOM as u32;
        for i in 0..4 {
            assert_eq!(selector.window(i).length, triangles_per_configuration * 3);
        }
        for _ in 0..4 {
            selector.advance();
        }
        assert_eq!(selector.current_index(), 0);
    }

    #[test]
    fn bond_windows_follow_configuration() {
        let mut selector = ConfigurationSelector::new(4, 3);
        selector.set_bonds(&BondTopology {
            pairs: vec![[0, 1]; 6],
            per_configuration: vec![1, 3, 2],
        });
        selector.advance();
        let w = selector.current_bond_window();
        assert_eq!(w.offset, INDICES_PER_BOND as u32);
        assert_eq!(w.length, 3 * INDICES_PER_BOND as u32);
    }

    #[test]
    fn clock_steps_when_due() {
        let mut selector = ConfigurationSelector::new(2, 3);
        let mut clock = PlaybackClock::new(10.0);
        let start = Instant::now();
        assert!(!clock.tick(start + Duration::from_secs(1), &mut selector));
        clock.set_playing(true);
        let later = Instant::now() + Duration::from_millis(150);
        assert!(clock.tick(later, &mut selector));
        assert_eq!(selector.current_index(), 1);
        assert!(!clock.tick(later + Duration::from_millis(10), &mut selector));
    }

    #[test]
    fn clock_without_looping_stops_at_end() {
        let mut selector = ConfigurationSelector::new(2, 2);
        let mut clock = PlaybackClock::new(10.0);
        clock.set_looping(false);
        clock.set_playing(true);
        let mut now = Instant::now();
        now += Duration::from_millis(200);
        assert!(clock.tick(now, &mut selector));
        now += Duration::from_millis(200);
        assert!(!clock.tick(now, &mut selector));
        assert!(!clock.is_playing());
        assert_eq!(selector.current_index(), 1);
    }
}
