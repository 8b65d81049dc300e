//! Frame pacing on the CPU side and GPU completion statistics.

use std::sync::{Arc, Mutex, PoisonError};

use web_time::{Duration, Instant};

/// Weight of the newest sample in the fps moving average.
const FPS_SMOOTHING: f32 = 0.05;

/// Exponential moving average of a frame rate, seeded at 60 fps.
#[derive(Debug, Clone, Copy)]
struct SmoothedFps {
    value: f32,
    last: Option<Instant>,
}

impl SmoothedFps {
    const fn new() -> Self {
        Self {
            value: 60.0,
            last: None,
        }
    }

    fn sample(&mut self, now: Instant) {
        if let Some(last) = self.last {
            let dt = now.saturating_duration_since(last).as_secs_f32();
            if dt > 0.0 {
                self.value =
                    self.value * (1.0 - FPS_SMOOTHING) + FPS_SMOOTHING / dt;
            }
        }
        self.last = Some(now);
    }
}

/// Optional frame limiter for the event loop, with a smoothed fps readout.
pub struct FrameTiming {
    min_frame_duration: Duration,
    last_frame: Instant,
    fps: SmoothedFps,
}

impl FrameTiming {
    /// Limit to `target_fps` frames per second; `0` means unlimited.
    #[must_use]
    pub fn new(target_fps: u32) -> Self {
        let min_frame_duration = if target_fps > 0 {
            Duration::from_secs_f64(1.0 / f64::from(target_fps))
        } else {
            Duration::ZERO
        };
        Self {
            min_frame_duration,
            last_frame: Instant::now(),
            fps: SmoothedFps::new(),
        }
    }

    /// Whether enough time has passed since the last frame to draw again.
    pub fn should_render(&self) -> bool {
        self.last_frame.elapsed() >= self.min_frame_duration
    }

    /// Record the end of a CPU frame.
    pub fn end_frame(&mut self) {
        let now = Instant::now();
        self.last_frame = now;
        self.fps.sample(now);
    }

    /// Smoothed frames per second.
    pub fn fps(&self) -> f32 {
        self.fps.value
    }
}

/// How long one completed frame took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTime {
    /// Execution time measured with GPU timestamp queries.
    Gpu(Duration),
    /// Submit-to-callback wall-clock time, used when the device has no
    /// timestamp queries. Includes the wait for the next device poll.
    Latency(Duration),
}

impl FrameTime {
    /// The measured duration, whatever its source.
    pub const fn duration(self) -> Duration {
        match self {
            Self::Gpu(d) | Self::Latency(d) => d,
        }
    }
}

/// Snapshot of GPU-side frame statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// GPU execution time of the last finished frame. `None` without
    /// timestamp queries.
    pub last_gpu_time: Option<Duration>,
    /// Submit-to-completion-callback time of the last finished frame.
    pub last_latency: Duration,
    /// Smoothed rate of frame completions.
    pub fps: f32,
    /// Frames whose completion callback has run.
    pub frames_completed: u64,
    /// Frames abandoned for lack of a drawable.
    pub frames_dropped: u64,
}

/// Frame time samples collected until a target count is reached.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkRun {
    target_frames: usize,
    samples: Vec<FrameTime>,
}

impl BenchmarkRun {
    /// Run collecting `target_frames` samples.
    #[must_use]
    pub fn new(target_frames: usize) -> Self {
        Self {
            target_frames,
            samples: Vec::with_capacity(target_frames),
        }
    }

    /// Append a sample unless the run is already complete.
    pub fn push(&mut self, sample: FrameTime) {
        if !self.is_complete() {
            self.samples.push(sample);
        }
    }

    /// Whether the target count was reached.
    pub fn is_complete(&self) -> bool {
        self.samples.len() >= self.target_frames
    }

    /// Samples collected so far.
    pub fn samples(&self) -> &[FrameTime] {
        &self.samples
    }

    /// Whether every sample is a GPU timestamp measurement.
    pub fn is_gpu_timed(&self) -> bool {
        self.samples.iter().all(|s| matches!(s, FrameTime::Gpu(_)))
    }

    /// Mean of the collected samples.
    pub fn mean(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        self.samples.iter().map(|s| s.duration()).sum::<Duration>()
            / self.samples.len() as u32
    }
}

#[derive(Debug)]
struct StatsState {
    stats: FrameStats,
    fps: SmoothedFps,
    benchmark: Option<BenchmarkRun>,
}

/// Shared sink for completion callbacks. Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct FrameStatsRecorder {
    state: Arc<Mutex<StatsState>>,
}

impl Default for FrameStatsRecorder {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(StatsState {
                stats: FrameStats::default(),
                fps: SmoothedFps::new(),
                benchmark: None,
            })),
        }
    }
}

impl FrameStatsRecorder {
    fn with<R>(&self, f: impl FnOnce(&mut StatsState) -> R) -> R {
        let mut state =
            self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Record a finished frame. `gpu_time` comes from timestamp queries
    /// when the device has them; `latency` is the wall-clock time from
    /// submit to the completion callback and stands in for it otherwise.
    pub fn record_completion(
        &self,
        gpu_time: Option<Duration>,
        latency: Duration,
        now: Instant,
    ) {
        self.with(|state| {
            state.fps.sample(now);
            state.stats.last_gpu_time = gpu_time;
            state.stats.last_latency = latency;
            state.stats.fps = state.fps.value;
            state.stats.frames_completed += 1;
            if let Some(run) = &mut state.benchmark {
                let sample =
                    gpu_time.map_or(FrameTime::Latency(latency), FrameTime::Gpu);
                run.push(sample);
            }
        });
    }

    /// Record a frame dropped before submission.
    pub fn record_drop(&self) {
        self.with(|state| state.stats.frames_dropped += 1);
    }

    /// Current statistics.
    pub fn snapshot(&self) -> FrameStats {
        self.with(|state| state.stats)
    }

    /// Start collecting `target_frames` frame time samples, replacing any
    /// run in progress.
    pub fn start_benchmark(&self, target_frames: usize) {
        self.with(|state| {
            state.benchmark = Some(BenchmarkRun::new(target_frames));
        });
    }

    /// The finished run, returned once. `None` while no run is active or
    /// the target has not been reached.
    pub fn take_benchmark(&self) -> Option<BenchmarkRun> {
        self.with(|state| {
            if state.benchmark.as_ref().is_some_and(BenchmarkRun::is_complete)
            {
                state.benchmark.take()
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benchmark_reports_once_after_target() {
        let recorder = FrameStatsRecorder::default();
        recorder.start_benchmark(3);
        let now = Instant::now();
        let latency = Duration::from_millis(16);
        for i in 0..2 {
            recorder.record_completion(
                Some(Duration::from_millis(2)),
                latency,
                now + Duration::from_millis(i),
            );
        }
        assert!(recorder.take_benchmark().is_none());

        for i in 2..6 {
            recorder.record_completion(
                Some(Duration::from_millis(4)),
                latency,
                now + Duration::from_millis(i),
            );
        }
        let run = recorder.take_benchmark().expect("complete");
        assert_eq!(run.samples().len(), 3);
        assert!(run.is_gpu_timed());
        assert_eq!(run.mean(), Duration::from_nanos(2_666_666));
        assert!(recorder.take_benchmark().is_none());
    }

    #[test]
    fn latency_never_passes_for_gpu_time() {
        let recorder = FrameStatsRecorder::default();
        recorder.start_benchmark(2);
        let now = Instant::now();
        let latency = Duration::from_millis(17);
        recorder.record_completion(Some(Duration::from_millis(3)), latency, now);
        recorder.record_completion(None, latency, now + Duration::from_millis(1));

        let stats = recorder.snapshot();
        assert_eq!(stats.last_gpu_time, None);
        assert_eq!(stats.last_latency, latency);

        let run = recorder.take_benchmark().expect("complete");
        assert_eq!(
            run.samples(),
            &[FrameTime::Gpu(Duration::from_millis(3)), FrameTime::Latency(latency)]
        );
        assert!(!run.is_gpu_timed());
    }

    #[test]
    fn stats_track_completions_and_drops() {
        let recorder = FrameStatsRecorder::default();
        let shared = recorder.clone();
        let start = Instant::now();
        for i in 0..10 {
            shared.record_completion(
                Some(Duration::from_micros(500)),
                Duration::from_millis(12),
                start + Duration::from_millis(10 * i),
            );
        }
        recorder.record_drop();
        let stats = recorder.snapshot();
        assert_eq!(stats.frames_completed, 10);
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.last_gpu_time, Some(Duration::from_micros(500)));
        assert_eq!(stats.last_latency, Duration::from_millis(12));
        // Drifts from the 60 fps seed towards 100 fps
        assert!(stats.fps > 60.0 && stats.fps < 100.0);
    }

    #[test]
    fn unlimited_timing_always_renders() {
        let timing = FrameTiming::new(0);
        assert!(timing.should_render());
    }
}
