//! Frame pacing.
//!
//! [`FrameSlots`] is a counting semaphore over the N uniform slots. A
//! [`SlotPermit`] is taken before the CPU writes a slot's uniforms and is
//! released when it drops: from the GPU completion callback for submitted
//! frames, on scope exit for dropped ones. The CPU therefore never runs
//! more than N frames ahead of the GPU and never overwrites uniforms the
//! GPU may still read.
//!
//! [`FramePacer`] drives one tick through a [`FrameBackend`], which keeps
//! the ordering rules testable without a device.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use crate::{
    capture::{CaptureError, CapturedImage, PhotoConfig, ShutterGate},
    scene::{FrameUniforms, Scene},
};

/// Frames in flight unless configured otherwise.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 3;

// ---------------------------------------------------------------------------
// Frame slots
// ---------------------------------------------------------------------------

struct SlotPool {
    free: Mutex<Vec<usize>>,
    released: Condvar,
    capacity: usize,
}

impl SlotPool {
    fn lock(&self) -> MutexGuard<'_, Vec<usize>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Counting semaphore over the in-flight frame slots.
///
/// Clones share the same pool.
#[derive(Clone)]
pub struct FrameSlots {
    pool: Arc<SlotPool>,
}

impl FrameSlots {
    /// Pool of `capacity` slots, clamped to 2 or 3.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(2, 3);
        Self {
            pool: Arc::new(SlotPool {
                // Popped from the back: slot 0 goes out first
                free: Mutex::new((0..capacity).rev().collect()),
                released: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.pool.capacity
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.pool.lock().len()
    }

    /// Block until a slot is free and take it.
    pub fn acquire(&self) -> SlotPermit {
        let free = self.pool.lock();
        let mut free = self
            .pool
            .released
            .wait_while(free, |free| free.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        self.permit(&mut free)
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self) -> Option<SlotPermit> {
        let mut free = self.pool.lock();
        (!free.is_empty()).then(|| self.permit(&mut free))
    }

    /// Wait at most `timeout` for a slot.
    pub fn try_acquire_for(&self, timeout: Duration) -> Option<SlotPermit> {
        let free = self.pool.lock();
        let (mut free, _) = self
            .pool
            .released
            .wait_timeout_while(free, timeout, |free| free.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        (!free.is_empty()).then(|| self.permit(&mut free))
    }

    fn permit(&self, free: &mut Vec<usize>) -> SlotPermit {
        let slot = free.pop().unwrap_or_default();
        SlotPermit {
            pool: Arc::clone(&self.pool),
            slot,
        }
    }
}

/// A held frame slot. Dropping it returns the slot and wakes one waiter.
pub struct SlotPermit {
    pool: Arc<SlotPool>,
    slot: usize,
}

impl SlotPermit {
    /// Index of the held slot, `0..capacity`.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.pool.lock().push(self.slot);
        self.pool.released.notify_one();
    }
}

// ---------------------------------------------------------------------------
// Frame state machine
// ---------------------------------------------------------------------------

/// Where the most recent frame is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    /// No frame started, or the last one was dropped.
    #[default]
    Idle,
    /// Blocked on a free frame slot.
    WaitingOnSlot,
    /// Recomputing and writing the slot's uniforms.
    UniformUpdate,
    /// Recording passes.
    Encode,
    /// Handing the command list to the queue.
    Submit,
    /// Submitted, completion callback pending.
    InFlight,
    /// The GPU finished the frame.
    Completed,
}

/// What one call to [`FramePacer::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Scene clean and not playing; nothing happened.
    Skipped,
    /// No drawable was available. Nothing was submitted and the slot was
    /// released.
    Dropped,
    /// Submitted using uniform slot `slot`.
    Submitted {
        /// Uniform slot the frame used.
        slot: usize,
    },
}

/// The device side of a frame, as seen by the [`FramePacer`].
pub trait FrameBackend {
    /// A recorded, unsubmitted command list. Dropping it discards it.
    type Commands;
    /// The surface texture a frame presents to.
    type Drawable;

    /// Whether any geometry is loaded.
    fn has_geometry(&self) -> bool;

    /// Block until submitted work completes and its completion callbacks
    /// have run. Called when every slot is held.
    fn wait_for_gpu(&mut self);

    /// Copy `uniforms` into slot `slot`'s uniform buffer.
    fn write_uniforms(&mut self, slot: usize, uniforms: &FrameUniforms);

    /// Record every pass up to, but not including, present.
    fn encode(&mut self, slot: usize, scene: &Scene) -> Self::Commands;

    /// Acquire the surface texture. `None` drops the frame.
    fn acquire_drawable(&mut self) -> Option<Self::Drawable>;

    /// Record present and submit. The backend must hold `permit` until the
    /// GPU completes the frame and call `on_complete` from the same place.
    fn submit(
        &mut self,
        commands: Self::Commands,
        drawable: Self::Drawable,
        permit: SlotPermit,
        on_complete: CompletionMarker,
    );

    /// Allocate the photo texture set and compile the high-quality
    /// pipeline variants.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Unknown`] if either fails.
    fn prepare_capture(&mut self, photo: &PhotoConfig) -> Result<(), CaptureError>;

    /// Record every pass of a photo frame, ending in the readback copy.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Unknown`] if a required pass could not be
    /// encoded.
    fn encode_capture(
        &mut self,
        slot: usize,
        scene: &Scene,
    ) -> Result<Self::Commands, CaptureError>;

    /// Release whatever [`FrameBackend::prepare_capture`] allocated when the
    /// capture is abandoned before submission.
    fn discard_capture(&mut self);

    /// Submit a photo frame, block until it completes and read it back.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Unknown`] if the readback fails.
    fn submit_capture(
        &mut self,
        commands: Self::Commands,
        permit: SlotPermit,
    ) -> Result<CapturedImage, CaptureError>;
}

/// Marks a submitted frame complete when called from the completion
/// callback.
#[derive(Clone)]
pub struct CompletionMarker {
    completed: Arc<AtomicU64>,
    frame: u64,
}

impl CompletionMarker {
    /// Record the frame as complete.
    pub fn complete(&self) {
        let _ = self.completed.fetch_max(self.frame, Ordering::AcqRel);
    }
}

/// Runs the per-frame protocol against a [`FrameBackend`].
pub struct FramePacer {
    slots: FrameSlots,
    state: FrameState,
    submitted: u64,
    dropped: u64,
    completed: Arc<AtomicU64>,
}

impl FramePacer {
    /// Pacer with `frames_in_flight` slots (2 or 3).
    #[must_use]
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            slots: FrameSlots::new(frames_in_flight),
            state: FrameState::Idle,
            submitted: 0,
            dropped: 0,
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The slot pool.
    pub fn slots(&self) -> &FrameSlots {
        &self.slots
    }

    /// State of the most recent frame.
    pub fn state(&self) -> FrameState {
        if self.state == FrameState::InFlight
            && self.completed.load(Ordering::Acquire) >= self.submitted
        {
            FrameState::Completed
        } else {
            self.state
        }
    }

    /// Frames submitted so far.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Frames dropped for lack of a drawable.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Take a free slot. When all are held, let the backend drain the GPU
    /// so the completion callbacks release theirs, then wait on the pool.
    fn acquire_slot<B: FrameBackend>(&mut self, backend: &mut B) -> SlotPermit {
        self.state = FrameState::WaitingOnSlot;
        if let Some(permit) = self.slots.try_acquire() {
            return permit;
        }
        backend.wait_for_gpu();
        self.slots.acquire()
    }

    /// Draw one frame if the scene asks for one.
    ///
    /// The surface texture is acquired only after every GPU pass is
    /// recorded. Without one the frame is dropped: the recorded commands
    /// and the slot permit are released, and the scene stays dirty so the
    /// next tick retries.
    pub fn tick<B: FrameBackend>(
        &mut self,
        scene: &mut Scene,
        backend: &mut B,
    ) -> FrameOutcome {
        if !scene.wants_frame() {
            return FrameOutcome::Skipped;
        }

        let permit = self.acquire_slot(backend);
        let slot = permit.slot();

        self.state = FrameState::UniformUpdate;
        let _ = scene.update_scene();
        backend.write_uniforms(slot, scene.uniforms());

        self.state = FrameState::Encode;
        let commands = backend.encode(slot, scene);

        let Some(drawable) = backend.acquire_drawable() else {
            log::warn!("no drawable available, dropping frame");
            scene.request_redraw();
            self.state = FrameState::Idle;
            self.dropped += 1;
            return FrameOutcome::Dropped;
        };

        self.state = FrameState::Submit;
        self.submitted += 1;
        let marker = CompletionMarker {
            completed: Arc::clone(&self.completed),
            frame: self.submitted,
        };
        backend.submit(commands, drawable, permit, marker);
        scene.acknowledge_frame();
        self.state = FrameState::InFlight;
        FrameOutcome::Submitted { slot }
    }

    /// Render and read back one square high-quality frame.
    ///
    /// Fails with [`CaptureError::MissingGeometry`] before anything is
    /// allocated or encoded. The scene viewport is forced square for the
    /// shot and restored afterwards, on error too.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError`] on missing geometry or any GPU failure.
    pub fn capture<B: FrameBackend>(
        &mut self,
        scene: &mut Scene,
        backend: &mut B,
        photo: &PhotoConfig,
        gate: Option<&ShutterGate>,
    ) -> Result<CapturedImage, CaptureError> {
        if !backend.has_geometry() {
            return Err(CaptureError::MissingGeometry);
        }

        let [width, height] = scene.viewport();
        let size = photo.final_texture_size;
        scene.set_viewport(size, size);
        let result = self.capture_square(scene, backend, photo, gate);
        scene.set_viewport(width as u32, height as u32);
        result
    }

    fn capture_square<B: FrameBackend>(
        &mut self,
        scene: &mut Scene,
        backend: &mut B,
        photo: &PhotoConfig,
        gate: Option<&ShutterGate>,
    ) -> Result<CapturedImage, CaptureError> {
        backend.prepare_capture(photo)?;

        let permit = self.acquire_slot(backend);
        let slot = permit.slot();

        self.state = FrameState::UniformUpdate;
        scene.request_redraw();
        let _ = scene.update_scene();
        backend.write_uniforms(slot, scene.uniforms());

        self.state = FrameState::Encode;
        let commands = match backend.encode_capture(slot, scene) {
            Ok(commands) => commands,
            Err(e) => {
                backend.discard_capture();
                self.state = FrameState::Idle;
                return Err(e);
            }
        };
        if let Some(gate) = gate {
            gate.wait();
        }

        self.state = FrameState::Submit;
        let image = backend.submit_capture(commands, permit);
        scene.acknowledge_frame();
        self.state = if image.is_ok() {
            FrameState::Completed
        } else {
            FrameState::Idle
        };
        image
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::AtomicUsize,
        thread,
        time::{Duration, Instant},
    };

    use super::*;

    /// Records calls; holds submitted permits until the test releases them.
    #[derive(Default)]
    struct MockBackend {
        geometry: bool,
        drawables: bool,
        uniform_writes: Vec<usize>,
        encoded: usize,
        in_flight: Arc<Mutex<Vec<(SlotPermit, CompletionMarker)>>>,
        submitted: Arc<AtomicUsize>,
        prepared: usize,
        gpu_waits: usize,
        captured_viewport: Option<[f32; 2]>,
        fail_capture: Option<CaptureStep>,
        discarded: usize,
    }

    #[derive(Clone, Copy, Debug)]
    enum CaptureStep {
        Prepare,
        Encode,
    }

    impl MockBackend {
        fn presenting() -> Self {
            Self {
                geometry: true,
                drawables: true,
                ..Self::default()
            }
        }

        fn complete_all(&self) {
            for (permit, marker) in self.in_flight.lock().unwrap().drain(..) {
                marker.complete();
                drop(permit);
            }
        }
    }

    impl FrameBackend for MockBackend {
        type Commands = usize;
        type Drawable = ();

        fn has_geometry(&self) -> bool {
            self.geometry
        }

        fn wait_for_gpu(&mut self) {
            self.gpu_waits += 1;
        }

        fn write_uniforms(&mut self, slot: usize, _: &FrameUniforms) {
            self.uniform_writes.push(slot);
        }

        fn encode(&mut self, slot: usize, _: &Scene) -> usize {
            self.encoded += 1;
            slot
        }

        fn acquire_drawable(&mut self) -> Option<()> {
            self.drawables.then_some(())
        }

        fn submit(
            &mut self,
            _: usize,
            (): (),
            permit: SlotPermit,
            on_complete: CompletionMarker,
        ) {
            self.in_flight.lock().unwrap().push((permit, on_complete));
            let _ = self.submitted.fetch_add(1, Ordering::SeqCst);
        }

        fn prepare_capture(&mut self, _: &PhotoConfig) -> Result<(), CaptureError> {
            self.prepared += 1;
            match self.fail_capture {
                Some(CaptureStep::Prepare) => {
                    Err(CaptureError::Unknown("out of memory".to_owned()))
                }
                _ => Ok(()),
            }
        }

        fn encode_capture(
            &mut self,
            slot: usize,
            scene: &Scene,
        ) -> Result<usize, CaptureError> {
            self.encoded += 1;
            self.captured_viewport = Some(scene.viewport());
            match self.fail_capture {
                Some(CaptureStep::Encode) => {
                    Err(CaptureError::Unknown("pipeline missing".to_owned()))
                }
                _ => Ok(slot),
            }
        }

        fn discard_capture(&mut self) {
            self.discarded += 1;
        }

        fn submit_capture(
            &mut self,
            _: usize,
            _permit: SlotPermit,
        ) -> Result<CapturedImage, CaptureError> {
            Ok(CapturedImage {
                width: 4,
                height: 4,
                rgba: vec![0; 64],
            })
        }
    }

    #[test]
    fn slots_block_after_capacity() {
        let slots = FrameSlots::new(2);
        let a = slots.acquire();
        let b = slots.acquire();
        assert_ne!(a.slot(), b.slot());
        assert!(slots.try_acquire().is_none());
        assert!(slots.try_acquire_for(Duration::from_millis(5)).is_none());
        drop(a);
        assert_eq!(slots.available(), 1);
        assert!(slots.try_acquire().is_some());
    }

    #[test]
    fn capacity_is_clamped() {
        assert_eq!(FrameSlots::new(0).capacity(), 2);
        assert_eq!(FrameSlots::new(8).capacity(), 3);
    }

    #[test]
    fn waiter_wakes_on_release() {
        let slots = FrameSlots::new(2);
        let held = [slots.acquire(), slots.acquire()];
        let waiter = {
            let slots = slots.clone();
            thread::spawn(move || slots.acquire().slot())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        let [first, _second] = held;
        let released = first.slot();
        drop(first);
        assert_eq!(waiter.join().unwrap(), released);
    }

    fn producer_blocks_after(capacity: usize) {
        let mut backend = MockBackend::presenting();
        let in_flight = Arc::clone(&backend.in_flight);
        let submitted = Arc::clone(&backend.submitted);

        let producer = thread::spawn(move || {
            let mut pacer = FramePacer::new(capacity);
            let mut scene = Scene::new();
            scene.set_playing(true);
            for _ in 0..capacity + 2 {
                let _ = pacer.tick(&mut scene, &mut backend);
            }
            backend
        });

        let deadline = Instant::now() + Duration::from_secs(2);
        while submitted.load(Ordering::SeqCst) < capacity && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(submitted.load(Ordering::SeqCst), capacity);
        assert!(!producer.is_finished());

        // Completing the in-flight frames lets the producer run to the end
        while !producer.is_finished() {
            for (permit, marker) in in_flight.lock().unwrap().drain(..) {
                marker.complete();
                drop(permit);
            }
            thread::sleep(Duration::from_millis(1));
        }
        let backend = producer.join().unwrap();
        assert_eq!(submitted.load(Ordering::SeqCst), capacity + 2);
        assert!(backend.gpu_waits >= 2);
        backend.complete_all();
    }

    #[test]
    fn producer_blocks_after_two_frames() {
        producer_blocks_after(2);
    }

    #[test]
    fn producer_blocks_after_three_frames() {
        producer_blocks_after(3);
    }

    #[test]
    fn clean_scene_skips_without_side_effects() {
        let mut pacer = FramePacer::new(3);
        let mut scene = Scene::new();
        let mut backend = MockBackend::presenting();
        assert!(matches!(
            pacer.tick(&mut scene, &mut backend),
            FrameOutcome::Submitted { .. }
        ));
        backend.complete_all();

        assert_eq!(pacer.tick(&mut scene, &mut backend), FrameOutcome::Skipped);
        assert_eq!(backend.encoded, 1);
        assert_eq!(backend.uniform_writes.len(), 1);
        assert_eq!(pacer.state(), FrameState::Completed);
    }

    #[test]
    fn missing_drawables_do_not_leak_slots() {
        let mut pacer = FramePacer::new(3);
        let mut scene = Scene::new();
        let mut backend = MockBackend {
            geometry: true,
            drawables: false,
            ..MockBackend::default()
        };
        for _ in 0..10 {
            assert_eq!(pacer.tick(&mut scene, &mut backend), FrameOutcome::Dropped);
            // The scene stays dirty so the next tick retries
            assert!(scene.needs_redraw());
        }
        assert_eq!(pacer.dropped(), 10);
        assert_eq!(pacer.submitted(), 0);
        assert_eq!(pacer.slots().available(), 3);
        assert_eq!(backend.submitted.load(Ordering::SeqCst), 0);
        assert_eq!(pacer.state(), FrameState::Idle);
    }

    #[test]
    fn submission_acknowledges_fill_color() {
        let mut pacer = FramePacer::new(2);
        let mut scene = Scene::new();
        let mut backend = MockBackend::presenting();
        assert!(scene.fill_color_requested());
        let _ = pacer.tick(&mut scene, &mut backend);
        assert!(!scene.fill_color_requested());
        assert_eq!(pacer.state(), FrameState::InFlight);
        backend.complete_all();
        assert_eq!(pacer.state(), FrameState::Completed);
    }

    #[test]
    fn capture_without_geometry_encodes_nothing() {
        let mut pacer = FramePacer::new(3);
        let mut scene = Scene::new();
        let mut backend = MockBackend::default();
        let result =
            pacer.capture(&mut scene, &mut backend, &PhotoConfig::default(), None);
        assert_eq!(result, Err(CaptureError::MissingGeometry));
        assert_eq!(backend.prepared, 0);
        assert_eq!(backend.encoded, 0);
        assert!(backend.uniform_writes.is_empty());
    }

    #[test]
    fn capture_is_square_and_restores_viewport() {
        let mut pacer = FramePacer::new(3);
        let mut scene = Scene::new();
        scene.set_viewport(1600, 900);
        let mut backend = MockBackend::presenting();
        let photo = PhotoConfig {
            final_texture_size: 512,
            ..PhotoConfig::default()
        };
        let gate = ShutterGate::new();
        gate.open();

        let image = pacer
            .capture(&mut scene, &mut backend, &photo, Some(&gate))
            .unwrap();
        assert_eq!(image.rgba.len(), 64);
        assert_eq!(backend.captured_viewport, Some([512.0, 512.0]));
        assert_eq!(scene.viewport(), [1600.0, 900.0]);
        assert!((scene.aspect_ratio() - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(pacer.slots().available(), 3);
    }

    #[test]
    fn failed_capture_restores_viewport_and_slot() {
        for step in [CaptureStep::Prepare, CaptureStep::Encode] {
            let mut pacer = FramePacer::new(3);
            let mut scene = Scene::new();
            scene.set_viewport(1280, 720);
            let mut backend = MockBackend {
                fail_capture: Some(step),
                ..MockBackend::presenting()
            };

            let result =
                pacer.capture(&mut scene, &mut backend, &PhotoConfig::default(), None);
            assert!(matches!(result, Err(CaptureError::Unknown(_))), "{step:?}");
            assert_eq!(scene.viewport(), [1280.0, 720.0], "{step:?}");
            assert!((scene.aspect_ratio() - 16.0 / 9.0).abs() < 1e-6);
            assert_eq!(pacer.slots().available(), 3, "{step:?}");
            assert_eq!(pacer.state(), FrameState::Idle);
        }
    }

    #[test]
    fn failed_encode_releases_photo_targets() {
        let mut pacer = FramePacer::new(2);
        let mut scene = Scene::new();
        let mut backend = MockBackend {
            fail_capture: Some(CaptureStep::Encode),
            ..MockBackend::presenting()
        };
        let photo = PhotoConfig::default();
        assert!(pacer.capture(&mut scene, &mut backend, &photo, None).is_err());
        assert_eq!(backend.prepared, 1);
        assert_eq!(backend.discarded, 1);

        backend.fail_capture = None;
        assert!(pacer.capture(&mut scene, &mut backend, &photo, None).is_ok());
        assert_eq!(backend.discarded, 1);
    }

    #[test]
    fn dropped_frames_do_not_turn_the_model() {
        let mut pacer = FramePacer::new(3);
        let mut scene = Scene::new();
        scene.set_autorotating(true);
        let mut backend = MockBackend {
            geometry: true,
            drawables: false,
            ..MockBackend::default()
        };

        assert_eq!(pacer.tick(&mut scene, &mut backend), FrameOutcome::Dropped);
        let first = scene.uniforms().rotation;
        for _ in 0..9 {
            let _ = pacer.tick(&mut scene, &mut backend);
            assert_eq!(scene.uniforms().rotation, first);
        }

        // The first presented frame shows the first step
        backend.drawables = true;
        assert!(matches!(
            pacer.tick(&mut scene, &mut backend),
            FrameOutcome::Submitted { .. }
        ));
        assert_eq!(scene.uniforms().rotation, first);
        let _ = pacer.tick(&mut scene, &mut backend);
        assert_ne!(scene.uniforms().rotation, first);
        backend.complete_all();
    }
}
