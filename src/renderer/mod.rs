//! The renderer: device resources, frame pacing and the configuration
//! surface.
//!
//! [`Renderer`] owns a [`Scene`], the device resources of one surface (or
//! of a headless context) and a [`frame::FramePacer`]. Each call to
//! [`Renderer::draw_frame`] advances animations and playback, then lets the
//! pacer decide whether a frame is drawn at all.

mod backend;
pub mod frame;
pub mod passes;
pub mod plan;
mod settings;

use std::sync::Arc;

use web_time::Instant;

use self::{
    backend::{DrawSettings, TargetSettings, WgpuBackend},
    frame::{FrameOutcome, FramePacer},
};
use crate::{
    capture::{CaptureError, CapturedImage, PhotoConfig, ShutterGate},
    error::SpheronError,
    geometry::GeometrySnapshot,
    gpu::{capabilities::GpuCapabilities, render_context::RenderContext},
    options::RenderOptions,
    pipeline::PipelinePrewarmer,
    scene::{
        color_fill::ColorFillAnimation,
        uniforms::{default_element_colors, subunit_palette},
        ColorBy, FillColorInput, PlaybackClock, Scene,
    },
    util::frame_timing::{BenchmarkRun, FrameStats},
};

/// Draws a molecular structure as sphere and cylinder impostors.
pub struct Renderer {
    backend: WgpuBackend,
    scene: Scene,
    pacer: FramePacer,
    playback: PlaybackClock,
    color_fill: Option<ColorFillAnimation>,
    prewarm: Option<PipelinePrewarmer>,
    options: RenderOptions,
}

impl Renderer {
    /// Build a renderer on `context` and start pre-warming every pipeline
    /// the device may need on a background thread.
    ///
    /// # Errors
    ///
    /// Returns [`SpheronError`] if the shader modules fail to compose, a
    /// render target cannot be allocated or the pre-warm thread cannot be
    /// spawned.
    pub fn new(
        context: RenderContext,
        options: RenderOptions,
    ) -> Result<Self, SpheronError> {
        let caps = context.capabilities;
        log::info!(
            "renderer: compute={} comparison={} pre-pass={}",
            caps.compute_shaders,
            caps.comparison_samplers,
            caps.depth_pre_pass
        );
        let quality = &options.quality;
        let frames_in_flight = quality.frames_in_flight.clamp(2, 3);
        let backend = WgpuBackend::new(
            context,
            frames_in_flight,
            TargetSettings {
                render_scale: quality.effective_render_scale(),
                shadow_map_size: quality.shadow_map_size,
            },
            draw_settings(&options),
        )?;
        let prewarm = PipelinePrewarmer::spawn(
            Arc::clone(&backend.pipelines),
            plan::prewarm_keys(caps),
        )
        .map_err(SpheronError::ThreadSpawn)?;

        let mut scene = Scene::new();
        let (width, height) = backend.context.size();
        scene.set_viewport(width, height);

        let mut renderer = Self {
            backend,
            scene,
            pacer: FramePacer::new(frames_in_flight),
            playback: PlaybackClock::new(options.playback.fps),
            color_fill: None,
            prewarm: Some(prewarm),
            options,
        };
        renderer.apply_scene_options();
        Ok(renderer)
    }

    /// Draw one frame if the scene is dirty or playing.
    ///
    /// Never fails: a frame that cannot be drawn is reported as
    /// [`FrameOutcome::Dropped`] and retried on the next call.
    pub fn draw_frame(&mut self) -> FrameOutcome {
        let now = Instant::now();
        self.step_color_fill(now);
        self.step_playback(now);

        let outcome = self.pacer.tick(&mut self.scene, &mut self.backend);
        if outcome == FrameOutcome::Dropped {
            self.backend.stats.record_drop();
        }
        outcome
    }

    /// Render one square frame with the high-quality pipeline variants and
    /// return its pixels. Blocks until the GPU has finished; with a `gate`
    /// it also waits for the gate to open right before submission.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::MissingGeometry`] without touching the GPU
    /// when no structure is loaded, [`CaptureError::Unknown`] on any
    /// allocation, compile or readback failure.
    pub fn draw_high_quality_frame(
        &mut self,
        photo: &PhotoConfig,
        gate: Option<&ShutterGate>,
    ) -> Result<CapturedImage, CaptureError> {
        let result =
            self.pacer
                .capture(&mut self.scene, &mut self.backend, photo, gate);
        if let Err(e) = &result {
            log::warn!("high-quality capture failed: {e}");
        }
        result
    }

    // -- Geometry -----------------------------------------------------------

    /// Upload `snapshot`, replacing any loaded structure, and frame the
    /// camera on it. An empty snapshot removes the geometry.
    ///
    /// # Errors
    ///
    /// Returns [`SpheronError::Resource`] if a buffer exceeds the device
    /// limits or the device runs out of memory. The previous structure is
    /// kept in that case.
    pub fn set_geometry(
        &mut self,
        snapshot: GeometrySnapshot,
    ) -> Result<(), SpheronError> {
        if snapshot.is_empty() {
            self.remove_geometry();
            return Ok(());
        }
        let atoms = snapshot.atoms_per_configuration();
        let configurations = snapshot.configuration_count();
        let bounds = snapshot.bounding_sphere();

        if let Err(e) = self
            .backend
            .load_geometry(snapshot, self.scene.visualization())
        {
            log::warn!("geometry upload failed: {e}");
            return Err(e.into());
        }
        self.scene.set_structure(atoms);
        self.scene.fit_to(bounds);
        self.color_fill = None;
        let fill = self.fill_table(self.options.display.color_by);
        self.scene.set_fill_color(fill);
        log::info!("loaded {atoms} atoms x {configurations} configurations");
        Ok(())
    }

    /// Drop the loaded structure. Later frames clear to the background.
    pub fn remove_geometry(&mut self) {
        if self.backend.geometry().is_none() {
            return;
        }
        self.backend.unload_geometry();
        self.scene.set_structure(0);
        self.color_fill = None;
        log::info!("geometry removed");
    }

    /// Whether a structure is loaded.
    pub fn has_geometry(&self) -> bool {
        self.backend.geometry().is_some()
    }

    // -- Configurations -----------------------------------------------------

    /// Number of configurations of the loaded structure.
    pub fn configuration_count(&self) -> usize {
        self.backend
            .geometry()
            .map_or(0, |g| g.selector.configuration_count())
    }

    /// Index of the configuration on screen.
    pub fn configuration_index(&self) -> usize {
        self.backend
            .geometry()
            .map_or(0, |g| g.selector.current_index())
    }

    /// Show configuration `index`. Returns `false` if it does not exist.
    pub fn select_configuration(&mut self, index: usize) -> bool {
        let Some(geometry) = self.backend.geometry_mut() else {
            return false;
        };
        let selected = geometry.selector.select(index);
        if selected {
            self.scene.set_configuration_index(index);
        }
        selected
    }

    /// Step to the next configuration, wrapping.
    pub fn next_configuration(&mut self) {
        if let Some(geometry) = self.backend.geometry_mut() {
            geometry.selector.advance();
            let index = geometry.selector.current_index();
            self.scene.set_configuration_index(index);
        }
    }

    /// Step to the previous configuration, wrapping.
    pub fn previous_configuration(&mut self) {
        if let Some(geometry) = self.backend.geometry_mut() {
            geometry.selector.previous();
            let index = geometry.selector.current_index();
            self.scene.set_configuration_index(index);
        }
    }

    // -- Colour -------------------------------------------------------------

    /// Animate the atom colours towards `target`. Only the fill-colour pass
    /// reruns; no geometry is touched.
    pub fn recolor(&mut self, target: FillColorInput) {
        let from = self
            .color_fill
            .take()
            .map_or(*self.scene.fill_color(), |anim| {
                anim.sample(Instant::now()).0
            });
        self.color_fill =
            Some(ColorFillAnimation::new(from, target, Instant::now()));
        self.scene.request_redraw();
    }

    /// Recolour by element or by subunit with the default tables.
    pub fn color_by(&mut self, color_by: ColorBy) {
        self.options.display.color_by = color_by;
        let target = self.fill_table(color_by);
        self.recolor(target);
    }

    fn fill_table(&self, color_by: ColorBy) -> FillColorInput {
        match color_by {
            ColorBy::Element => FillColorInput::by_element(&default_element_colors()),
            ColorBy::Subunit => {
                let subunits = self.backend.snapshot().map_or(1, |s| {
                    s.subunits().iter().max().map_or(1, |&m| usize::from(m) + 1)
                });
                FillColorInput::by_subunit(&subunit_palette(subunits))
            }
        }
    }

    fn step_color_fill(&mut self, now: Instant) {
        let Some(anim) = &self.color_fill else {
            return;
        };
        let (input, finished) = anim.sample(now);
        self.scene.set_fill_color(input);
        if finished {
            self.color_fill = None;
        }
    }

    fn step_playback(&mut self, now: Instant) {
        if let Some(geometry) = self.backend.geometry_mut() {
            if self.playback.tick(now, &mut geometry.selector) {
                let index = geometry.selector.current_index();
                self.scene.set_configuration_index(index);
            }
        }
        // The clock stops itself at the last configuration when not looping
        if self.scene.is_playing() != self.playback.is_playing() {
            self.scene.set_playing(self.playback.is_playing());
        }
    }

    // -- Accessors ----------------------------------------------------------

    /// The scene.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable scene access for camera control. Setters mark it dirty.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// The options currently applied.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// What the device supports.
    pub fn capabilities(&self) -> GpuCapabilities {
        self.backend.context.capabilities
    }

    /// The device context.
    pub fn context(&self) -> &RenderContext {
        &self.backend.context
    }

    /// Frame timing collected from completion callbacks.
    pub fn stats(&self) -> FrameStats {
        self.backend.stats.snapshot()
    }

    /// Collect frame times of the next `frames` completed frames: GPU time
    /// with timestamp queries, submit latency without.
    pub fn start_benchmark(&self, frames: usize) {
        self.backend.stats.start_benchmark(frames);
    }

    /// The finished benchmark, once.
    pub fn take_benchmark(&self) -> Option<BenchmarkRun> {
        self.backend.stats.take_benchmark()
    }

    /// Whether the background pipeline pre-warm has finished.
    pub fn pipelines_ready(&mut self) -> bool {
        match &self.prewarm {
            Some(prewarm) if !prewarm.is_finished() => false,
            Some(_) => {
                if let Some(prewarm) = self.prewarm.take() {
                    let compiled = prewarm.join();
                    log::info!("{compiled} pipelines pre-warmed");
                }
                true
            }
            None => true,
        }
    }
}

fn draw_settings(options: &RenderOptions) -> DrawSettings {
    DrawSettings {
        render_bonds: options.display.render_bonds,
        debug_points: options.display.debug_points,
        clear_color: options.display.clear_color(),
    }
}
