//! The wgpu implementation of [`FrameBackend`].

use std::sync::Arc;

use web_time::Instant;

use super::{
    frame::{CompletionMarker, FrameBackend, SlotPermit},
    passes::{self, PassContext},
    plan::{FrameInputs, PassKind, PassPlan},
};
use crate::{
    capture::{CaptureError, CapturedImage, PhotoConfig},
    error::SpheronError,
    geometry::{GeometrySnapshot, Visualization},
    gpu::{
        buffer::ResourceError,
        layouts::BindGroupLayouts,
        readback::TextureReadback,
        render_context::RenderContext,
        resources::{GeometryBuffers, Samplers, TextureBindings, UniformRing},
        texture::{scaled_size, TextureSet, TextureSetDescriptor},
        timestamps::GpuTimers,
    },
    pipeline::{PipelineCache, WgpuPipelineCompiler},
    scene::{FillColorInput, FrameUniforms, Scene},
    util::frame_timing::FrameStatsRecorder,
};

/// Render-target sizing the backend rebuilds its texture set from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TargetSettings {
    /// Render scale in `[0.25, 1]`; below 1 the upscale kernel runs.
    pub render_scale: f32,
    /// Edge of the interactive shadow map.
    pub shadow_map_size: u32,
}

/// Per-frame switches that are not part of the scene uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DrawSettings {
    /// Draw bond cylinders in ball-and-stick mode.
    pub render_bonds: bool,
    /// Draw one point per atom on top (debug builds).
    pub debug_points: bool,
    /// Background of the colour target.
    pub clear_color: wgpu::Color,
}

/// Transient targets of one photo.
struct PhotoTargets {
    textures: TextureSet,
    bindings: TextureBindings,
    readback: TextureReadback,
    clear_background: bool,
}

/// Device resources of the renderer.
pub(crate) struct WgpuBackend {
    pub(crate) context: RenderContext,
    layouts: Arc<BindGroupLayouts>,
    pub(crate) pipelines: Arc<PipelineCache<WgpuPipelineCompiler>>,
    uniforms: UniformRing,
    /// Present only when the device supports timestamp queries.
    timers: Option<GpuTimers>,
    samplers: Samplers,
    textures: TextureSet,
    bindings: TextureBindings,
    geometry: Option<GeometryBuffers>,
    snapshot: Option<GeometrySnapshot>,
    photo: Option<PhotoTargets>,
    /// Plan of the frame last encoded; present reuses it.
    plan: Option<PassPlan>,
    pub(crate) stats: FrameStatsRecorder,
    pub(crate) targets: TargetSettings,
    pub(crate) draw: DrawSettings,
}

impl WgpuBackend {
    pub(crate) fn new(
        context: RenderContext,
        frames_in_flight: usize,
        targets: TargetSettings,
        draw: DrawSettings,
    ) -> Result<Self, SpheronError> {
        let device = &context.device;
        let caps = context.capabilities;
        let layouts = Arc::new(BindGroupLayouts::new(device));
        let compiler = WgpuPipelineCompiler::new(
            device.clone(),
            Arc::clone(&layouts),
            context.format(),
        )?;
        let pipelines = Arc::new(PipelineCache::new(compiler));
        let uniforms = UniformRing::new(device, &layouts, frames_in_flight);
        let timers = build_timers(&context, frames_in_flight);
        let samplers = Samplers::new(device, caps.comparison_samplers);
        let textures = build_textures(&context, targets)?;
        let bindings = TextureBindings::new(
            device,
            &layouts,
            &samplers,
            &textures,
            caps.compute_shaders,
        );

        Ok(Self {
            context,
            layouts,
            pipelines,
            uniforms,
            timers,
            samplers,
            textures,
            bindings,
            geometry: None,
            snapshot: None,
            photo: None,
            plan: None,
            stats: FrameStatsRecorder::default(),
            targets,
            draw,
        })
    }

    /// Rebuild the texture set for the current surface size and
    /// [`TargetSettings`]. Keeps the old set if allocation fails.
    pub(crate) fn rebuild_targets(&mut self) {
        match build_textures(&self.context, self.targets) {
            Ok(textures) => {
                self.bindings = TextureBindings::new(
                    &self.context.device,
                    &self.layouts,
                    &self.samplers,
                    &textures,
                    self.context.capabilities.compute_shaders,
                );
                self.textures = textures;
            }
            Err(e) => log::warn!("keeping previous render targets: {e}"),
        }
    }

    /// Replace the uniform ring with one of `slots` buffers. The caller
    /// must make sure no frame still reads the old ring.
    pub(crate) fn rebuild_uniforms(&mut self, slots: usize) {
        let device = &self.context.device;
        self.uniforms = UniformRing::new(device, &self.layouts, slots);
        self.timers = build_timers(&self.context, slots);
        let colors = self.geometry.as_ref().map(|g| g.colors.buffer());
        self.uniforms.rebind(device, &self.layouts, colors);
    }

    /// Upload `snapshot` and point the frame bind groups at its colours.
    pub(crate) fn load_geometry(
        &mut self,
        snapshot: GeometrySnapshot,
        visualization: Visualization,
    ) -> Result<(), ResourceError> {
        let geometry = GeometryBuffers::upload(
            &self.context.device,
            &self.layouts,
            &snapshot,
            visualization,
            self.context.capabilities.max_buffer_size,
        )?;
        self.uniforms.rebind(
            &self.context.device,
            &self.layouts,
            Some(geometry.colors.buffer()),
        );
        self.geometry = Some(geometry);
        self.snapshot = Some(snapshot);
        Ok(())
    }

    /// Drop the geometry buffers.
    pub(crate) fn unload_geometry(&mut self) {
        self.wait_for_gpu();
        self.geometry = None;
        self.snapshot = None;
        self.uniforms.rebind(&self.context.device, &self.layouts, None);
    }

    /// Rewrite the radius buffer for `visualization`.
    pub(crate) fn set_visualization(&mut self, visualization: Visualization) {
        let (Some(geometry), Some(snapshot)) =
            (self.geometry.as_mut(), self.snapshot.as_ref())
        else {
            return;
        };
        if let Err(e) = geometry.set_visualization(
            &self.context.device,
            &self.context.queue,
            snapshot,
            visualization,
        ) {
            log::warn!("radii not updated: {e}");
        }
    }

    pub(crate) fn geometry(&self) -> Option<&GeometryBuffers> {
        self.geometry.as_ref()
    }

    pub(crate) fn geometry_mut(&mut self) -> Option<&mut GeometryBuffers> {
        self.geometry.as_mut()
    }

    pub(crate) fn snapshot(&self) -> Option<&GeometrySnapshot> {
        self.snapshot.as_ref()
    }

    fn frame_inputs(&self, scene: &Scene, high_quality: bool) -> FrameInputs {
        let has_bonds = self.geometry.as_ref().is_some_and(|g| g.bonds.is_some());
        FrameInputs {
            fill_color: scene.fill_color_requested(),
            shadows: scene.has_shadows(),
            bonds: self.draw.render_bonds
                && scene.visualization().draws_bonds()
                && has_bonds,
            debug_points: self.draw.debug_points,
            upscaled: !high_quality && self.textures.is_upscaled(),
            high_quality,
        }
    }

    /// Without compute shaders the colour table is applied on the host.
    fn fill_on_host(&self, scene: &Scene) {
        if self.context.capabilities.compute_shaders || !scene.fill_color_requested()
        {
            return;
        }
        if let Some(geometry) = &self.geometry {
            geometry.fill_colors_on_host(&self.context.queue, scene.fill_color());
        }
    }

    /// Record every pass of `plan` except present and readback.
    fn encode_plan(
        &self,
        plan: &PassPlan,
        slot: usize,
        scene: &Scene,
        photo: Option<&PhotoTargets>,
        encoder: &mut wgpu::CommandEncoder,
    ) -> Result<(), CaptureError> {
        let mut fill = *scene.fill_color();
        fill.atom_count = self
            .geometry
            .as_ref()
            .map_or(0, |g| g.atoms_per_configuration() as u32);
        let Some(ctx) = self.pass_context(plan, slot, fill, photo) else {
            return Err(CaptureError::Unknown(format!(
                "no uniform slot {slot}"
            )));
        };
        if ctx.geometry.is_none() {
            passes::clear(&ctx, encoder);
        }
        for &pass in plan.passes() {
            if !matches!(pass, PassKind::Present | PassKind::Readback) {
                let _ = passes::encode(pass, &ctx, encoder);
            }
        }
        if let Some(photo) = photo {
            passes::present::readback(&ctx, encoder, &photo.readback);
        }
        Ok(())
    }

    fn pass_context<'a>(
        &'a self,
        plan: &'a PassPlan,
        slot: usize,
        fill: FillColorInput,
        photo: Option<&'a PhotoTargets>,
    ) -> Option<PassContext<'a>> {
        let frame_bind_group = self.uniforms.bind_group(slot)?;
        let (textures, bindings, clear_color) = match photo {
            Some(photo) if photo.clear_background => {
                (&photo.textures, &photo.bindings, wgpu::Color::TRANSPARENT)
            }
            Some(photo) => (&photo.textures, &photo.bindings, self.draw.clear_color),
            None => (&self.textures, &self.bindings, self.draw.clear_color),
        };
        Some(PassContext {
            queue: &self.context.queue,
            pipelines: &self.pipelines,
            plan,
            geometry: self.geometry.as_ref(),
            textures,
            bindings,
            frame_bind_group,
            fill,
            clear_color,
        })
    }
}

fn build_timers(context: &RenderContext, slots: usize) -> Option<GpuTimers> {
    if !context.capabilities.timestamp_queries {
        log::info!("no timestamp queries; frame times are submit latency");
        return None;
    }
    Some(GpuTimers::new(&context.device, &context.queue, slots))
}

/// Texture set for the surface size at the configured scale. The shadow
/// map is clamped to the device limit.
fn build_textures(
    context: &RenderContext,
    targets: TargetSettings,
) -> Result<TextureSet, ResourceError> {
    let caps = context.capabilities;
    let output_size = context.size();
    let render_size = if caps.compute_shaders {
        scaled_size(output_size, targets.render_scale)
    } else {
        output_size
    };
    TextureSet::new(
        &context.device,
        "Frame",
        TextureSetDescriptor {
            render_size,
            output_size,
            shadow_size: targets.shadow_map_size.min(caps.max_texture_dimension),
            storage: caps.compute_shaders,
        },
        caps.max_texture_dimension,
    )
}

impl FrameBackend for WgpuBackend {
    type Commands = wgpu::CommandEncoder;
    type Drawable = wgpu::SurfaceTexture;

    fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }

    fn wait_for_gpu(&mut self) {
        if let Err(e) = self.context.device.poll(wgpu::PollType::Wait) {
            log::warn!("device poll failed: {e}");
        }
    }

    fn write_uniforms(&mut self, slot: usize, uniforms: &FrameUniforms) {
        self.uniforms.write(&self.context.queue, slot, uniforms);
    }

    fn encode(&mut self, slot: usize, scene: &Scene) -> wgpu::CommandEncoder {
        let plan = PassPlan::new(
            self.context.capabilities,
            self.frame_inputs(scene, false),
        );
        self.fill_on_host(scene);
        let mut encoder = self.context.create_encoder("Frame Encoder");
        if let Some(timers) = &self.timers {
            timers.begin(slot, &mut encoder);
        }
        if let Err(e) = self.encode_plan(&plan, slot, scene, None, &mut encoder) {
            log::warn!("frame not encoded: {e}");
        }
        self.plan = Some(plan);
        encoder
    }

    fn acquire_drawable(&mut self) -> Option<wgpu::SurfaceTexture> {
        match self.context.get_next_frame() {
            Ok(frame) => Some(frame),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.context.reconfigure();
                None
            }
            Err(e) => {
                log::debug!("surface texture unavailable: {e}");
                None
            }
        }
    }

    fn submit(
        &mut self,
        mut commands: wgpu::CommandEncoder,
        drawable: wgpu::SurfaceTexture,
        permit: SlotPermit,
        on_complete: CompletionMarker,
    ) {
        let view = drawable
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let slot = permit.slot();
        if let Some(plan) = &self.plan {
            let presented = self
                .pass_context(plan, slot, FillColorInput::default(), None)
                .map(|ctx| passes::present::present(&ctx, &mut commands, &view));
            if let Some(Err(reason)) = presented {
                log::warn!("present skipped: {reason}");
            }
        }

        if let Some(timers) = &self.timers {
            timers.end(slot, &mut commands);
        }

        let stats = self.stats.clone();
        let submitted_at = Instant::now();
        let _ = self.context.queue.submit(Some(commands.finish()));
        let finish = move |gpu_time| {
            stats.record_completion(
                gpu_time,
                submitted_at.elapsed(),
                Instant::now(),
            );
            on_complete.complete();
            drop(permit);
        };
        match &self.timers {
            Some(timers) => timers.read(slot, finish),
            None => self
                .context
                .queue
                .on_submitted_work_done(move || finish(None)),
        }
        drawable.present();
    }

    fn prepare_capture(&mut self, photo: &PhotoConfig) -> Result<(), CaptureError> {
        let caps = self.context.capabilities;
        let size = photo.final_texture_size.max(1);
        let shadow_size = photo.shadow_texture_size.min(caps.max_texture_dimension);
        if shadow_size < photo.shadow_texture_size {
            log::warn!(
                "photo shadow map clamped from {} to {shadow_size}",
                photo.shadow_texture_size
            );
        }

        let device = &self.context.device;
        let textures = TextureSet::new(
            device,
            "Photo",
            TextureSetDescriptor {
                render_size: (size, size),
                output_size: (size, size),
                shadow_size,
                storage: caps.compute_shaders,
            },
            caps.max_texture_dimension,
        )
        .map_err(|e| CaptureError::Unknown(e.to_string()))?;
        let bindings = TextureBindings::new(
            device,
            &self.layouts,
            &self.samplers,
            &textures,
            caps.compute_shaders,
        );

        let inputs = FrameInputs {
            fill_color: true,
            shadows: true,
            bonds: true,
            debug_points: false,
            upscaled: false,
            high_quality: true,
        };
        for key in PassPlan::new(caps, inputs).pipeline_keys() {
            let _ = self
                .pipelines
                .get_or_compile(&key)
                .map_err(|e| CaptureError::Unknown(e.to_string()))?;
        }

        self.photo = Some(PhotoTargets {
            textures,
            bindings,
            readback: TextureReadback::new(device, size, size),
            clear_background: photo.clear_background,
        });
        Ok(())
    }

    fn encode_capture(
        &mut self,
        slot: usize,
        scene: &Scene,
    ) -> Result<wgpu::CommandEncoder, CaptureError> {
        let photo = self.photo.as_ref().ok_or_else(|| {
            CaptureError::Unknown("photo targets not allocated".to_owned())
        })?;
        let plan = PassPlan::new(
            self.context.capabilities,
            self.frame_inputs(scene, true),
        );
        self.fill_on_host(scene);
        let mut encoder = self.context.create_encoder("Photo Encoder");
        self.encode_plan(&plan, slot, scene, Some(photo), &mut encoder)?;
        Ok(encoder)
    }

    fn discard_capture(&mut self) {
        if self.photo.take().is_some() {
            log::debug!("photo targets released");
        }
    }

    fn submit_capture(
        &mut self,
        commands: wgpu::CommandEncoder,
        permit: SlotPermit,
    ) -> Result<CapturedImage, CaptureError> {
        let photo = self.photo.take().ok_or_else(|| {
            CaptureError::Unknown("photo targets not allocated".to_owned())
        })?;
        let (width, height) = photo.textures.output.size();

        let _ = self.context.queue.submit(Some(commands.finish()));
        self.context.queue.on_submitted_work_done(move || drop(permit));
        let rgba = photo
            .readback
            .read(&self.context.device)
            .map_err(CaptureError::Unknown)?;
        log::info!("captured {width}x{height} photo");
        Ok(CapturedImage {
            width,
            height,
            rgba,
        })
    }
}
