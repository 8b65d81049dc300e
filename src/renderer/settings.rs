//! Configuration surface of [`Renderer`]. Every setter mirrors its value
//! into the stored [`RenderOptions`], so saving the options captures the
//! current state.

use super::{
    draw_settings,
    frame::{FrameBackend, FramePacer},
    Renderer,
};
use crate::{
    geometry::Visualization,
    options::{RenderOptions, UpscalingMode},
};

impl Renderer {
    /// Resize the surface and every render target. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.backend.context.resize(width, height);
        self.scene.set_viewport(width, height);
        self.backend.rebuild_targets();
        log::debug!("resized to {width}x{height}");
    }

    /// Start or stop configuration playback.
    pub fn set_playing(&mut self, playing: bool) {
        self.playback.set_playing(playing);
        self.scene.set_playing(playing);
    }

    /// Flip playback.
    pub fn toggle_playback(&mut self) {
        self.set_playing(!self.playback.is_playing());
    }

    /// Whether configurations are being played back.
    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Toggle shadows. Only a uniform changes; the pipelines stay.
    pub fn set_shadows(&mut self, enabled: bool) {
        self.options.lighting.shadows = enabled;
        self.scene.set_shadows(enabled);
    }

    /// Shadow darkening in `[0, 1]`.
    pub fn set_shadow_strength(&mut self, strength: f32) {
        self.options.lighting.shadow_strength = strength.clamp(0.0, 1.0);
        self.scene.set_shadow_strength(strength);
    }

    /// Toggle depth cueing.
    pub fn set_depth_cueing(&mut self, enabled: bool) {
        self.options.lighting.depth_cueing = enabled;
        self.scene.set_depth_cueing(enabled);
    }

    /// Depth cueing amount in `[0, 1]`.
    pub fn set_depth_cueing_strength(&mut self, strength: f32) {
        self.options.lighting.depth_cueing_strength = strength.clamp(0.0, 1.0);
        self.scene.set_depth_cueing_strength(strength);
    }

    /// Switch between solid spheres and ball-and-stick. Rewrites the
    /// radius buffer of the loaded structure.
    pub fn set_visualization(&mut self, visualization: Visualization) {
        if visualization == self.scene.visualization() {
            return;
        }
        self.options.display.visualization = visualization;
        self.scene.set_visualization(visualization);
        self.backend.set_visualization(visualization);
    }

    /// Render below output resolution and upscale. `render_scale` is
    /// clamped to `[0.25, 1]` and ignored when `mode` is off or the device
    /// has no compute shaders.
    pub fn set_upscaling(&mut self, mode: UpscalingMode, render_scale: f32) {
        let quality = &mut self.options.quality;
        quality.upscaling = mode;
        quality.render_scale = render_scale.clamp(0.25, 1.0);
        let scale = quality.effective_render_scale();
        if (scale - self.backend.targets.render_scale).abs() > f32::EPSILON {
            self.backend.targets.render_scale = scale;
            self.backend.rebuild_targets();
            self.scene.request_redraw();
        }
    }

    /// Apply a full set of options, rebuilding only what changed.
    pub fn apply_options(&mut self, options: &RenderOptions) {
        let previous = std::mem::replace(&mut self.options, options.clone());

        self.apply_scene_options();
        if previous.display.visualization != options.display.visualization {
            self.backend.set_visualization(options.display.visualization);
        }
        if previous.display.color_by != options.display.color_by {
            self.color_by(options.display.color_by);
        }

        let quality = &options.quality;
        let scale_changed = (previous.quality.effective_render_scale()
            - quality.effective_render_scale())
        .abs()
            > f32::EPSILON;
        if scale_changed
            || previous.quality.shadow_map_size != quality.shadow_map_size
        {
            self.backend.targets.render_scale = quality.effective_render_scale();
            self.backend.targets.shadow_map_size = quality.shadow_map_size;
            self.backend.rebuild_targets();
        }

        let frames_in_flight = quality.frames_in_flight.clamp(2, 3);
        if frames_in_flight != self.pacer.slots().capacity() {
            // Every in-flight frame must release its slot before the ring
            // it reads from is replaced
            self.backend.wait_for_gpu();
            self.backend.rebuild_uniforms(frames_in_flight);
            self.pacer = FramePacer::new(frames_in_flight);
            log::info!("{frames_in_flight} frames in flight");
        }
        self.scene.request_redraw();
    }

    /// Push the stored options into the scene, playback clock and draw
    /// switches.
    pub(super) fn apply_scene_options(&mut self) {
        let RenderOptions {
            display,
            lighting,
            playback,
            ..
        } = &self.options;

        self.scene.set_visualization(display.visualization);
        self.scene.set_shadows(lighting.shadows);
        self.scene.set_shadow_strength(lighting.shadow_strength);
        self.scene.set_depth_cueing(lighting.depth_cueing);
        self.scene
            .set_depth_cueing_strength(lighting.depth_cueing_strength);
        self.scene
            .set_sun_direction(lighting.sun_theta, lighting.sun_phi);

        self.playback.set_fps(playback.fps);
        self.playback.set_looping(playback.looping);

        self.backend.draw = draw_settings(&self.options);
    }
}
