//! Pass encoders.
//!
//! Each pass records into the frame's command encoder from a shared
//! [`PassContext`] and reports a [`PassOutcome`]. A pass whose inputs are
//! missing records nothing and reports why; [`encode`] logs the skip.

pub mod compute;
#[cfg(debug_assertions)]
pub mod debug_points;
pub mod impostor;
pub mod present;
pub mod shadow;

use std::{fmt, sync::Arc};

use super::plan::{PassKind, PassPlan};
use crate::{
    gpu::{
        resources::{GeometryBuffers, TextureBindings},
        texture::TextureSet,
    },
    pipeline::{GpuPipeline, PipelineCache, WgpuPipelineCompiler},
    scene::{ConfigurationWindow, FillColorInput},
};

/// Why a pass recorded nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No geometry is loaded.
    NoGeometry,
    /// The configuration window is empty.
    EmptyWindow,
    /// The structure has no bonds.
    NoBonds,
    /// A bind group the pass needs does not exist on this device.
    MissingBindGroup(&'static str),
    /// The pass's pipeline failed to compile.
    Pipeline(String),
    /// The pass is not encoded through [`encode`].
    NotApplicable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoGeometry => f.write_str("no geometry loaded"),
            Self::EmptyWindow => f.write_str("empty configuration window"),
            Self::NoBonds => f.write_str("no bond geometry"),
            Self::MissingBindGroup(name) => {
                write!(f, "missing {name} bind group")
            }
            Self::Pipeline(msg) => write!(f, "pipeline unavailable: {msg}"),
            Self::NotApplicable => f.write_str("encoded elsewhere"),
        }
    }
}

/// Result of one pass encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Commands were recorded.
    Encoded,
    /// Nothing was recorded.
    Skipped(SkipReason),
}

impl From<Result<(), SkipReason>> for PassOutcome {
    fn from(result: Result<(), SkipReason>) -> Self {
        match result {
            Ok(()) => Self::Encoded,
            Err(reason) => Self::Skipped(reason),
        }
    }
}

/// Everything a pass may read while encoding one frame.
pub struct PassContext<'a> {
    /// Queue, for the colour fill input upload.
    pub queue: &'a wgpu::Queue,
    /// Compiled pipelines.
    pub pipelines: &'a PipelineCache<WgpuPipelineCompiler>,
    /// The frame's plan; decides pipeline variants and load ops.
    pub plan: &'a PassPlan,
    /// Loaded structure, if any.
    pub geometry: Option<&'a GeometryBuffers>,
    /// Render targets of this frame.
    pub textures: &'a TextureSet,
    /// Bind groups over `textures`.
    pub bindings: &'a TextureBindings,
    /// Group 0 of the frame's uniform slot.
    pub frame_bind_group: &'a wgpu::BindGroup,
    /// Fill colour table, with the atom count set.
    pub fill: FillColorInput,
    /// Background colour of the colour target.
    pub clear_color: wgpu::Color,
}

impl PassContext<'_> {
    /// Pipeline of `pass` in this frame's plan.
    fn pipeline(&self, pass: PassKind) -> Result<Arc<GpuPipeline>, SkipReason> {
        let key = self
            .plan
            .pipeline_key(pass)
            .ok_or(SkipReason::NotApplicable)?;
        self.pipelines
            .get_or_compile(&key)
            .map_err(|e| SkipReason::Pipeline(e.to_string()))
    }

    fn geometry(&self) -> Result<&GeometryBuffers, SkipReason> {
        self.geometry.ok_or(SkipReason::NoGeometry)
    }

    /// Geometry plus the current atom window, which must be non-empty.
    fn atom_window(
        &self,
    ) -> Result<(&GeometryBuffers, ConfigurationWindow), SkipReason> {
        let geometry = self.geometry()?;
        let window = geometry.selector.current_window();
        if window.is_empty() {
            return Err(SkipReason::EmptyWindow);
        }
        Ok((geometry, window))
    }
}

/// A pipeline of the other kind came back for `pass`.
fn wrong_kind(pass: PassKind) -> SkipReason {
    SkipReason::Pipeline(format!("unexpected pipeline kind for {pass}"))
}

/// Depth load op: keep what an earlier pass wrote, or clear to far.
fn depth_load(keep: bool) -> wgpu::LoadOp<f32> {
    if keep {
        wgpu::LoadOp::Load
    } else {
        wgpu::LoadOp::Clear(1.0)
    }
}

fn depth_attachment(
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<f32>,
) -> wgpu::RenderPassDepthStencilAttachment<'_> {
    wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    }
}

fn color_attachment(
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
) -> Option<wgpu::RenderPassColorAttachment<'_>> {
    Some(wgpu::RenderPassColorAttachment {
        view,
        depth_slice: None,
        resolve_target: None,
        ops: wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        },
    })
}

/// Draw the window's billboards with the frame bind group as group 0.
fn draw_billboards(
    pass: &mut wgpu::RenderPass<'_>,
    pipeline: &wgpu::RenderPipeline,
    frame_bind_group: &wgpu::BindGroup,
    geometry: &GeometryBuffers,
    window: ConfigurationWindow,
) {
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, frame_bind_group, &[]);
    geometry.set_billboard_buffers(pass);
    pass.draw_indexed(window.range(), 0, 0..1);
}

/// Record `pass`. Present and readback need the surface or a staging
/// buffer and are recorded by the backend itself.
pub fn encode(
    pass: PassKind,
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
) -> PassOutcome {
    let outcome = match pass {
        PassKind::FillColor => compute::fill_color(ctx, encoder),
        PassKind::ShadowPrePass => shadow::pre_pass(ctx, encoder),
        PassKind::ShadowMap => shadow::shadow_map(ctx, encoder),
        PassKind::ShadowBlur => compute::shadow_blur(ctx, encoder),
        PassKind::DepthPrePass => impostor::depth_pre_pass(ctx, encoder),
        PassKind::Impostor => impostor::spheres(ctx, encoder),
        PassKind::Bonds => impostor::bonds(ctx, encoder),
        #[cfg(debug_assertions)]
        PassKind::DebugPoints => debug_points::points(ctx, encoder),
        PassKind::Upscale => compute::upscale(ctx, encoder),
        PassKind::Passthrough => {
            present::passthrough(ctx, encoder);
            Ok(())
        }
        #[cfg(not(debug_assertions))]
        PassKind::DebugPoints => Err(SkipReason::NotApplicable),
        PassKind::Present | PassKind::Readback => Err(SkipReason::NotApplicable),
    };
    let outcome = PassOutcome::from(outcome);
    if let PassOutcome::Skipped(reason) = &outcome {
        log::debug!("{pass} pass skipped: {reason}");
    }
    outcome
}

/// Clear the colour target when no geometry is loaded, so the output does
/// not keep the last structure's image.
pub fn clear(ctx: &PassContext<'_>, encoder: &mut wgpu::CommandEncoder) {
    let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Clear Pass"),
        color_attachments: &[color_attachment(
            &ctx.textures.color.view,
            wgpu::LoadOp::Clear(ctx.clear_color),
        )],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_map_to_outcomes() {
        assert_eq!(PassOutcome::from(Ok(())), PassOutcome::Encoded);
        assert_eq!(
            PassOutcome::from(Err(SkipReason::NoGeometry)),
            PassOutcome::Skipped(SkipReason::NoGeometry)
        );
    }

    #[test]
    fn skip_reasons_read_as_log_lines() {
        assert_eq!(
            SkipReason::MissingBindGroup("shadow").to_string(),
            "missing shadow bind group"
        );
        assert_eq!(SkipReason::EmptyWindow.to_string(), "empty configuration window");
    }
}
