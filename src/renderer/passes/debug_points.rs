//! One point per atom centre, drawn over the shaded image.

use super::{
    color_attachment, depth_attachment, wrong_kind, PassContext, SkipReason,
};
use crate::{geometry::billboard::INDICES_PER_ATOM, renderer::plan::PassKind};

/// Points for the atoms of the current configuration.
pub fn points(
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
) -> Result<(), SkipReason> {
    let (geometry, window) = ctx.atom_window()?;
    let pipeline = ctx.pipeline(PassKind::DebugPoints)?;
    let pipeline = pipeline
        .render()
        .ok_or_else(|| wrong_kind(PassKind::DebugPoints))?;
    let per_atom = INDICES_PER_ATOM as u32;
    let first = window.offset / per_atom;
    let atoms = first..first + window.length / per_atom;

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Debug Points Pass"),
        color_attachments: &[color_attachment(
            &ctx.textures.color.view,
            wgpu::LoadOp::Load,
        )],
        depth_stencil_attachment: Some(depth_attachment(
            &ctx.textures.depth.view,
            wgpu::LoadOp::Load,
        )),
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, ctx.frame_bind_group, &[]);
    // Stride of four vertices: one centre per atom
    pass.set_vertex_buffer(0, geometry.centers.slice());
    pass.draw(atoms, 0..1);
    Ok(())
}
