//! Shadow map passes, drawn from the sun with an orthographic projection.

use super::{
    color_attachment, depth_attachment, depth_load, draw_billboards,
    wrong_kind, PassContext, SkipReason,
};
use crate::renderer::plan::PassKind;

/// Depth-only billboards into the shadow depth target.
pub fn pre_pass(
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
) -> Result<(), SkipReason> {
    let (geometry, window) = ctx.atom_window()?;
    let pipeline = ctx.pipeline(PassKind::ShadowPrePass)?;
    let pipeline = pipeline
        .render()
        .ok_or_else(|| wrong_kind(PassKind::ShadowPrePass))?;

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Shadow Pre-Pass"),
        color_attachments: &[],
        depth_stencil_attachment: Some(depth_attachment(
            &ctx.textures.shadow_depth.view,
            depth_load(false),
        )),
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    draw_billboards(&mut pass, pipeline, ctx.frame_bind_group, geometry, window);
    Ok(())
}

/// Sphere depth from the sun into the R32 shadow map. Tests against the
/// pre-pass depth when one ran.
pub fn shadow_map(
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
) -> Result<(), SkipReason> {
    let (geometry, window) = ctx.atom_window()?;
    let pipeline = ctx.pipeline(PassKind::ShadowMap)?;
    let pipeline = pipeline
        .render()
        .ok_or_else(|| wrong_kind(PassKind::ShadowMap))?;
    let after_pre_pass = ctx.plan.contains(PassKind::ShadowPrePass);

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Shadow Map Pass"),
        // Far plane where nothing casts a shadow
        color_attachments: &[color_attachment(
            &ctx.textures.shadow_color.view,
            wgpu::LoadOp::Clear(wgpu::Color::WHITE),
        )],
        depth_stencil_attachment: Some(depth_attachment(
            &ctx.textures.shadow_depth.view,
            depth_load(after_pre_pass),
        )),
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    draw_billboards(&mut pass, pipeline, ctx.frame_bind_group, geometry, window);
    Ok(())
}
