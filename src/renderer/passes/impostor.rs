//! Camera passes: depth pre-pass, sphere impostors and bond impostors.

use super::{
    color_attachment, depth_attachment, depth_load, draw_billboards,
    wrong_kind, PassContext, SkipReason,
};
use crate::{pipeline::defs, renderer::plan::PassKind};

/// Group 1 for `pass`, if its pipeline samples the shadow map.
fn shadow_group<'a>(
    ctx: &PassContext<'a>,
    pass: PassKind,
) -> Result<Option<&'a wgpu::BindGroup>, SkipReason> {
    let samples_shadow = ctx
        .plan
        .pipeline_key(pass)
        .is_some_and(|key| key.specialization.is_set(defs::SHADOW_MAP));
    if !samples_shadow {
        return Ok(None);
    }
    ctx.bindings
        .shadow
        .as_ref()
        .map(Some)
        .ok_or(SkipReason::MissingBindGroup("shadow"))
}

/// Depth-only sphere billboards into the camera depth target.
pub fn depth_pre_pass(
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
) -> Result<(), SkipReason> {
    let (geometry, window) = ctx.atom_window()?;
    let pipeline = ctx.pipeline(PassKind::DepthPrePass)?;
    let pipeline = pipeline
        .render()
        .ok_or_else(|| wrong_kind(PassKind::DepthPrePass))?;

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Depth Pre-Pass"),
        color_attachments: &[],
        depth_stencil_attachment: Some(depth_attachment(
            &ctx.textures.depth.view,
            depth_load(false),
        )),
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    draw_billboards(&mut pass, pipeline, ctx.frame_bind_group, geometry, window);
    Ok(())
}

/// Shaded sphere impostors. Clears the colour target; keeps the pre-pass
/// depth when one ran.
pub fn spheres(
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
) -> Result<(), SkipReason> {
    let (geometry, window) = ctx.atom_window()?;
    let pipeline = ctx.pipeline(PassKind::Impostor)?;
    let pipeline = pipeline
        .render()
        .ok_or_else(|| wrong_kind(PassKind::Impostor))?;
    let shadow = shadow_group(ctx, PassKind::Impostor)?;
    let after_pre_pass = ctx.plan.contains(PassKind::DepthPrePass);

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Impostor Pass"),
        color_attachments: &[color_attachment(
            &ctx.textures.color.view,
            wgpu::LoadOp::Clear(ctx.clear_color),
        )],
        depth_stencil_attachment: Some(depth_attachment(
            &ctx.textures.depth.view,
            depth_load(after_pre_pass),
        )),
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    if let Some(shadow) = shadow {
        pass.set_bind_group(1, shadow, &[]);
    }
    draw_billboards(&mut pass, pipeline, ctx.frame_bind_group, geometry, window);
    Ok(())
}

/// Cylinder impostors for the current configuration's bonds, over the
/// spheres.
pub fn bonds(
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
) -> Result<(), SkipReason> {
    let geometry = ctx.geometry()?;
    let bonds = geometry.bonds.as_ref().ok_or(SkipReason::NoBonds)?;
    let window = geometry.selector.current_bond_window();
    if window.is_empty() {
        return Err(SkipReason::EmptyWindow);
    }
    let pipeline = ctx.pipeline(PassKind::Bonds)?;
    let pipeline = pipeline
        .render()
        .ok_or_else(|| wrong_kind(PassKind::Bonds))?;
    let shadow = shadow_group(ctx, PassKind::Bonds)?;

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Bond Pass"),
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
    if let Some(shadow) = shadow {
        pass.set_bind_group(1, shadow, &[]);
    }
    pass.set_vertex_buffer(0, bonds.vertices.slice());
    pass.set_index_buffer(bonds.indices.slice(), wgpu::IndexFormat::Uint32);
    pass.draw_indexed(window.range(), 0, 0..1);
    Ok(())
}
