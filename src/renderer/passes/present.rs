//! Output passes: passthrough copy, present and readback.

use super::{color_attachment, wrong_kind, PassContext, SkipReason};
use crate::{gpu::readback::TextureReadback, renderer::plan::PassKind};

/// Copy the colour target into the output texture unchanged.
pub fn passthrough(ctx: &PassContext<'_>, encoder: &mut wgpu::CommandEncoder) {
    let (cw, ch) = ctx.textures.color.size();
    let (ow, oh) = ctx.textures.output.size();
    encoder.copy_texture_to_texture(
        ctx.textures.color.texture.as_image_copy(),
        ctx.textures.output.texture.as_image_copy(),
        wgpu::Extent3d {
            width: cw.min(ow),
            height: ch.min(oh),
            depth_or_array_layers: 1,
        },
    );
}

/// Blit the output texture onto `target`, the acquired surface texture.
pub fn present(
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
    target: &wgpu::TextureView,
) -> Result<(), SkipReason> {
    let pipeline = ctx.pipeline(PassKind::Present)?;
    let pipeline = pipeline
        .render()
        .ok_or_else(|| wrong_kind(PassKind::Present))?;

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Present Pass"),
        color_attachments: &[color_attachment(
            target,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
        )],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, &ctx.bindings.present, &[]);
    pass.draw(0..3, 0..1);
    Ok(())
}

/// Copy the output texture into `readback`'s staging buffer.
pub fn readback(
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
    readback: &TextureReadback,
) {
    readback.encode_copy(encoder, &ctx.textures.output.texture);
}
