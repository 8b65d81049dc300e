//! Compute passes: colour fill, shadow blur and upscale.

use super::{wrong_kind, PassContext, SkipReason};
use crate::{
    renderer::plan::PassKind,
    util::dispatch::{image_workgroups, workgroups_for, ATOM_WORKGROUP_SIZE},
};

fn dispatch(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    groups: (u32, u32),
) {
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(label),
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.dispatch_workgroups(groups.0, groups.1, 1);
}

/// Write one colour per atom of a configuration from the fill table. One
/// thread per atom; the kernel drops the tail of the last workgroup.
pub fn fill_color(
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
) -> Result<(), SkipReason> {
    let geometry = ctx.geometry()?;
    let atoms = geometry.atoms_per_configuration();
    if atoms == 0 {
        return Err(SkipReason::NoGeometry);
    }
    let pipeline = ctx.pipeline(PassKind::FillColor)?;
    let pipeline = pipeline.compute().ok_or_else(|| wrong_kind(PassKind::FillColor))?;

    ctx.queue.write_buffer(
        &geometry.fill_input,
        0,
        bytemuck::bytes_of(&ctx.fill),
    );
    dispatch(
        encoder,
        "Fill Color Pass",
        pipeline,
        &geometry.fill_bind_group,
        (workgroups_for(atoms as u32, ATOM_WORKGROUP_SIZE), 1),
    );
    Ok(())
}

/// Box-blur the shadow map into the filtered shadow texture.
pub fn shadow_blur(
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
) -> Result<(), SkipReason> {
    let bind_group = ctx
        .bindings
        .shadow_blur
        .as_ref()
        .ok_or(SkipReason::MissingBindGroup("shadow blur"))?;
    let pipeline = ctx.pipeline(PassKind::ShadowBlur)?;
    let pipeline = pipeline.compute().ok_or_else(|| wrong_kind(PassKind::ShadowBlur))?;
    let (width, height) = ctx.textures.shadow_color.size();
    dispatch(
        encoder,
        "Shadow Blur Pass",
        pipeline,
        bind_group,
        image_workgroups(width, height),
    );
    Ok(())
}

/// Upscale the colour target into the output texture.
pub fn upscale(
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
) -> Result<(), SkipReason> {
    let bind_group = ctx
        .bindings
        .upscale
        .as_ref()
        .ok_or(SkipReason::MissingBindGroup("upscale"))?;
    let pipeline = ctx.pipeline(PassKind::Upscale)?;
    let pipeline = pipeline.compute().ok_or_else(|| wrong_kind(PassKind::Upscale))?;
    let (width, height) = ctx.textures.output.size();
    dispatch(
        encoder,
        "Upscale Pass",
        pipeline,
        bind_group,
        image_workgroups(width, height),
    );
    Ok(())
}
