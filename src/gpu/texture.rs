//! Render targets and the per-viewport texture set.

use super::{
    buffer::{check_allocation, ResourceError},
    layouts::{COLOR_FORMAT, DEPTH_FORMAT, SHADOW_FORMAT},
};

/// A texture and its default view.
pub struct RenderTarget {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// A default full-texture view.
    pub view: wgpu::TextureView,
}

impl RenderTarget {
    /// Create a 2D texture of `size` with `format` and `usage`.
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        size: (u32, u32),
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Width and height in texels.
    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }
}

/// Sizes and options of a [`TextureSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSetDescriptor {
    /// Size the scene is rendered at.
    pub render_size: (u32, u32),
    /// Size of the final image (surface or photo).
    pub output_size: (u32, u32),
    /// Edge of the square shadow map.
    pub shadow_size: u32,
    /// Whether compute kernels may write the blur and upscale outputs.
    pub storage: bool,
}

/// Every texture a frame renders into, sized for one viewport.
///
/// Recreated as a whole on resize; the photo path builds its own.
pub struct TextureSet {
    /// Scene colour at render size.
    pub color: RenderTarget,
    /// Scene depth at render size.
    pub depth: RenderTarget,
    /// Shadow map depth.
    pub shadow_depth: RenderTarget,
    /// Shadow map depth copied into a colour target for filtering.
    pub shadow_color: RenderTarget,
    /// Blurred shadow map.
    pub shadow_blurred: RenderTarget,
    /// Final image at output size, the source of present and readback.
    pub output: RenderTarget,
    descriptor: TextureSetDescriptor,
}

impl TextureSet {
    /// Allocate the set.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::TooLarge`] if any edge exceeds
    /// `max_dimension`.
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        descriptor: TextureSetDescriptor,
        max_dimension: u32,
    ) -> Result<Self, ResourceError> {
        let TextureSetDescriptor {
            render_size,
            output_size,
            shadow_size,
            storage,
        } = descriptor;
        let limit = u64::from(max_dimension);
        for (what, edge) in [
            ("render width", render_size.0),
            ("render height", render_size.1),
            ("output width", output_size.0),
            ("output height", output_size.1),
            ("shadow map", shadow_size),
        ] {
            check_allocation(&format!("{label} {what}"), u64::from(edge), limit)?;
        }

        use wgpu::TextureUsages as U;
        let storage_usage = if storage { U::STORAGE_BINDING } else { U::empty() };
        let shadow = (shadow_size, shadow_size);
        let target = |name: &str, size, format, usage| {
            RenderTarget::new(device, &format!("{label} {name}"), size, format, usage)
        };

        Ok(Self {
            color: target(
                "Color",
                render_size,
                COLOR_FORMAT,
                U::RENDER_ATTACHMENT | U::TEXTURE_BINDING | U::COPY_SRC,
            ),
            depth: target("Depth", render_size, DEPTH_FORMAT, U::RENDER_ATTACHMENT),
            shadow_depth: target(
                "Shadow Depth",
                shadow,
                DEPTH_FORMAT,
                U::RENDER_ATTACHMENT | U::TEXTURE_BINDING,
            ),
            shadow_color: target(
                "Shadow Color",
                shadow,
                SHADOW_FORMAT,
                U::RENDER_ATTACHMENT | U::TEXTURE_BINDING,
            ),
            shadow_blurred: target(
                "Shadow Blurred",
                shadow,
                SHADOW_FORMAT,
                U::TEXTURE_BINDING | storage_usage,
            ),
            output: target(
                "Output",
                output_size,
                COLOR_FORMAT,
                U::TEXTURE_BINDING | U::COPY_DST | U::COPY_SRC | storage_usage,
            ),
            descriptor,
        })
    }

    /// The sizes this set was built for.
    pub fn descriptor(&self) -> TextureSetDescriptor {
        self.descriptor
    }

    /// Whether render and output sizes differ, i.e. the upscale kernel has
    /// work to do.
    pub fn is_upscaled(&self) -> bool {
        self.descriptor.render_size != self.descriptor.output_size
    }
}

/// Render size for `output` at `scale` (`1.0` = native), at least 1×1.
#[must_use]
pub fn scaled_size(output: (u32, u32), scale: f32) -> (u32, u32) {
    let scale = scale.clamp(0.25, 1.0);
    (
        ((output.0 as f32 * scale).round() as u32).max(1),
        ((output.1 as f32 * scale).round() as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_size_rounds_and_clamps() {
        assert_eq!(scaled_size((1920, 1080), 1.0), (1920, 1080));
        assert_eq!(scaled_size((1920, 1080), 0.5), (960, 540));
        assert_eq!(scaled_size((3, 3), 0.5), (2, 2));
        assert_eq!(scaled_size((100, 100), 0.0), (25, 25));
        assert_eq!(scaled_size((100, 100), 4.0), (100, 100));
    }
}
