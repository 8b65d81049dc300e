//! Bind group layouts shared by the pipeline compiler and the resources
//! that bind against them.
//!
//! | Layout | Bindings |
//! |---|---|
//! | `frame` | 0: `FrameUniforms`, 1: per-atom colours (read-only) |
//! | `shadow` | 0: shadow depth, 1: comparison sampler, 2: filtered shadow |
//! | `fill_color` | 0: `FillColorInput`, 1: elements, 2: subunits, 3: colours |
//! | `image_r32` | 0: input texture, 1: `r32float` storage output |
//! | `image_rgba8` | 0: input texture, 1: `rgba8unorm` storage output |
//! | `present` | 0: final colour, 1: linear sampler |

use super::pipeline_helpers as ph;

/// Format of the colour target and the final (upscaled) image.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Format of the shadow map colour copy and its blurred version.
pub const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
/// Format of every depth target.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Every bind group layout the renderer uses.
pub struct BindGroupLayouts {
    /// Group 0 of every raster program.
    pub frame: wgpu::BindGroupLayout,
    /// Group 1 of the impostor programs when shadows are supported.
    pub shadow: wgpu::BindGroupLayout,
    /// Fill-colour kernel.
    pub fill_color: wgpu::BindGroupLayout,
    /// Shadow blur kernel.
    pub image_r32: wgpu::BindGroupLayout,
    /// Upscale kernel.
    pub image_rgba8: wgpu::BindGroupLayout,
    /// Present blit.
    pub present: wgpu::BindGroupLayout,
}

impl BindGroupLayouts {
    /// Create all layouts on `device`.
    pub fn new(device: &wgpu::Device) -> Self {
        let raster =
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
        let compute = wgpu::ShaderStages::COMPUTE;
        let layout = |label: &str, entries: &[wgpu::BindGroupLayoutEntry]| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries,
            })
        };

        Self {
            frame: layout(
                "Frame Layout",
                &[
                    ph::uniform_buffer(0, raster),
                    ph::storage_buffer(1, raster, true),
                ],
            ),
            shadow: layout(
                "Shadow Layout",
                &[
                    ph::depth_texture_2d(0),
                    ph::sampler(1, wgpu::SamplerBindingType::Comparison),
                    ph::texture_2d(2, wgpu::ShaderStages::FRAGMENT, false),
                ],
            ),
            fill_color: layout(
                "Fill Color Layout",
                &[
                    ph::uniform_buffer(0, compute),
                    ph::storage_buffer(1, compute, true),
                    ph::storage_buffer(2, compute, true),
                    ph::storage_buffer(3, compute, false),
                ],
            ),
            image_r32: layout(
                "Shadow Blur Layout",
                &[
                    ph::texture_2d(0, compute, false),
                    ph::storage_texture_2d(1, SHADOW_FORMAT),
                ],
            ),
            image_rgba8: layout(
                "Upscale Layout",
                &[
                    ph::texture_2d(0, compute, false),
                    ph::storage_texture_2d(1, COLOR_FORMAT),
                ],
            ),
            present: layout(
                "Present Layout",
                &[
                    ph::texture_2d(0, wgpu::ShaderStages::FRAGMENT, true),
                    ph::sampler(1, wgpu::SamplerBindingType::Filtering),
                ],
            ),
        }
    }
}
