//! Device-side copies of the loaded structure and the per-frame uniform
//! ring.

use super::{
    buffer::{DeviceBuffer, ResourceError},
    layouts::BindGroupLayouts,
    pipeline_helpers as ph,
    texture::TextureSet,
};
use crate::{
    geometry::{
        billboard::{vertex_radii, BillboardGeometry},
        bonds::{BondGeometry, BondVertex},
        GeometrySnapshot, Visualization,
    },
    scene::{ConfigurationSelector, FillColorInput, FrameUniforms},
};

/// Run `f` inside an out-of-memory error scope and map a captured error
/// to [`ResourceError::OutOfMemory`].
pub fn with_oom_scope<T>(
    device: &wgpu::Device,
    label: &str,
    f: impl FnOnce() -> Result<T, ResourceError>,
) -> Result<T, ResourceError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let result = f();
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        log::warn!("{label}: {error}");
        return Err(ResourceError::OutOfMemory {
            label: label.to_owned(),
        });
    }
    result
}

/// Bond cylinder vertex and index buffers.
pub struct BondBuffers {
    /// Four [`BondVertex`] per bond.
    pub vertices: DeviceBuffer<BondVertex>,
    /// Six indices per bond, one block per configuration.
    pub indices: DeviceBuffer<u32>,
}

/// Every device buffer derived from one [`GeometrySnapshot`].
///
/// Built once per import and dropped on removal; only the radius buffer
/// is rewritten afterwards, when the visualization mode changes.
pub struct GeometryBuffers {
    /// Billboard corner offsets, vertex slot 0.
    pub offsets: DeviceBuffer<[f32; 2]>,
    /// Atom centres per vertex, vertex slot 1.
    pub centers: DeviceBuffer<[f32; 3]>,
    /// Corner mapping, vertex slot 2.
    pub mapping: DeviceBuffer<[f32; 2]>,
    /// Radius per vertex, vertex slot 3.
    pub radii: DeviceBuffer<f32>,
    /// Billboard triangle indices.
    pub indices: DeviceBuffer<u32>,
    /// Element class per atom of one configuration.
    pub elements: DeviceBuffer<u32>,
    /// Subunit per atom of one configuration.
    pub subunits: DeviceBuffer<u32>,
    /// Colour per atom, written by the fill-colour kernel.
    pub colors: DeviceBuffer<[f32; 4]>,
    /// Fill-colour kernel input.
    pub fill_input: wgpu::Buffer,
    /// Bind group of the fill-colour kernel.
    pub fill_bind_group: wgpu::BindGroup,
    /// Bond geometry, when the structure has bonds.
    pub bonds: Option<BondBuffers>,
    /// Index windows per configuration.
    pub selector: ConfigurationSelector,
    host_elements: Vec<u32>,
    host_subunits: Vec<u32>,
    atoms_per_configuration: usize,
    max_buffer_size: u64,
}

impl GeometryBuffers {
    /// Upload `snapshot` for drawing in `visualization` mode.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError`] if a buffer exceeds `max_buffer_size` or
    /// the device runs out of memory.
    pub fn upload(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        snapshot: &GeometrySnapshot,
        visualization: Visualization,
        max_buffer_size: u64,
    ) -> Result<Self, ResourceError> {
        let billboards = BillboardGeometry::build(snapshot, visualization);
        let bond_geometry = BondGeometry::build(snapshot);
        debug_assert!(billboards.is_consistent());

        with_oom_scope(device, "geometry upload", || {
            use wgpu::BufferUsages as U;
            let limit = max_buffer_size;
            let vertex = U::VERTEX;
            let storage = U::STORAGE;

            let host_elements: Vec<u32> =
                snapshot.elements().iter().map(|&e| u32::from(e)).collect();
            let host_subunits: Vec<u32> =
                snapshot.subunits().iter().map(|&s| u32::from(s)).collect();
            let colors = vec![[1.0_f32; 4]; snapshot.atoms_per_configuration()];

            let elements = DeviceBuffer::with_data(
                device,
                "Elements",
                &host_elements,
                storage,
                limit,
            )?;
            let subunits = DeviceBuffer::with_data(
                device,
                "Subunits",
                &host_subunits,
                storage,
                limit,
            )?;
            let colors = DeviceBuffer::with_data(
                device,
                "Atom Colors",
                &colors,
                storage,
                limit,
            )?;
            let fill_input = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Fill Color Input"),
                size: size_of::<FillColorInput>() as u64,
                usage: U::UNIFORM | U::COPY_DST,
                mapped_at_creation: false,
            });
            let fill_bind_group =
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Fill Color Bind Group"),
                    layout: &layouts.fill_color,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: fill_input.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: elements.buffer().as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: subunits.buffer().as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: colors.buffer().as_entire_binding(),
                        },
                    ],
                });

            let bonds = match &bond_geometry {
                Some(b) => Some(BondBuffers {
                    vertices: DeviceBuffer::with_data(
                        device,
                        "Bond Vertices",
                        &b.vertices,
                        vertex,
                        limit,
                    )?,
                    indices: DeviceBuffer::with_data(
                        device,
                        "Bond Indices",
                        &b.indices,
                        U::INDEX,
                        limit,
                    )?,
                }),
                None => None,
            };
            let buffer = |label: &str, data: &[[f32; 2]]| {
                DeviceBuffer::with_data(device, label, data, vertex, limit)
            };

            let mut selector = ConfigurationSelector::new(
                snapshot.atoms_per_configuration(),
                snapshot.configuration_count(),
            );
            if let Some(topology) = snapshot.bonds() {
                selector.set_bonds(topology);
            }

            Ok(Self {
                offsets: buffer("Billboard Offsets", &billboards.offsets)?,
                centers: DeviceBuffer::with_data(
                    device,
                    "Billboard Centers",
                    &billboards.centers,
                    vertex,
                    limit,
                )?,
                mapping: buffer("Billboard Mapping", &billboards.mapping)?,
                radii: DeviceBuffer::with_data(
                    device,
                    "Billboard Radii",
                    &billboards.radii,
                    vertex,
                    limit,
                )?,
                indices: DeviceBuffer::with_data(
                    device,
                    "Billboard Indices",
                    &billboards.indices,
                    U::INDEX,
                    limit,
                )?,
                elements,
                subunits,
                colors,
                fill_input,
                fill_bind_group,
                bonds,
                selector,
                host_elements,
                host_subunits,
                atoms_per_configuration: snapshot.atoms_per_configuration(),
                max_buffer_size,
            })
        })
    }

    /// Rewrite the per-vertex radii for a new visualization mode.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError`] if the buffer would have to grow past the
    /// device limit, which cannot happen for the snapshot it was built from.
    pub fn set_visualization(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        snapshot: &GeometrySnapshot,
        visualization: Visualization,
    ) -> Result<(), ResourceError> {
        let radii = vertex_radii(snapshot, visualization);
        let _ = self
            .radii
            .write(device, queue, &radii, self.max_buffer_size)?;
        Ok(())
    }

    /// Write the per-atom colours from the host, for devices without
    /// compute shaders.
    pub fn fill_colors_on_host(&self, queue: &wgpu::Queue, fill: &FillColorInput) {
        let colors = fill.colors_for(&self.host_elements, &self.host_subunits);
        if !colors.is_empty() {
            queue.write_buffer(
                self.colors.buffer(),
                0,
                bytemuck::cast_slice(&colors),
            );
        }
    }

    /// Atoms per configuration, the fill-colour dispatch size.
    pub fn atoms_per_configuration(&self) -> usize {
        self.atoms_per_configuration
    }

    /// Bind the four billboard vertex buffers to slots 0 to 3.
    pub fn set_billboard_buffers(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.offsets.slice());
        pass.set_vertex_buffer(1, self.centers.slice());
        pass.set_vertex_buffer(2, self.mapping.slice());
        pass.set_vertex_buffer(3, self.radii.slice());
        pass.set_index_buffer(self.indices.slice(), wgpu::IndexFormat::Uint32);
    }
}

/// Per-slot uniform buffers and their frame bind groups.
///
/// Each in-flight frame owns one slot, so the CPU never overwrites uniforms
/// the GPU may still be reading.
pub struct UniformRing {
    buffers: Vec<wgpu::Buffer>,
    bind_groups: Vec<wgpu::BindGroup>,
    placeholder_colors: wgpu::Buffer,
}

impl UniformRing {
    /// `slots` uniform buffers, bound against a placeholder colour buffer
    /// until geometry is loaded.
    pub fn new(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        slots: usize,
    ) -> Self {
        let buffers = (0..slots)
            .map(|i| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("Frame Uniforms {i}")),
                    size: size_of::<FrameUniforms>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM
                        | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
            .collect();
        let placeholder_colors =
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Placeholder Colors"),
                size: 16,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            });
        let mut ring = Self {
            buffers,
            bind_groups: Vec::new(),
            placeholder_colors,
        };
        ring.rebind(device, layouts, None);
        ring
    }

    /// Rebuild the frame bind groups against `colors`, or the placeholder.
    pub fn rebind(
        &mut self,
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        colors: Option<&wgpu::Buffer>,
    ) {
        let colors = colors.unwrap_or(&self.placeholder_colors);
        self.bind_groups = self
            .buffers
            .iter()
            .enumerate()
            .map(|(i, uniforms)| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("Frame Bind Group {i}")),
                    layout: &layouts.frame,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniforms.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: colors.as_entire_binding(),
                        },
                    ],
                })
            })
            .collect();
    }

    /// Copy `uniforms` into slot `slot`.
    pub fn write(&self, queue: &wgpu::Queue, slot: usize, uniforms: &FrameUniforms) {
        if let Some(buffer) = self.buffers.get(slot) {
            queue.write_buffer(buffer, 0, bytemuck::bytes_of(uniforms));
        }
    }

    /// Bind group of slot `slot`.
    pub fn bind_group(&self, slot: usize) -> Option<&wgpu::BindGroup> {
        self.bind_groups.get(slot)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the ring has no slots.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Samplers shared by every texture set.
pub struct Samplers {
    /// Linear clamp sampler for present.
    pub linear: wgpu::Sampler,
    /// Shadow comparison sampler, when supported.
    pub comparison: Option<wgpu::Sampler>,
}

impl Samplers {
    /// Create the samplers; the comparison sampler only if supported.
    pub fn new(device: &wgpu::Device, comparison_samplers: bool) -> Self {
        Self {
            linear: ph::linear_sampler(device, "Present Sampler"),
            comparison: comparison_samplers
                .then(|| ph::comparison_sampler(device, "Shadow Sampler")),
        }
    }
}

/// Bind groups over one [`TextureSet`].
pub struct TextureBindings {
    /// Group 1 of the impostor programs; `None` without shadow support.
    pub shadow: Option<wgpu::BindGroup>,
    /// Shadow blur input/output; `None` without compute support.
    pub shadow_blur: Option<wgpu::BindGroup>,
    /// Upscale input/output; `None` without compute support or when render
    /// and output sizes match.
    pub upscale: Option<wgpu::BindGroup>,
    /// Present input.
    pub present: wgpu::BindGroup,
}

impl TextureBindings {
    /// Build every bind group `textures` supports. The impostors sample the
    /// blurred shadow map when the blur kernel can run, the raw one
    /// otherwise.
    pub fn new(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        samplers: &Samplers,
        textures: &TextureSet,
        compute: bool,
    ) -> Self {
        let image_pair = |label: &str,
                          layout: &wgpu::BindGroupLayout,
                          input: &wgpu::TextureView,
                          output: &wgpu::TextureView| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(input),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(output),
                    },
                ],
            })
        };

        let filtered_shadow = if compute {
            &textures.shadow_blurred.view
        } else {
            &textures.shadow_color.view
        };
        let shadow = samplers.comparison.as_ref().map(|comparison| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Shadow Bind Group"),
                layout: &layouts.shadow,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(
                            &textures.shadow_depth.view,
                        ),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(comparison),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(
                            filtered_shadow,
                        ),
                    },
                ],
            })
        });

        let shadow_blur = compute.then(|| {
            image_pair(
                "Shadow Blur Bind Group",
                &layouts.image_r32,
                &textures.shadow_color.view,
                &textures.shadow_blurred.view,
            )
        });
        let upscale = (compute && textures.is_upscaled()).then(|| {
            image_pair(
                "Upscale Bind Group",
                &layouts.image_rgba8,
                &textures.color.view,
                &textures.output.view,
            )
        });
        let present = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Present Bind Group"),
            layout: &layouts.present,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(
                        &textures.output.view,
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&samplers.linear),
                },
            ],
        });

        Self {
            shadow,
            shadow_blur,
            upscale,
            present,
        }
    }
}
