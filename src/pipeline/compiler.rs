//! [`PipelineCompiler`] over a `wgpu::Device`.

use std::sync::{Arc, Mutex, PoisonError};

use super::{
    defs, PipelineCompiler, PipelineError, PipelineKey, Program, ProgramKind,
    Specialization,
};
use crate::{
    geometry::bonds::BondVertex,
    gpu::{
        layouts::{BindGroupLayouts, COLOR_FORMAT, SHADOW_FORMAT},
        pipeline_helpers as ph,
        shader_composer::ShaderComposer,
    },
};

/// A compiled render or compute pipeline.
#[derive(Debug)]
pub enum GpuPipeline {
    /// Vertex + fragment pipeline.
    Render(wgpu::RenderPipeline),
    /// Compute pipeline.
    Compute(wgpu::ComputePipeline),
}

impl GpuPipeline {
    /// The render pipeline, if this is one.
    pub fn render(&self) -> Option<&wgpu::RenderPipeline> {
        match self {
            Self::Render(p) => Some(p),
            Self::Compute(_) => None,
        }
    }

    /// The compute pipeline, if this is one.
    pub fn compute(&self) -> Option<&wgpu::ComputePipeline> {
        match self {
            Self::Compute(p) => Some(p),
            Self::Render(_) => None,
        }
    }
}

const OFFSET_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![0 => Float32x2];
const CENTER_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![1 => Float32x3];
const MAPPING_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![2 => Float32x2];
const RADIUS_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![3 => Float32];
const BOND_ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Uint32,
    2 => Float32x3,
    3 => Uint32,
    4 => Float32x2,
];
const POINT_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![0 => Float32x3];

fn vertex_layout(
    stride: usize,
    attributes: &'static [wgpu::VertexAttribute],
) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: stride as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

/// The four parallel billboard buffers, slots 0 to 3.
fn billboard_layouts() -> [wgpu::VertexBufferLayout<'static>; 4] {
    [
        vertex_layout(8, &OFFSET_ATTRIBUTES),
        vertex_layout(12, &CENTER_ATTRIBUTES),
        vertex_layout(8, &MAPPING_ATTRIBUTES),
        vertex_layout(4, &RADIUS_ATTRIBUTES),
    ]
}

/// Compiles the bundled programs against the shared bind group layouts.
///
/// Every compile runs inside a validation error scope, so a rejected
/// descriptor comes back as [`PipelineError::Validation`] instead of an
/// uncaptured device error.
pub struct WgpuPipelineCompiler {
    device: wgpu::Device,
    layouts: Arc<BindGroupLayouts>,
    surface_format: wgpu::TextureFormat,
    composer: Mutex<ShaderComposer>,
}

impl WgpuPipelineCompiler {
    /// Compiler for `device`, presenting to `surface_format`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Compose`] if the shared shader modules fail
    /// to register.
    pub fn new(
        device: wgpu::Device,
        layouts: Arc<BindGroupLayouts>,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            device,
            layouts,
            surface_format,
            composer: Mutex::new(ShaderComposer::new()?),
        })
    }

    fn pipeline_layout(
        &self,
        label: &str,
        groups: &[&wgpu::BindGroupLayout],
    ) -> wgpu::PipelineLayout {
        self.device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{label} Layout")),
                bind_group_layouts: groups,
                push_constant_ranges: &[],
            })
    }

    fn compute(
        &self,
        label: &str,
        module: &wgpu::ShaderModule,
        group: &wgpu::BindGroupLayout,
    ) -> GpuPipeline {
        let layout = self.pipeline_layout(label, &[group]);
        GpuPipeline::Compute(self.device.create_compute_pipeline(
            &wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            },
        ))
    }

    /// Raster pipeline for the billboard, bond and point programs.
    fn raster(
        &self,
        program: Program,
        label: &str,
        module: &wgpu::ShaderModule,
        spec: &Specialization,
    ) -> GpuPipeline {
        let layouts = &self.layouts;
        let depth_only = spec.is_set(defs::DEPTH_ONLY);
        let after_pre_pass = spec.is_set(defs::DEPTH_PRE_PASS);

        let mut groups = vec![&layouts.frame];
        if spec.is_set(defs::SHADOW_MAP)
            && matches!(program, Program::SphereImpostor | Program::BondImpostor)
        {
            groups.push(&layouts.shadow);
        }
        let layout = self.pipeline_layout(label, &groups);

        let billboards = billboard_layouts();
        let bonds = [vertex_layout(
            size_of::<BondVertex>(),
            &BOND_ATTRIBUTES,
        )];
        // Every fourth billboard centre: one point per atom
        let points = [vertex_layout(48, &POINT_ATTRIBUTES)];
        let buffers: &[wgpu::VertexBufferLayout<'_>] = match program {
            Program::BondImpostor => &bonds,
            Program::DebugPoints => &points,
            _ => &billboards,
        };
        let topology = if program == Program::DebugPoints {
            wgpu::PrimitiveTopology::PointList
        } else {
            wgpu::PrimitiveTopology::TriangleList
        };

        let color_format = match program {
            Program::ShadowDepth => SHADOW_FORMAT,
            _ => COLOR_FORMAT,
        };
        let color_targets = [Some(wgpu::ColorTargetState {
            format: color_format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let targets: &[Option<wgpu::ColorTargetState>] =
            if depth_only { &[] } else { &color_targets };
        let entry_point = if depth_only { "fs_depth" } else { "fs_main" };

        let depth_stencil = match program {
            Program::DebugPoints => wgpu::DepthStencilState {
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                ..ph::depth_stencil_state(false)
            },
            // Bonds are not part of the pre-pass and write their own depth
            Program::BondImpostor => ph::depth_stencil_state(false),
            _ => ph::depth_stencil_state(after_pre_pass && !depth_only),
        };

        GpuPipeline::Render(self.device.create_render_pipeline(
            &wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(entry_point),
                    targets,
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(depth_stencil),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            },
        ))
    }
}

impl PipelineCompiler for WgpuPipelineCompiler {
    type Pipeline = GpuPipeline;

    fn compile(&self, key: &PipelineKey) -> Result<GpuPipeline, PipelineError> {
        let program = Program::from_name(key.name)
            .ok_or_else(|| PipelineError::UnknownProgram(key.name.to_owned()))?;
        let (source, path) = program.source();
        let label = key.to_string();
        let spec = &key.specialization;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let compiled = self
            .composer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .compose(&self.device, &label, source, path, spec.shader_defs())
            .map(|module| {
                let layouts = &self.layouts;
                match (program, program.kind()) {
                    (Program::FillColor, _) => {
                        self.compute(&label, &module, &layouts.fill_color)
                    }
                    (Program::ShadowBlur, _) => {
                        self.compute(&label, &module, &layouts.image_r32)
                    }
                    (_, ProgramKind::Compute) => {
                        self.compute(&label, &module, &layouts.image_rgba8)
                    }
                    (Program::Present, _) => {
                        GpuPipeline::Render(ph::create_screen_space_pipeline(
                            &self.device,
                            &label,
                            &module,
                            self.surface_format,
                            &[&layouts.present],
                        ))
                    }
                    (_, ProgramKind::Render) => {
                        self.raster(program, &label, &module, spec)
                    }
                }
            });
        let scope = pollster::block_on(self.device.pop_error_scope());

        let pipeline = compiled?;
        if let Some(error) = scope {
            return Err(PipelineError::Validation {
                key: label,
                message: error.to_string(),
            });
        }
        Ok(pipeline)
    }
}
