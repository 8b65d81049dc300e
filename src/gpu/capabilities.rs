//! Hardware capability flags, queried once when the device is created.

/// What the adapter supports, reduced to the decisions the renderer makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuCapabilities {
    /// Integrated or tile-based GPU that profits from a depth pre-pass.
    pub depth_pre_pass: bool,
    /// Depth comparison samplers, required for shadow mapping.
    pub comparison_samplers: bool,
    /// Compute shaders, required for colour fill, shadow blur and upscale.
    pub compute_shaders: bool,
    /// Timestamp queries on compute passes, used to time frames on the GPU.
    pub timestamp_queries: bool,
    /// Largest buffer the device accepts, in bytes.
    pub max_buffer_size: u64,
    /// Largest 2D texture edge, in texels.
    pub max_texture_dimension: u32,
}

impl GpuCapabilities {
    /// Optional features to request from the adapter.
    pub fn required_features(adapter: &wgpu::Adapter) -> wgpu::Features {
        adapter.features() & wgpu::Features::TIMESTAMP_QUERY
    }

    /// Derive capabilities from an adapter.
    pub fn query(adapter: &wgpu::Adapter) -> Self {
        let info = adapter.get_info();
        let downlevel = adapter.get_downlevel_capabilities().flags;
        let limits = adapter.limits();
        let compute_shaders =
            downlevel.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS);
        Self {
            depth_pre_pass: info.device_type == wgpu::DeviceType::IntegratedGpu
                || info.backend == wgpu::Backend::Metal,
            comparison_samplers: downlevel
                .contains(wgpu::DownlevelFlags::COMPARISON_SAMPLERS),
            compute_shaders,
            timestamp_queries: compute_shaders
                && adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY),
            max_buffer_size: limits.max_buffer_size,
            max_texture_dimension: limits.max_texture_dimension_2d,
        }
    }

    /// Everything supported, with WebGPU default limits.
    #[must_use]
    pub fn full() -> Self {
        let limits = wgpu::Limits::default();
        Self {
            depth_pre_pass: true,
            comparison_samplers: true,
            compute_shaders: true,
            timestamp_queries: true,
            max_buffer_size: limits.max_buffer_size,
            max_texture_dimension: limits.max_texture_dimension_2d,
        }
    }

    /// Nothing optional supported, with downlevel limits.
    #[must_use]
    pub fn minimal() -> Self {
        let limits = wgpu::Limits::downlevel_webgl2_defaults();
        Self {
            depth_pre_pass: false,
            comparison_samplers: false,
            compute_shaders: false,
            timestamp_queries: false,
            max_buffer_size: limits.max_buffer_size,
            max_texture_dimension: limits.max_texture_dimension_2d,
        }
    }
}
