//! GPU resource management.
//!
//! Device and surface initialization, capability queries, bind group
//! layouts, typed buffers and texture sets, readback, and shader
//! composition.

/// Typed device buffers and allocation checks.
pub mod buffer;
/// What the adapter supports, and the pass plan's view of it.
pub mod capabilities;
/// Bind group layouts and texture formats shared by every pipeline.
pub mod layouts;
/// Shared wgpu boilerplate for bind group entries and pipelines.
pub mod pipeline_helpers;
/// Copying a texture back to host memory.
pub mod readback;
/// wgpu device, surface, and queue initialization.
pub mod render_context;
/// Geometry buffers, the uniform ring and texture bind groups.
pub mod resources;
/// WGSL shader composition with `#import` support via naga-oil.
pub mod shader_composer;
/// Render targets and the per-viewport texture set.
pub mod texture;
/// Timestamp queries measuring each frame on the GPU.
pub mod timestamps;
