//! Crate-level error types.

use std::fmt;

use crate::{
    capture::CaptureError, geometry::GeometryError, gpu::buffer::ResourceError,
    gpu::render_context::RenderContextError, options::OptionsError,
    pipeline::PipelineError,
};

/// Errors produced by the spheron crate.
#[derive(Debug)]
pub enum SpheronError {
    /// GPU context initialization failure.
    Gpu(RenderContextError),
    /// The geometry snapshot failed validation.
    Geometry(GeometryError),
    /// A device buffer or texture could not be allocated.
    Resource(ResourceError),
    /// A pipeline failed to compose or compile.
    Pipeline(PipelineError),
    /// A high-quality capture failed.
    Capture(CaptureError),
    /// Generic I/O failure.
    Io(std::io::Error),
    /// Failed to spawn a background thread.
    ThreadSpawn(std::io::Error),
    /// Render options could not be loaded or saved.
    Options(OptionsError),
    /// Viewer event-loop failure.
    Viewer(String),
}

impl fmt::Display for SpheronError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
            Self::Geometry(e) => write!(f, "geometry error: {e}"),
            Self::Resource(e) => write!(f, "resource error: {e}"),
            Self::Pipeline(e) => write!(f, "pipeline error: {e}"),
            Self::Capture(e) => write!(f, "capture error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::ThreadSpawn(e) => {
                write!(f, "failed to spawn thread: {e}")
            }
            Self::Options(e) => write!(f, "options error: {e}"),
            Self::Viewer(msg) => write!(f, "viewer error: {msg}"),
        }
    }
}

impl std::error::Error for SpheronError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gpu(e) => Some(e),
            Self::Geometry(e) => Some(e),
            Self::Resource(e) => Some(e),
            Self::Pipeline(e) => Some(e),
            Self::Capture(e) => Some(e),
            Self::Options(e) => Some(e),
            Self::Io(e) | Self::ThreadSpawn(e) => Some(e),
            Self::Viewer(_) => None,
        }
    }
}

impl From<RenderContextError> for SpheronError {
    fn from(e: RenderContextError) -> Self {
        Self::Gpu(e)
    }
}

impl From<GeometryError> for SpheronError {
    fn from(e: GeometryError) -> Self {
        Self::Geometry(e)
    }
}

impl From<ResourceError> for SpheronError {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

impl From<PipelineError> for SpheronError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

impl From<CaptureError> for SpheronError {
    fn from(e: CaptureError) -> Self {
        Self::Capture(e)
    }
}

impl From<std::io::Error> for SpheronError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<OptionsError> for SpheronError {
    fn from(e: OptionsError) -> Self {
        Self::Options(e)
    }
}
