//! Pipeline compilation and caching.
//!
//! Pipelines are identified by a program name plus a [`Specialization`], a
//! small sorted map of shader defines. The [`PipelineCache`] memoizes
//! compiled pipelines per key behind one mutex; the [`PipelinePrewarmer`]
//! fills it from a background thread so the first frames do not stall on
//! shader compilation.

pub mod cache;
pub mod compiler;
pub mod prewarm;

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use naga_oil::compose::ShaderDefValue;

pub use self::cache::{PipelineCache, PipelineCompiler};
pub use self::compiler::{GpuPipeline, WgpuPipelineCompiler};
pub use self::prewarm::PipelinePrewarmer;

/// Shader defines understood by the bundled programs.
pub mod defs {
    /// Depth-only variant: no colour target, `fs_depth` entry point.
    pub const DEPTH_ONLY: &str = "DEPTH_ONLY";
    /// A depth pre-pass already filled the depth target: test with
    /// `LessEqual` and leave depth writes off.
    pub const DEPTH_PRE_PASS: &str = "DEPTH_PRE_PASS";
    /// Bind and sample the shadow map (group 1).
    pub const SHADOW_MAP: &str = "SHADOW_MAP";
    /// Photo-mode quality: wider shadow filter.
    pub const HIGH_QUALITY: &str = "HIGH_QUALITY";
}

// ---------------------------------------------------------------------------
// Specialization
// ---------------------------------------------------------------------------

/// Value of a single specialization constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecValue {
    /// Boolean flag; only `true` flags are passed to the shader as defines.
    Bool(bool),
    /// Signed integer define.
    Int(i32),
    /// Unsigned integer define.
    UInt(u32),
}

/// Structural set of shader defines. Two specializations are equal iff
/// they hold the same names with the same values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Specialization(BTreeMap<&'static str, SpecValue>);

impl Specialization {
    /// No defines.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a define.
    #[must_use]
    pub fn with(mut self, name: &'static str, value: SpecValue) -> Self {
        let _ = self.0.insert(name, value);
        self
    }

    /// Set a boolean flag.
    #[must_use]
    pub fn flag(self, name: &'static str, enabled: bool) -> Self {
        self.with(name, SpecValue::Bool(enabled))
    }

    /// Whether the boolean flag `name` is set to `true`.
    pub fn is_set(&self, name: &str) -> bool {
        matches!(self.0.get(name), Some(SpecValue::Bool(true)))
    }

    /// Value of `name`, if present.
    pub fn get(&self, name: &str) -> Option<SpecValue> {
        self.0.get(name).copied()
    }

    /// Defines in the form `naga_oil` expects. `false` flags are omitted so
    /// `#ifdef` sees them as undefined.
    pub fn shader_defs(&self) -> HashMap<String, ShaderDefValue> {
        self.0
            .iter()
            .filter_map(|(&name, &value)| {
                let value = match value {
                    SpecValue::Bool(false) => return None,
                    SpecValue::Bool(true) => ShaderDefValue::Bool(true),
                    SpecValue::Int(v) => ShaderDefValue::Int(v),
                    SpecValue::UInt(v) => ShaderDefValue::UInt(v),
                };
                Some((name.to_owned(), value))
            })
            .collect()
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            match value {
                SpecValue::Bool(v) => write!(f, "{name}={v}")?,
                SpecValue::Int(v) => write!(f, "{name}={v}")?,
                SpecValue::UInt(v) => write!(f, "{name}={v}u")?,
            }
        }
        Ok(())
    }
}

/// Cache key: program name plus specialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    /// Program name, see [`Program::name`].
    pub name: &'static str,
    /// Shader defines.
    pub specialization: Specialization,
}

impl PipelineKey {
    /// Key for `program` with `specialization`.
    #[must_use]
    pub fn new(program: Program, specialization: Specialization) -> Self {
        Self {
            name: program.name(),
            specialization,
        }
    }
}

impl fmt::Display for PipelineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.specialization)
    }
}

// ---------------------------------------------------------------------------
// Programs
// ---------------------------------------------------------------------------

/// Whether a program runs on the render or compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    /// Vertex + fragment.
    Render,
    /// Compute kernel with a `main` entry point.
    Compute,
}

/// The shader programs bundled with the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    /// Per-atom colour fill kernel.
    FillColor,
    /// Orthographic sphere depth from the sun (pre-pass and shadow map).
    ShadowDepth,
    /// Ray-cast sphere impostors (main pass and camera depth pre-pass).
    SphereImpostor,
    /// Ray-cast cylinder impostors for bonds.
    BondImpostor,
    /// Box blur over the shadow map.
    ShadowBlur,
    /// Bilinear spatial upscale of the colour target.
    Upscale,
    /// One point per atom; debug builds only.
    DebugPoints,
    /// Full-screen blit onto the surface.
    Present,
}

impl Program {
    /// Every program.
    pub const ALL: [Self; 8] = [
        Self::FillColor,
        Self::ShadowDepth,
        Self::SphereImpostor,
        Self::BondImpostor,
        Self::ShadowBlur,
        Self::Upscale,
        Self::DebugPoints,
        Self::Present,
    ];

    /// Stable name used in cache keys and labels.
    pub const fn name(self) -> &'static str {
        match self {
            Self::FillColor => "fill_color",
            Self::ShadowDepth => "shadow_depth",
            Self::SphereImpostor => "sphere_impostor",
            Self::BondImpostor => "bond_impostor",
            Self::ShadowBlur => "shadow_blur",
            Self::Upscale => "upscale",
            Self::DebugPoints => "debug_points",
            Self::Present => "present",
        }
    }

    /// Inverse of [`Program::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Render or compute.
    pub const fn kind(self) -> ProgramKind {
        match self {
            Self::FillColor | Self::ShadowBlur | Self::Upscale => {
                ProgramKind::Compute
            }
            _ => ProgramKind::Render,
        }
    }

    /// WGSL source and its path relative to `assets/shaders`.
    pub const fn source(self) -> (&'static str, &'static str) {
        match self {
            Self::FillColor => (
                include_str!("../../assets/shaders/compute/fill_color.wgsl"),
                "compute/fill_color.wgsl",
            ),
            Self::ShadowDepth => (
                include_str!("../../assets/shaders/raster/shadow_depth.wgsl"),
                "raster/shadow_depth.wgsl",
            ),
            Self::SphereImpostor => (
                include_str!("../../assets/shaders/raster/impostor_sphere.wgsl"),
                "raster/impostor_sphere.wgsl",
            ),
            Self::BondImpostor => (
                include_str!("../../assets/shaders/raster/impostor_bond.wgsl"),
                "raster/impostor_bond.wgsl",
            ),
            Self::ShadowBlur => (
                include_str!("../../assets/shaders/compute/shadow_blur.wgsl"),
                "compute/shadow_blur.wgsl",
            ),
            Self::Upscale => (
                include_str!("../../assets/shaders/compute/upscale.wgsl"),
                "compute/upscale.wgsl",
            ),
            Self::DebugPoints => (
                include_str!("../../assets/shaders/raster/debug_points.wgsl"),
                "raster/debug_points.wgsl",
            ),
            Self::Present => (
                include_str!("../../assets/shaders/screen/present.wgsl"),
                "screen/present.wgsl",
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from pipeline compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// No program is registered under this name.
    UnknownProgram(String),
    /// WGSL composition or validation failed.
    Compose {
        /// Program that failed.
        key: String,
        /// Composer diagnostic.
        message: String,
    },
    /// The device rejected the pipeline descriptor.
    Validation {
        /// Program that failed.
        key: String,
        /// Device error message.
        message: String,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProgram(name) => write!(f, "unknown program '{name}'"),
            Self::Compose { key, message } => {
                write!(f, "failed to compose {key}: {message}")
            }
            Self::Validation { key, message } => {
                write!(f, "pipeline {key} rejected by device: {message}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specialization_is_structural() {
        let a = Specialization::new()
            .flag(defs::SHADOW_MAP, true)
            .flag(defs::DEPTH_ONLY, false);
        let b = Specialization::new()
            .flag(defs::DEPTH_ONLY, false)
            .flag(defs::SHADOW_MAP, true);
        assert_eq!(a, b);
        assert_ne!(a, a.clone().flag(defs::DEPTH_ONLY, true));
    }

    #[test]
    fn false_flags_are_not_defined() {
        let spec = Specialization::new()
            .flag(defs::SHADOW_MAP, true)
            .flag(defs::HIGH_QUALITY, false)
            .with("TAPS", SpecValue::UInt(4));
        let shader_defs = spec.shader_defs();
        assert!(shader_defs.contains_key(defs::SHADOW_MAP));
        assert!(!shader_defs.contains_key(defs::HIGH_QUALITY));
        assert_eq!(shader_defs.get("TAPS"), Some(&ShaderDefValue::UInt(4)));
    }

    #[test]
    fn program_names_round_trip() {
        for program in Program::ALL {
            assert_eq!(Program::from_name(program.name()), Some(program));
        }
        assert_eq!(Program::from_name("nope"), None);
    }

    #[test]
    fn key_display_is_readable() {
        let key = PipelineKey::new(
            Program::SphereImpostor,
            Specialization::new().flag(defs::DEPTH_ONLY, true),
        );
        assert_eq!(key.to_string(), "sphere_impostor[DEPTH_ONLY=true]");
    }
}
