//! Which passes a frame runs, in order, and with which pipelines.

use std::fmt;

use crate::{
    gpu::capabilities::GpuCapabilities,
    pipeline::{defs, PipelineKey, Program, Specialization},
};

/// One step of a frame, in encode order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Per-atom colour fill kernel.
    FillColor,
    /// Depth-only billboards from the sun, ahead of the shadow map.
    ShadowPrePass,
    /// Shadow map depth from the sun.
    ShadowMap,
    /// Box blur over the shadow map.
    ShadowBlur,
    /// Depth-only billboards from the camera.
    DepthPrePass,
    /// Sphere impostors.
    Impostor,
    /// Cylinder impostors for bonds.
    Bonds,
    /// One point per atom.
    DebugPoints,
    /// Compute upscale of the colour target into the output.
    Upscale,
    /// Plain copy of the colour target into the output.
    Passthrough,
    /// Blit of the output onto the surface.
    Present,
    /// Copy of the output into a host-visible buffer.
    Readback,
}

impl PassKind {
    /// Debug label of the pass.
    pub const fn label(self) -> &'static str {
        match self {
            Self::FillColor => "Fill Color",
            Self::ShadowPrePass => "Shadow Pre-Pass",
            Self::ShadowMap => "Shadow Map",
            Self::ShadowBlur => "Shadow Blur",
            Self::DepthPrePass => "Depth Pre-Pass",
            Self::Impostor => "Impostor",
            Self::Bonds => "Bonds",
            Self::DebugPoints => "Debug Points",
            Self::Upscale => "Upscale",
            Self::Passthrough => "Passthrough",
            Self::Present => "Present",
            Self::Readback => "Readback",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Frame-level facts the plan depends on.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInputs {
    /// The scene requested a colour refill.
    pub fill_color: bool,
    /// Shadows are enabled in the scene.
    pub shadows: bool,
    /// Bonds are drawn: ball-and-stick mode with bond data.
    pub bonds: bool,
    /// Debug points were requested. Honoured in debug builds only.
    pub debug_points: bool,
    /// Render and output sizes differ.
    pub upscaled: bool,
    /// Photo frame: high-quality variants, readback instead of present.
    pub high_quality: bool,
}

/// The ordered pass list of one frame plus the pipeline variant of every
/// raster pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassPlan {
    passes: Vec<PassKind>,
    capabilities: GpuCapabilities,
    high_quality: bool,
}

impl PassPlan {
    /// Plan a frame for `capabilities`.
    ///
    /// Order: fill colour, shadow pre-pass and map, shadow blur, depth
    /// pre-pass, impostors and bonds, debug points, upscale or
    /// passthrough, then present or readback.
    #[must_use]
    pub fn new(capabilities: GpuCapabilities, inputs: FrameInputs) -> Self {
        let compute = capabilities.compute_shaders;
        let shadows = inputs.shadows && capabilities.comparison_samplers;
        let mut passes = Vec::with_capacity(12);

        // Without compute shaders the colours are filled on the host
        if inputs.fill_color && compute {
            passes.push(PassKind::FillColor);
        }
        if shadows {
            if capabilities.depth_pre_pass {
                passes.push(PassKind::ShadowPrePass);
            }
            passes.push(PassKind::ShadowMap);
            if compute {
                passes.push(PassKind::ShadowBlur);
            }
        }
        if capabilities.depth_pre_pass {
            passes.push(PassKind::DepthPrePass);
        }
        passes.push(PassKind::Impostor);
        if inputs.bonds {
            passes.push(PassKind::Bonds);
        }
        if inputs.debug_points && cfg!(debug_assertions) {
            passes.push(PassKind::DebugPoints);
        }
        passes.push(if inputs.upscaled && compute {
            PassKind::Upscale
        } else {
            PassKind::Passthrough
        });
        passes.push(if inputs.high_quality {
            PassKind::Readback
        } else {
            PassKind::Present
        });

        Self {
            passes,
            capabilities,
            high_quality: inputs.high_quality,
        }
    }

    /// Passes in encode order.
    pub fn passes(&self) -> &[PassKind] {
        &self.passes
    }

    /// Whether `pass` is part of this frame.
    pub fn contains(&self, pass: PassKind) -> bool {
        self.passes.contains(&pass)
    }

    /// Pipeline used by `pass`, or `None` for copies.
    pub fn pipeline_key(&self, pass: PassKind) -> Option<PipelineKey> {
        pipeline_key(pass, self.capabilities, self.high_quality)
    }

    /// Pipelines of every pass in the plan.
    pub fn pipeline_keys(&self) -> Vec<PipelineKey> {
        self.passes
            .iter()
            .filter_map(|&pass| self.pipeline_key(pass))
            .collect()
    }
}

/// Pipeline for `pass` on `capabilities`.
///
/// The main impostor and bond pipelines sample the shadow map whenever the
/// hardware supports it; switching shadows off at runtime only changes a
/// uniform, never the pipeline.
pub fn pipeline_key(
    pass: PassKind,
    capabilities: GpuCapabilities,
    high_quality: bool,
) -> Option<PipelineKey> {
    let pre_pass = capabilities.depth_pre_pass;
    let shaded = || {
        Specialization::new()
            .flag(defs::SHADOW_MAP, capabilities.comparison_samplers)
            .flag(defs::HIGH_QUALITY, high_quality)
    };
    let (program, spec) = match pass {
        PassKind::FillColor => (Program::FillColor, Specialization::new()),
        PassKind::ShadowPrePass => (
            Program::ShadowDepth,
            Specialization::new().flag(defs::DEPTH_ONLY, true),
        ),
        PassKind::ShadowMap => (
            Program::ShadowDepth,
            Specialization::new().flag(defs::DEPTH_PRE_PASS, pre_pass),
        ),
        PassKind::ShadowBlur => (Program::ShadowBlur, Specialization::new()),
        PassKind::DepthPrePass => (
            Program::SphereImpostor,
            Specialization::new().flag(defs::DEPTH_ONLY, true),
        ),
        PassKind::Impostor => (
            Program::SphereImpostor,
            shaded().flag(defs::DEPTH_PRE_PASS, pre_pass),
        ),
        PassKind::Bonds => (Program::BondImpostor, shaded()),
        PassKind::DebugPoints => (Program::DebugPoints, Specialization::new()),
        PassKind::Upscale => (Program::Upscale, Specialization::new()),
        PassKind::Present => (Program::Present, Specialization::new()),
        PassKind::Passthrough | PassKind::Readback => return None,
    };
    Some(PipelineKey::new(program, spec))
}

/// Every pipeline a renderer on `capabilities` may ask for, for pre-warm.
///
/// Covers both shadow states, bonds and upscaling. The high-quality
/// variants are compiled on the first capture.
pub fn prewarm_keys(capabilities: GpuCapabilities) -> Vec<PipelineKey> {
    let inputs = FrameInputs {
        fill_color: true,
        shadows: true,
        bonds: true,
        debug_points: true,
        upscaled: true,
        high_quality: false,
    };
    let mut keys = PassPlan::new(capabilities, inputs).pipeline_keys();
    keys.dedup();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn everything() -> FrameInputs {
        FrameInputs {
            fill_color: true,
            shadows: true,
            bonds: true,
            debug_points: false,
            upscaled: true,
            high_quality: false,
        }
    }

    #[test]
    fn full_hardware_runs_every_pass_in_order() {
        let plan = PassPlan::new(GpuCapabilities::full(), everything());
        assert_eq!(
            plan.passes(),
            [
                PassKind::FillColor,
                PassKind::ShadowPrePass,
                PassKind::ShadowMap,
                PassKind::ShadowBlur,
                PassKind::DepthPrePass,
                PassKind::Impostor,
                PassKind::Bonds,
                PassKind::Upscale,
                PassKind::Present,
            ]
        );
    }

    #[test]
    fn minimal_hardware_skips_optional_passes() {
        let plan = PassPlan::new(GpuCapabilities::minimal(), everything());
        assert_eq!(
            plan.passes(),
            [
                PassKind::Impostor,
                PassKind::Bonds,
                PassKind::Passthrough,
                PassKind::Present,
            ]
        );
    }

    #[test]
    fn shadows_off_drops_shadow_passes() {
        let inputs = FrameInputs {
            shadows: false,
            ..everything()
        };
        let plan = PassPlan::new(GpuCapabilities::full(), inputs);
        assert!(!plan.contains(PassKind::ShadowMap));
        assert!(!plan.contains(PassKind::ShadowPrePass));
        assert!(!plan.contains(PassKind::ShadowBlur));
        assert!(plan.contains(PassKind::DepthPrePass));
    }

    #[test]
    fn clean_colors_skip_fill() {
        let inputs = FrameInputs {
            fill_color: false,
            ..everything()
        };
        let plan = PassPlan::new(GpuCapabilities::full(), inputs);
        assert_eq!(plan.passes()[0], PassKind::ShadowPrePass);
    }

    #[test]
    fn photo_reads_back_instead_of_presenting() {
        let inputs = FrameInputs {
            high_quality: true,
            upscaled: false,
            ..everything()
        };
        let plan = PassPlan::new(GpuCapabilities::full(), inputs);
        assert_eq!(
            &plan.passes()[plan.passes().len() - 2..],
            [PassKind::Passthrough, PassKind::Readback]
        );
        let key = plan.pipeline_key(PassKind::Impostor).unwrap();
        assert!(key.specialization.is_set(defs::HIGH_QUALITY));
    }

    #[test]
    fn debug_points_only_in_debug_builds() {
        let inputs = FrameInputs {
            debug_points: true,
            ..everything()
        };
        let plan = PassPlan::new(GpuCapabilities::full(), inputs);
        assert_eq!(plan.contains(PassKind::DebugPoints), cfg!(debug_assertions));
    }

    #[test]
    fn main_pass_tests_against_pre_pass_depth() {
        let full = GpuCapabilities::full();
        let main = pipeline_key(PassKind::Impostor, full, false).unwrap();
        assert!(main.specialization.is_set(defs::DEPTH_PRE_PASS));
        assert!(main.specialization.is_set(defs::SHADOW_MAP));

        let pre = pipeline_key(PassKind::DepthPrePass, full, false).unwrap();
        assert_eq!(pre.name, main.name);
        assert!(pre.specialization.is_set(defs::DEPTH_ONLY));
        assert_ne!(pre, main);

        let discrete = GpuCapabilities {
            depth_pre_pass: false,
            ..full
        };
        let main = pipeline_key(PassKind::Impostor, discrete, false).unwrap();
        assert!(!main.specialization.is_set(defs::DEPTH_PRE_PASS));
    }

    #[test]
    fn copies_have_no_pipeline() {
        let full = GpuCapabilities::full();
        assert!(pipeline_key(PassKind::Passthrough, full, false).is_none());
        assert!(pipeline_key(PassKind::Readback, full, true).is_none());
    }

    #[test]
    fn prewarm_covers_every_distinct_pipeline() {
        let keys = prewarm_keys(GpuCapabilities::full());
        for (i, key) in keys.iter().enumerate() {
            assert!(!keys[i + 1..].contains(key), "{key} listed twice");
        }
        assert!(keys.iter().any(|k| k.name == "present"));
        assert!(keys.iter().any(|k| k.name == "bond_impostor"));
    }
}
