use std::{borrow::Cow, collections::HashMap};

use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, ComposerError, NagaModuleDescriptor,
    ShaderDefValue, ShaderLanguage, ShaderType,
};

use crate::pipeline::PipelineError;

/// Wraps `naga_oil::compose::Composer` to provide shader composition with
/// `#import` and `#ifdef` support.
///
/// The shared modules are registered once at construction. Programs import
/// them as `spheron::frame`, `spheron::impostor` and `spheron::shadow`; the
/// composer hands `naga::Module` IR straight to wgpu.
pub struct ShaderComposer {
    composer: Composer,
}

/// Shared modules in dependency order: (source, file_path).
const MODULES: [(&str, &str); 3] = [
    (
        include_str!("../../assets/shaders/modules/frame.wgsl"),
        "modules/frame.wgsl",
    ),
    (
        include_str!("../../assets/shaders/modules/impostor.wgsl"),
        "modules/impostor.wgsl",
    ),
    (
        include_str!("../../assets/shaders/modules/shadow.wgsl"),
        "modules/shadow.wgsl",
    ),
];

impl ShaderComposer {
    /// Composer with the shared modules registered.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Compose`] if a shared module fails to parse.
    pub fn new() -> Result<Self, PipelineError> {
        let mut composer = Composer::default();
        for (source, file_path) in MODULES {
            let _ = composer
                .add_composable_module(ComposableModuleDescriptor {
                    source,
                    file_path,
                    language: ShaderLanguage::Wgsl,
                    ..Default::default()
                })
                .map_err(|e| compose_error(file_path, &e))?;
        }
        Ok(Self { composer })
    }

    /// Compose `source` with `shader_defs` into a `wgpu::ShaderModule`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Compose`] if composition fails.
    pub fn compose(
        &mut self,
        device: &wgpu::Device,
        label: &str,
        source: &str,
        file_path: &str,
        shader_defs: HashMap<String, ShaderDefValue>,
    ) -> Result<wgpu::ShaderModule, PipelineError> {
        let module = self
            .compose_naga(source, file_path, shader_defs)
            .map_err(|e| compose_error(file_path, &e))?;
        Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Naga(Cow::Owned(module)),
        }))
    }

    /// Compose into a `naga::Module` without a device. Used by tests to
    /// validate every program.
    ///
    /// # Errors
    ///
    /// Returns the composer's error unchanged.
    pub fn compose_naga(
        &mut self,
        source: &str,
        file_path: &str,
        shader_defs: HashMap<String, ShaderDefValue>,
    ) -> Result<naga::Module, Box<ComposerError>> {
        self.composer
            .make_naga_module(NagaModuleDescriptor {
                source,
                file_path,
                shader_type: ShaderType::Wgsl,
                shader_defs,
                ..Default::default()
            })
            .map_err(Box::new)
    }
}

fn compose_error(file_path: &str, error: &ComposerError) -> PipelineError {
    PipelineError::Compose {
        key: file_path.to_owned(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{defs, Program, Specialization};

    fn validate(module: &naga::Module) -> Result<(), String> {
        let _ = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(module)
        .map_err(|e| format!("{e:?}"))?;
        Ok(())
    }

    #[test]
    fn all_programs_compose_without_defines() {
        let mut composer = ShaderComposer::new().unwrap();
        for program in Program::ALL {
            let (source, path) = program.source();
            let module = composer
                .compose_naga(source, path, HashMap::new())
                .unwrap_or_else(|e| panic!("'{path}' failed to compose: {e}"));
            validate(&module).unwrap_or_else(|e| panic!("'{path}' invalid: {e}"));
        }
    }

    #[test]
    fn all_programs_compose_with_every_define() {
        let spec = Specialization::new()
            .flag(defs::SHADOW_MAP, true)
            .flag(defs::HIGH_QUALITY, true)
            .flag(defs::DEPTH_PRE_PASS, true);
        let mut composer = ShaderComposer::new().unwrap();
        for program in Program::ALL {
            let (source, path) = program.source();
            let module = composer
                .compose_naga(source, path, spec.shader_defs())
                .unwrap_or_else(|e| panic!("'{path}' failed to compose: {e}"));
            validate(&module).unwrap_or_else(|e| panic!("'{path}' invalid: {e}"));
        }
    }
}
