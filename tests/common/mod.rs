//! Shared mock collaborators for the integration tests.
//!
//! `MockBackend` hands out sequential handles and counts every call so
//! tests can assert on compile counts and release balance; source text
//! containing `"INVALID"` fails native compilation. `MockTranslator`
//! prepends a marker line; source containing `"SYNTAX_ERROR"` is
//! rejected with diagnostics.

// Each integration target compiles its own copy of this module and uses
// a different subset of it.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use shaderforge::{
    BindingParameter, CompiledShaderSet, FixedFunctionState, PipelineStateObject, ReflectionData,
    ResourceBinding, RootSignature, ShaderBackend, ShaderStage, ShaderTranslator,
    TranslationConfig,
};

#[derive(Default)]
pub struct MockBackend {
    next_handle: AtomicU64,
    pub native_compiles: AtomicUsize,
    pub reflections: AtomicUsize,
    pub signatures_created: AtomicUsize,
    pub signatures_released: AtomicUsize,
    pub pipelines_realized: AtomicUsize,
    pub pipelines_released: AtomicUsize,
    pub mesh_support: bool,
    pub compile_delay: Duration,
    /// Reflection override per stage; defaults to one constant buffer at
    /// slot 0, space 0.
    reflection_plan: Mutex<FxHashMap<ShaderStage, ReflectionData>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            mesh_support: true,
            ..Self::default()
        }
    }

    pub fn without_mesh_support() -> Self {
        Self {
            mesh_support: false,
            ..Self::default()
        }
    }

    pub fn with_compile_delay(delay: Duration) -> Self {
        Self {
            compile_delay: delay,
            ..Self::new()
        }
    }

    pub fn set_reflection(&self, stage: ShaderStage, reflection: ReflectionData) {
        self.reflection_plan.lock().insert(stage, reflection);
    }

    fn fresh_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn native_compile_count(&self) -> usize {
        self.native_compiles.load(Ordering::Relaxed)
    }

    pub fn realized_count(&self) -> usize {
        self.pipelines_realized.load(Ordering::Relaxed)
    }

    pub fn released_count(&self) -> usize {
        self.pipelines_released.load(Ordering::Relaxed)
    }

    pub fn signature_count(&self) -> usize {
        self.signatures_created.load(Ordering::Relaxed)
    }
}

impl ShaderBackend for MockBackend {
    fn compile_native(
        &self,
        source: &str,
        entry_point: &str,
        profile: &str,
        _flags: u32,
    ) -> Result<Vec<u8>, String> {
        if !self.compile_delay.is_zero() {
            std::thread::sleep(self.compile_delay);
        }
        if source.contains("INVALID") {
            return Err(format!("error: unexpected token in '{entry_point}'"));
        }
        self.native_compiles.fetch_add(1, Ordering::Relaxed);
        // Deterministic bytecode so redundant compiles agree byte for byte.
        let mut bytecode = profile.as_bytes().to_vec();
        bytecode.push(0);
        bytecode.extend_from_slice(source.as_bytes());
        Ok(bytecode)
    }

    fn reflect(&self, _bytecode: &[u8], stage: ShaderStage) -> Result<ReflectionData, String> {
        self.reflections.fetch_add(1, Ordering::Relaxed);
        if let Some(reflection) = self.reflection_plan.lock().get(&stage) {
            return Ok(reflection.clone());
        }
        Ok(ReflectionData {
            constant_buffers: vec![ResourceBinding::new("globals", 0, 0)],
            ..ReflectionData::default()
        })
    }

    fn create_root_signature(&self, parameters: &[BindingParameter]) -> Result<u64, String> {
        if parameters.len() > 64 {
            return Err("too many root parameters".to_string());
        }
        self.signatures_created.fetch_add(1, Ordering::Relaxed);
        Ok(self.fresh_handle())
    }

    fn realize_graphics_pipeline(
        &self,
        _root_signature: &RootSignature,
        _shaders: &CompiledShaderSet,
        _state: &FixedFunctionState,
    ) -> Result<u64, String> {
        self.pipelines_realized.fetch_add(1, Ordering::Relaxed);
        Ok(self.fresh_handle())
    }

    fn realize_compute_pipeline(
        &self,
        _root_signature: &RootSignature,
        _shaders: &CompiledShaderSet,
    ) -> Result<u64, String> {
        self.pipelines_realized.fetch_add(1, Ordering::Relaxed);
        Ok(self.fresh_handle())
    }

    fn realize_mesh_pipeline(
        &self,
        _root_signature: &RootSignature,
        _shaders: &CompiledShaderSet,
        _state: &FixedFunctionState,
    ) -> Result<u64, String> {
        if !self.mesh_support {
            return Err("mesh pipelines unsupported".to_string());
        }
        self.pipelines_realized.fetch_add(1, Ordering::Relaxed);
        Ok(self.fresh_handle())
    }

    fn release_pipeline(&self, _pipeline: &PipelineStateObject) {
        self.pipelines_released.fetch_add(1, Ordering::Relaxed);
    }

    fn release_root_signature(&self, _signature: &RootSignature) {
        self.signatures_released.fetch_add(1, Ordering::Relaxed);
    }

    fn supports_mesh_shaders(&self) -> bool {
        self.mesh_support
    }
}

#[derive(Default)]
pub struct MockTranslator {
    pub translations: AtomicUsize,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translation_count(&self) -> usize {
        self.translations.load(Ordering::Relaxed)
    }
}

impl ShaderTranslator for MockTranslator {
    fn translate(
        &self,
        source: &str,
        stage: ShaderStage,
        _config: &TranslationConfig,
    ) -> Result<(String, Vec<String>), Vec<String>> {
        if source.contains("SYNTAX_ERROR") {
            return Err(vec![format!("{stage:?}: syntax error near 'SYNTAX_ERROR'")]);
        }
        self.translations.fetch_add(1, Ordering::Relaxed);
        let warnings = if source.contains("DEPRECATED") {
            vec!["deprecated intrinsic".to_string()]
        } else {
            Vec::new()
        };
        Ok((format!("// translated\n{source}"), warnings))
    }
}

// ─── Description helpers ──────────────────────────────────────────────────────

use shaderforge::{PipelineDescription, PipelineKind, ShaderDefines, ShaderLanguage, ShaderSource};

pub fn graphics_desc(vertex_src: &str, pixel_src: &str) -> PipelineDescription {
    PipelineDescription::new(PipelineKind::Graphics)
        .with_stage(ShaderSource::new(
            vertex_src,
            ShaderStage::Vertex,
            ShaderLanguage::Hlsl,
        ))
        .with_stage(ShaderSource::new(
            pixel_src,
            ShaderStage::Pixel,
            ShaderLanguage::Hlsl,
        ))
}

pub fn glsl_graphics_desc(vertex_src: &str, pixel_src: &str) -> PipelineDescription {
    PipelineDescription::new(PipelineKind::Graphics)
        .with_stage(ShaderSource::new(
            vertex_src,
            ShaderStage::Vertex,
            ShaderLanguage::Glsl,
        ))
        .with_stage(ShaderSource::new(
            pixel_src,
            ShaderStage::Pixel,
            ShaderLanguage::Glsl,
        ))
}

pub fn compute_desc(src: &str) -> PipelineDescription {
    PipelineDescription::new(PipelineKind::Compute).with_stage(ShaderSource::new(
        src,
        ShaderStage::Compute,
        ShaderLanguage::Hlsl,
    ))
}

pub fn quality_defines(level: &str) -> ShaderDefines {
    ShaderDefines::from(&[("QUALITY", level)][..])
}

/// Captures `log` output into the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Unique scratch directory for disk-cache tests.
pub fn scratch_dir(label: &str) -> std::path::PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "shaderforge-test-{label}-{}-{id}",
        std::process::id()
    ))
}
