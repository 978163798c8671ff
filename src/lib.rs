//! # Shaderforge
//!
//! A shader/pipeline compilation service: give it a description of a
//! graphics, compute, or mesh pipeline (shader sources plus
//! fixed-function state) and it returns a ready-to-use pipeline object,
//! avoiding redundant compilation through a multi-tier cache and
//! cross-process recompilation through an on-disk bytecode tier.
//!
//! The native compiler, reflector, GPU-object factory and
//! source-language translator are external collaborators behind the
//! [`ShaderBackend`] and [`ShaderTranslator`] traits.
//!
//! ```rust,ignore
//! use shaderforge::{CompilerConfig, PipelineCompiler};
//!
//! let service = PipelineCompiler::new(CompilerConfig::default(), backend, translator);
//! let pipeline = service.get_graphics_pipeline(&description)?;
//! ```

pub mod backend;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod errors;
pub mod pipeline;
pub mod root_signature;
pub mod stats;
pub mod translate;

pub use backend::{PipelineStateObject, RootSignature, ShaderBackend, ShaderModel};
pub use compiler::{PipelineCompiler, WarmupProgress};
pub use config::CompilerConfig;
pub use engine::Job;
pub use errors::{ForgeError, Result};
pub use pipeline::{
    CompiledShaderSet, CompiledStage, FixedFunctionState, PipelineDescription, PipelineKind,
    ReflectionData, ResourceBinding, ShaderDefines, ShaderLanguage, ShaderSource, ShaderStage,
};
pub use root_signature::{BindingKind, BindingParameter, StageVisibility};
pub use stats::{CompilationStats, StatsSnapshot};
pub use translate::{
    inject_defines, MatrixConvention, ShaderTranslator, TranslationConfig, TranslationResult,
};
