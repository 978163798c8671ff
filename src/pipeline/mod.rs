//! Pipeline Value Types
//!
//! Descriptions, fixed-function state, fingerprinting, and compiled
//! artifacts. Everything here is a plain value; orchestration lives in
//! [`crate::compiler`].

pub mod compiled;
pub mod description;
pub mod fingerprint;
pub mod state;

pub use compiled::{
    CompiledShaderSet, CompiledStage, ReflectionData, ResourceBinding, DISK_FORMAT_VERSION,
    DISK_MAGIC,
};
pub use description::{
    PipelineDescription, PipelineKind, ShaderDefines, ShaderLanguage, ShaderSource, ShaderStage,
    ALL_STAGES, STAGE_COUNT,
};
pub use fingerprint::{pipeline_fingerprint, translation_fingerprint, FingerprintBuilder};
pub use state::{
    BlendComponent, BlendFactor, BlendOperation, BlendState, CompareFunction, CullMode,
    DepthStencilState, FillMode, FixedFunctionState, FrontFace, RasterizerState, StencilFaceState,
    StencilOperation, TextureFormat, VertexAttribute, VertexFormat,
};
