//! Backend Factory Interface
//!
//! The native compiler, reflector and GPU-object factory are external
//! collaborators consumed through the [`ShaderBackend`] trait. The service
//! never interprets bytecode or GPU handles itself; it only moves them
//! between tiers and hands them back to the backend for realization and
//! release.
//!
//! Collaborator methods return `Result<_, String>` where the `String` is
//! the backend's diagnostic log; the orchestrator wraps those into typed
//! [`ForgeError`](crate::ForgeError) variants with stage context attached.

use crate::pipeline::{FixedFunctionState, PipelineKind, ReflectionData, ShaderStage};
use crate::root_signature::BindingParameter;

// ─── Shader Model / Profiles ──────────────────────────────────────────────────

/// Target shading model for native compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderModel {
    pub major: u8,
    pub minor: u8,
}

impl Default for ShaderModel {
    fn default() -> Self {
        Self { major: 6, minor: 6 }
    }
}

impl ShaderModel {
    /// Mesh/amplification profiles first appeared in this model.
    const MESH_MIN: ShaderModel = ShaderModel { major: 6, minor: 5 };

    /// Maps `(stage, model)` to the native compiler's profile token,
    /// e.g. `Vertex` at SM 6.6 → `"vs_6_6"`.
    ///
    /// Total over the stage enumeration; stages the model cannot express
    /// yield the offending combination as an error string.
    pub fn profile(self, stage: ShaderStage) -> Result<String, String> {
        let prefix = match stage {
            ShaderStage::Vertex => "vs",
            ShaderStage::Hull => "hs",
            ShaderStage::Domain => "ds",
            ShaderStage::Geometry => "gs",
            ShaderStage::Pixel => "ps",
            ShaderStage::Compute => "cs",
            ShaderStage::Amplification | ShaderStage::Mesh => {
                if (self.major, self.minor) < (Self::MESH_MIN.major, Self::MESH_MIN.minor) {
                    return Err(format!(
                        "{stage:?} stage requires shader model 6.5+, target is {}.{}",
                        self.major, self.minor
                    ));
                }
                if stage == ShaderStage::Mesh {
                    "ms"
                } else {
                    "as"
                }
            }
        };
        Ok(format!("{prefix}_{}_{}", self.major, self.minor))
    }
}

// ─── Opaque Backend Objects ───────────────────────────────────────────────────

/// Backend-realized resource-binding layout.
///
/// Two pipelines with identical merged bindings share one instance via the
/// root-signature cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootSignature {
    /// Opaque backend handle.
    pub raw: u64,
    /// Fingerprint of the merged binding parameters this was created for.
    pub fingerprint: u64,
}

/// Backend-realized, immediately bindable pipeline object.
///
/// Owned by the pipeline-state cache; the backend is asked to release it
/// exactly once, on eviction or service teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineStateObject {
    /// Opaque backend handle.
    pub raw: u64,
    pub kind: PipelineKind,
    /// Pipeline fingerprint this object was realized for.
    pub fingerprint: u64,
}

// ─── Backend Trait ────────────────────────────────────────────────────────────

/// Native compiler / reflector / GPU-object factory.
///
/// Implementations must be safe to call from the async engine's worker
/// threads concurrently with the calling thread.
pub trait ShaderBackend: Send + Sync {
    /// Compiles (already translated) HLSL source to native bytecode.
    /// `Err` carries the compiler's diagnostic log.
    fn compile_native(
        &self,
        source: &str,
        entry_point: &str,
        profile: &str,
        flags: u32,
    ) -> Result<Vec<u8>, String>;

    /// Extracts resource-binding metadata from compiled bytecode.
    fn reflect(&self, bytecode: &[u8], stage: ShaderStage) -> Result<ReflectionData, String>;

    /// Realizes a binding layout from merged parameters. `Err` indicates
    /// conflicting slot/space assignments the backend refused.
    fn create_root_signature(&self, parameters: &[BindingParameter]) -> Result<u64, String>;

    fn realize_graphics_pipeline(
        &self,
        root_signature: &RootSignature,
        shaders: &crate::pipeline::CompiledShaderSet,
        state: &FixedFunctionState,
    ) -> Result<u64, String>;

    fn realize_compute_pipeline(
        &self,
        root_signature: &RootSignature,
        shaders: &crate::pipeline::CompiledShaderSet,
    ) -> Result<u64, String>;

    fn realize_mesh_pipeline(
        &self,
        root_signature: &RootSignature,
        shaders: &crate::pipeline::CompiledShaderSet,
        state: &FixedFunctionState,
    ) -> Result<u64, String>;

    /// Releases a realized pipeline object. Called exactly once per object.
    fn release_pipeline(&self, pipeline: &PipelineStateObject);

    /// Releases a realized root signature.
    fn release_root_signature(&self, signature: &RootSignature);

    /// Whether mesh/amplification pipelines can be realized at all.
    fn supports_mesh_shaders(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_tokens_cover_classic_stages() {
        let sm = ShaderModel::default();
        assert_eq!(sm.profile(ShaderStage::Vertex).unwrap(), "vs_6_6");
        assert_eq!(sm.profile(ShaderStage::Pixel).unwrap(), "ps_6_6");
        assert_eq!(sm.profile(ShaderStage::Compute).unwrap(), "cs_6_6");
        assert_eq!(sm.profile(ShaderStage::Hull).unwrap(), "hs_6_6");
        assert_eq!(sm.profile(ShaderStage::Domain).unwrap(), "ds_6_6");
        assert_eq!(sm.profile(ShaderStage::Geometry).unwrap(), "gs_6_6");
    }

    #[test]
    fn mesh_profiles_require_sm_6_5() {
        let old = ShaderModel { major: 6, minor: 0 };
        assert!(old.profile(ShaderStage::Mesh).is_err());
        assert!(old.profile(ShaderStage::Amplification).is_err());

        let new = ShaderModel { major: 6, minor: 5 };
        assert_eq!(new.profile(ShaderStage::Mesh).unwrap(), "ms_6_5");
        assert_eq!(new.profile(ShaderStage::Amplification).unwrap(), "as_6_5");
    }
}
