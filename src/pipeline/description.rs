//! Pipeline Descriptions
//!
//! Immutable value types describing what to compile: per-stage shader
//! sources, preprocessor defines, and the pipeline kind. Fixed-function
//! state lives in [`super::state`].
//!
//! A description is owned by the caller and read-only to the service;
//! hashing one is a pure, order-independent function of its fields
//! (see [`super::fingerprint`]).

use std::path::PathBuf;

/// One of the eight supported pipeline stages.
///
/// The discriminant doubles as the stable on-disk stage tag, so the order
/// of variants must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ShaderStage {
    Vertex = 0,
    /// Tessellation control.
    Hull = 1,
    /// Tessellation evaluation.
    Domain = 2,
    Geometry = 3,
    /// Fragment.
    Pixel = 4,
    Compute = 5,
    /// Task.
    Amplification = 6,
    Mesh = 7,
}

/// Number of pipeline stages a [`CompiledShaderSet`] can hold.
///
/// [`CompiledShaderSet`]: super::compiled::CompiledShaderSet
pub const STAGE_COUNT: usize = 8;

/// All stages, in tag order.
pub const ALL_STAGES: [ShaderStage; STAGE_COUNT] = [
    ShaderStage::Vertex,
    ShaderStage::Hull,
    ShaderStage::Domain,
    ShaderStage::Geometry,
    ShaderStage::Pixel,
    ShaderStage::Compute,
    ShaderStage::Amplification,
    ShaderStage::Mesh,
];

impl ShaderStage {
    /// Stable tag used in the disk-cache layout.
    #[inline]
    #[must_use]
    pub const fn tag(self) -> u32 {
        self as u32
    }

    /// Index into per-stage arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Reverse of [`ShaderStage::tag`].
    #[must_use]
    pub const fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Vertex),
            1 => Some(Self::Hull),
            2 => Some(Self::Domain),
            3 => Some(Self::Geometry),
            4 => Some(Self::Pixel),
            5 => Some(Self::Compute),
            6 => Some(Self::Amplification),
            7 => Some(Self::Mesh),
            _ => None,
        }
    }
}

/// Source language of a shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderLanguage {
    /// The native compilation target; compiled directly.
    Hlsl,
    /// Translated to HLSL before native compilation.
    Glsl,
}

/// The three pipeline families the service realizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Graphics,
    Compute,
    Mesh,
}

impl PipelineKind {
    /// Whether `stage` may appear in a description of this kind.
    #[must_use]
    pub fn allows_stage(self, stage: ShaderStage) -> bool {
        match self {
            Self::Graphics => matches!(
                stage,
                ShaderStage::Vertex
                    | ShaderStage::Hull
                    | ShaderStage::Domain
                    | ShaderStage::Geometry
                    | ShaderStage::Pixel
            ),
            Self::Compute => stage == ShaderStage::Compute,
            Self::Mesh => matches!(
                stage,
                ShaderStage::Amplification | ShaderStage::Mesh | ShaderStage::Pixel
            ),
        }
    }

    /// The stage every description of this kind must provide.
    #[must_use]
    pub const fn required_stage(self) -> ShaderStage {
        match self {
            Self::Graphics => ShaderStage::Vertex,
            Self::Compute => ShaderStage::Compute,
            Self::Mesh => ShaderStage::Mesh,
        }
    }
}

// ─── Shader Defines ───────────────────────────────────────────────────────────

/// A collection of preprocessor macro definitions.
///
/// Internally an ordered `Vec<(String, String)>` sorted by key, ensuring
/// that identical macro sets always produce identical hash values
/// regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShaderDefines {
    defines: Vec<(String, String)>,
}

impl ShaderDefines {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            defines: Vec::new(),
        }
    }

    /// Set a define (maintains sorted order).
    ///
    /// If the key exists, updates its value; otherwise inserts a new entry.
    pub fn set(&mut self, key: &str, value: &str) {
        match self
            .defines
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
        {
            Ok(idx) => self.defines[idx].1 = value.to_string(),
            Err(idx) => self
                .defines
                .insert(idx, (key.to_string(), value.to_string())),
        }
    }

    /// Remove a define. Returns `true` if it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        if let Ok(idx) = self
            .defines
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
        {
            self.defines.remove(idx);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.defines
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|idx| self.defines[idx].1.as_str())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.defines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    /// Iterates `(key, value)` pairs in sorted key order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defines.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<&[(&str, &str)]> for ShaderDefines {
    fn from(defines: &[(&str, &str)]) -> Self {
        let mut result = Self::new();
        for (k, v) in defines {
            result.set(k, v);
        }
        result
    }
}

// ─── Shader Source ────────────────────────────────────────────────────────────

/// One stage's source text plus its language and optional file origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderSource {
    pub text: String,
    pub stage: ShaderStage,
    pub language: ShaderLanguage,
    /// Originating path, used for include resolution and diagnostics.
    pub origin: Option<PathBuf>,
}

impl ShaderSource {
    #[must_use]
    pub fn new(text: impl Into<String>, stage: ShaderStage, language: ShaderLanguage) -> Self {
        Self {
            text: text.into(),
            stage,
            language,
            origin: None,
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

// ─── Pipeline Description ─────────────────────────────────────────────────────

/// Immutable description of a graphics, compute, or mesh pipeline.
///
/// Built once by the caller, then handed to the service read-only. Stages
/// not applicable to the kind are rejected by [`PipelineDescription::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDescription {
    pub kind: PipelineKind,
    stages: [Option<ShaderSource>; STAGE_COUNT],
    pub fixed_function: super::state::FixedFunctionState,
    pub defines: ShaderDefines,
}

impl PipelineDescription {
    #[must_use]
    pub fn new(kind: PipelineKind) -> Self {
        Self {
            kind,
            stages: Default::default(),
            fixed_function: super::state::FixedFunctionState::default(),
            defines: ShaderDefines::new(),
        }
    }

    /// Attach a stage source. Replaces any previous source for that stage.
    #[must_use]
    pub fn with_stage(mut self, source: ShaderSource) -> Self {
        let index = source.stage.index();
        self.stages[index] = Some(source);
        self
    }

    #[must_use]
    pub fn with_defines(mut self, defines: ShaderDefines) -> Self {
        self.defines = defines;
        self
    }

    #[must_use]
    pub fn with_fixed_function(mut self, state: super::state::FixedFunctionState) -> Self {
        self.fixed_function = state;
        self
    }

    #[inline]
    #[must_use]
    pub fn stage(&self, stage: ShaderStage) -> Option<&ShaderSource> {
        self.stages[stage.index()].as_ref()
    }

    /// Iterates the present stages in tag order.
    pub fn present_stages(&self) -> impl Iterator<Item = &ShaderSource> {
        self.stages.iter().filter_map(Option::as_ref)
    }

    /// Checks stage presence against the pipeline kind.
    ///
    /// Returns the offending detail on failure; the orchestrator maps this
    /// to [`crate::ForgeError::UnsupportedFeature`].
    pub fn validate(&self) -> std::result::Result<(), String> {
        let required = self.kind.required_stage();
        if self.stage(required).is_none() {
            return Err(format!(
                "{:?} pipeline is missing its {required:?} stage",
                self.kind
            ));
        }
        for source in self.present_stages() {
            if !self.kind.allows_stage(source.stage) {
                return Err(format!(
                    "{:?} stage is not valid in a {:?} pipeline",
                    source.stage, self.kind
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_set_and_get() {
        let mut defines = ShaderDefines::new();
        defines.set("USE_MAP", "1");
        defines.set("MAX_LIGHTS", "8");

        assert!(defines.contains("USE_MAP"));
        assert_eq!(defines.get("MAX_LIGHTS"), Some("8"));
        assert!(!defines.contains("USE_AO_MAP"));
    }

    #[test]
    fn defines_sorted_regardless_of_insertion_order() {
        let mut defines = ShaderDefines::new();
        defines.set("B", "1");
        defines.set("A", "1");
        defines.set("C", "1");

        let keys: Vec<_> = defines.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["A", "B", "C"]);
    }

    #[test]
    fn defines_set_overwrites() {
        let mut defines = ShaderDefines::new();
        defines.set("QUALITY", "1");
        defines.set("QUALITY", "2");
        assert_eq!(defines.get("QUALITY"), Some("2"));
        assert_eq!(defines.len(), 1);
    }

    #[test]
    fn stage_tag_round_trip() {
        for stage in ALL_STAGES {
            assert_eq!(ShaderStage::from_tag(stage.tag()), Some(stage));
        }
        assert_eq!(ShaderStage::from_tag(8), None);
    }

    #[test]
    fn kind_stage_predicates() {
        assert!(PipelineKind::Graphics.allows_stage(ShaderStage::Pixel));
        assert!(!PipelineKind::Graphics.allows_stage(ShaderStage::Mesh));
        assert!(PipelineKind::Compute.allows_stage(ShaderStage::Compute));
        assert!(!PipelineKind::Compute.allows_stage(ShaderStage::Vertex));
        assert!(PipelineKind::Mesh.allows_stage(ShaderStage::Amplification));
    }

    #[test]
    fn validate_rejects_missing_required_stage() {
        let desc = PipelineDescription::new(PipelineKind::Graphics);
        assert!(desc.validate().is_err());
    }

    #[test]
    fn validate_rejects_foreign_stage() {
        let desc = PipelineDescription::new(PipelineKind::Compute)
            .with_stage(ShaderSource::new(
                "[numthreads(8,8,1)] void main() {}",
                ShaderStage::Compute,
                ShaderLanguage::Hlsl,
            ))
            .with_stage(ShaderSource::new(
                "void main() {}",
                ShaderStage::Pixel,
                ShaderLanguage::Hlsl,
            ));
        assert!(desc.validate().is_err());
    }
}
