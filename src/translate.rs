//! Source-Language Translation
//!
//! Shaders authored in a non-native language (GLSL) are translated to the
//! native compilation target (HLSL) by an external collaborator behind the
//! [`ShaderTranslator`] trait. Translation is a pure function of
//! `(source, config)`; results are memoized by the orchestrator in the
//! translation tier, keyed by
//! [`translation_fingerprint`](crate::pipeline::translation_fingerprint).
//!
//! Preprocessor defines are injected textually before translation (or
//! before native compilation, for sources that skip translation):
//! immediately after any leading `#version` / `#pragma` header lines, or
//! at the top of the source if none exist.

use std::time::Duration;

use crate::pipeline::{ShaderDefines, ShaderStage};

/// Matrix memory-order convention the translator should emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatrixConvention {
    #[default]
    ColumnMajor,
    RowMajor,
}

/// Translator configuration, fixed per service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationConfig {
    /// Target language version string handed to the translator.
    pub target_version: String,
    pub matrix_convention: MatrixConvention,
    /// Treat translator warnings as errors.
    pub strict: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_version: "2021".to_string(),
            matrix_convention: MatrixConvention::default(),
            strict: false,
        }
    }
}

/// A successful translation: the translated source plus any non-fatal
/// warnings and the time the translator took.
#[derive(Debug, Clone)]
pub struct TranslationResult {
    pub text: String,
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

/// External source-to-source translator.
///
/// `Err` carries the collected diagnostics of a rejected input; the
/// orchestrator wraps them into
/// [`ForgeError::TranslationFailure`](crate::ForgeError::TranslationFailure).
pub trait ShaderTranslator: Send + Sync {
    fn translate(
        &self,
        source: &str,
        stage: ShaderStage,
        config: &TranslationConfig,
    ) -> Result<(String, Vec<String>), Vec<String>>;
}

/// Injects `#define KEY VALUE` lines into `source`.
///
/// The defines land after the leading run of `#version` / `#pragma`
/// lines, or at the very top when the source has no such header. Sources
/// with no defines are returned unchanged.
#[must_use]
pub fn inject_defines(source: &str, defines: &ShaderDefines) -> String {
    if defines.is_empty() {
        return source.to_string();
    }

    let mut block = String::new();
    for (key, value) in defines.iter() {
        block.push_str("#define ");
        block.push_str(key);
        block.push(' ');
        block.push_str(value);
        block.push('\n');
    }

    // Byte offset just past the leading header lines.
    let mut insert_at = 0;
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#version") || trimmed.starts_with("#pragma") {
            insert_at += line.len();
        } else {
            break;
        }
    }

    let mut out = String::with_capacity(source.len() + block.len());
    out.push_str(&source[..insert_at]);
    out.push_str(&block);
    out.push_str(&source[insert_at..]);
    out
}
