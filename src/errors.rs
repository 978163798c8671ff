//! Error Types
//!
//! This module defines the error types used throughout the service.
//!
//! # Overview
//!
//! The main error type [`ForgeError`] covers all failure modes including:
//! - Service lifecycle violations (calls outside the `Running` state)
//! - Source-language translation failures
//! - Native compilation and backend realization failures
//! - Async job timeouts
//!
//! Disk-cache I/O errors exist as a variant ([`ForgeError::Io`]) but never
//! cross the disk-cache boundary: they are wrapped and logged there and
//! the lookup is treated as a miss.
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, ForgeError>`.

use thiserror::Error;

use crate::pipeline::ShaderStage;

/// The main error type for the pipeline compilation service.
///
/// Each fatal variant aborts the single request that triggered it; no
/// variant invalidates unrelated cache entries or tears down the service.
#[derive(Error, Debug)]
pub enum ForgeError {
    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// A public entry point was called while the service was not running.
    #[error("Service is not running (state: {0})")]
    NotRunning(&'static str),

    // ========================================================================
    // Compilation Errors
    // ========================================================================
    /// A stage or pipeline kind was requested that the backend cannot serve.
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// The source-language translator rejected the input.
    #[error("Translation failed for {stage:?} stage: {diagnostics:?}")]
    TranslationFailure {
        /// Stage whose source failed to translate.
        stage: ShaderStage,
        /// Diagnostic messages collected from the translator.
        diagnostics: Vec<String>,
    },

    /// The native compiler rejected the (translated) source.
    #[error("Native compilation failed for {stage:?} stage: {log}")]
    NativeCompilationFailure {
        /// Stage that failed to compile.
        stage: ShaderStage,
        /// Diagnostic log from the native compiler.
        log: String,
    },

    /// The backend rejected the merged root signature at realization time.
    #[error("Binding conflict in merged root signature: {0}")]
    BindingConflict(String),

    // ========================================================================
    // Async Errors
    // ========================================================================
    /// An async compilation job exceeded its time budget.
    #[error("Compilation timed out after {0:?}")]
    Timeout(std::time::Duration),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error. Constructed and logged at the disk-cache boundary,
    /// where the lookup degrades to a miss; never raised to callers of
    /// the public API.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias for `Result<T, ForgeError>`.
pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_into_the_io_variant() {
        let raw = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = ForgeError::from(raw);
        assert!(matches!(err, ForgeError::Io(_)));
        assert!(err.to_string().contains("read-only"));
    }
}
