//! Service Configuration
//!
//! Plain option struct consumed once at construction. Cache capacities
//! are fixed for the lifetime of the service; there is no runtime
//! resizing.

use std::path::PathBuf;
use std::time::Duration;

use crate::backend::ShaderModel;
use crate::translate::TranslationConfig;

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Pipeline-state (L1) tier capacity.
    pub pipeline_cache_capacity: usize,
    /// Bytecode (L2) tier capacity.
    pub bytecode_cache_capacity: usize,
    /// Translation tier capacity.
    pub translation_cache_capacity: usize,
    /// Root-signature tier capacity.
    pub root_signature_cache_capacity: usize,

    /// Directory of the on-disk bytecode tier; `None` disables it.
    pub disk_cache_dir: Option<PathBuf>,

    /// Worker threads in the async compilation engine.
    pub worker_count: usize,
    /// Per-job compilation budget on the async path.
    pub compile_timeout: Duration,
    /// How long shutdown waits for workers before abandoning them.
    pub shutdown_grace: Duration,

    /// Target shading model for native compilation.
    pub shader_model: ShaderModel,
    /// Entry-point name handed to the native compiler.
    pub entry_point: String,
    /// Flags forwarded verbatim to the native compiler.
    pub compile_flags: u32,

    pub translation: TranslationConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            pipeline_cache_capacity: 1024,
            bytecode_cache_capacity: 2048,
            translation_cache_capacity: 4096,
            root_signature_cache_capacity: 256,
            disk_cache_dir: None,
            worker_count: 4,
            compile_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
            shader_model: ShaderModel::default(),
            entry_point: "main".to_string(),
            compile_flags: 0,
            translation: TranslationConfig::default(),
        }
    }
}
