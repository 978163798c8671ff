//! Pipeline Compiler (Orchestrator)
//!
//! The façade of the service. A pipeline request walks the tiers in
//! order — pipeline-state (L1), bytecode (L2), disk, full compile —
//! populating caches on the way back up, then derives the root signature
//! and asks the backend factory to realize the final object.
//!
//! All tiers are fields of one service instance; independent instances
//! (e.g. in tests) never interfere. Any typed error aborts the single
//! request that raised it; partial results are never cached.
//!
//! # Lifecycle
//!
//! `Initializing → Running → ShuttingDown → Shutdown`, each transition
//! taken exactly once under acquire/release atomics. Public entry points
//! other than construction and [`PipelineCompiler::shutdown`] reject
//! calls outside `Running`.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};

use crate::backend::{PipelineStateObject, RootSignature, ShaderBackend};
use crate::cache::{BoundedCache, DiskCache, Displaced, LruCache};
use crate::config::CompilerConfig;
use crate::engine::{AsyncEngine, Job, JobToken};
use crate::errors::{ForgeError, Result};
use crate::pipeline::{
    pipeline_fingerprint, translation_fingerprint, CompiledShaderSet, CompiledStage,
    PipelineDescription, PipelineKind, ShaderDefines, ShaderLanguage, ShaderSource,
};
use crate::root_signature::merge_bindings;
use crate::stats::{CompilationStats, StatsSnapshot};
use crate::translate::{inject_defines, ShaderTranslator, TranslationResult};

// ─── Service State ────────────────────────────────────────────────────────────

const STATE_INITIALIZING: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_SHUTTING_DOWN: u8 = 2;
const STATE_SHUTDOWN: u8 = 3;

struct ServiceState(AtomicU8);

impl ServiceState {
    fn new() -> Self {
        Self(AtomicU8::new(STATE_INITIALIZING))
    }

    fn advance(&self, from: u8, to: u8) -> bool {
        self.0
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire) == STATE_RUNNING
    }

    fn name(&self) -> &'static str {
        match self.0.load(Ordering::Acquire) {
            STATE_INITIALIZING => "initializing",
            STATE_RUNNING => "running",
            STATE_SHUTTING_DOWN => "shutting down",
            _ => "shutdown",
        }
    }
}

/// Progress callback for [`PipelineCompiler::warm_cache`]; receives
/// `(finished, total)` after every description.
pub type WarmupProgress = Arc<dyn Fn(usize, usize) + Send + Sync>;

// ─── Pipeline Compiler ────────────────────────────────────────────────────────

pub struct PipelineCompiler {
    config: CompilerConfig,
    backend: Arc<dyn ShaderBackend>,
    translator: Arc<dyn ShaderTranslator>,

    // Cache tiers; each owns its private lock.
    pipelines: LruCache<Arc<PipelineStateObject>>,
    bytecode: BoundedCache<Arc<CompiledShaderSet>>,
    translations: BoundedCache<Arc<TranslationResult>>,
    root_signatures: BoundedCache<Arc<RootSignature>>,
    disk: Option<DiskCache>,

    engine: AsyncEngine,
    stats: CompilationStats,
    state: ServiceState,
}

impl PipelineCompiler {
    /// Builds and starts the service.
    ///
    /// A disk-cache directory that cannot be created disables the disk
    /// tier with a warning rather than failing construction.
    #[must_use]
    pub fn new(
        config: CompilerConfig,
        backend: Arc<dyn ShaderBackend>,
        translator: Arc<dyn ShaderTranslator>,
    ) -> Arc<Self> {
        let disk = config
            .disk_cache_dir
            .as_ref()
            .and_then(|dir| DiskCache::open(dir.clone()));

        let service = Arc::new(Self {
            pipelines: LruCache::new(config.pipeline_cache_capacity),
            bytecode: BoundedCache::new(config.bytecode_cache_capacity),
            translations: BoundedCache::new(config.translation_cache_capacity),
            root_signatures: BoundedCache::new(config.root_signature_cache_capacity),
            disk,
            engine: AsyncEngine::new(config.worker_count),
            stats: CompilationStats::new(),
            state: ServiceState::new(),
            config,
            backend,
            translator,
        });

        service.state.advance(STATE_INITIALIZING, STATE_RUNNING);
        info!(
            "Pipeline compiler running: {} workers, disk cache {}",
            service.config.worker_count,
            service
                .disk
                .as_ref()
                .map_or("disabled".to_string(), |d| d.dir().display().to_string()),
        );
        service
    }

    fn ensure_running(&self) -> Result<()> {
        if self.state.is_running() {
            Ok(())
        } else {
            Err(ForgeError::NotRunning(self.state.name()))
        }
    }

    // ========================================================================
    // Public API — synchronous
    // ========================================================================

    /// Returns a ready-to-use graphics pipeline, compiling on a miss.
    /// Blocks only the calling thread.
    pub fn get_graphics_pipeline(
        &self,
        desc: &PipelineDescription,
    ) -> Result<Arc<PipelineStateObject>> {
        self.get_pipeline_of_kind(desc, PipelineKind::Graphics)
    }

    pub fn get_compute_pipeline(
        &self,
        desc: &PipelineDescription,
    ) -> Result<Arc<PipelineStateObject>> {
        self.get_pipeline_of_kind(desc, PipelineKind::Compute)
    }

    /// Errors with [`ForgeError::UnsupportedFeature`] when the backend
    /// lacks mesh-shader support.
    pub fn get_mesh_pipeline(
        &self,
        desc: &PipelineDescription,
    ) -> Result<Arc<PipelineStateObject>> {
        self.get_pipeline_of_kind(desc, PipelineKind::Mesh)
    }

    fn get_pipeline_of_kind(
        &self,
        desc: &PipelineDescription,
        kind: PipelineKind,
    ) -> Result<Arc<PipelineStateObject>> {
        self.ensure_running()?;
        if desc.kind != kind {
            return Err(ForgeError::UnsupportedFeature(format!(
                "{:?} description passed to the {kind:?} entry point",
                desc.kind
            )));
        }
        self.compile_and_install(desc, None)
    }

    // ========================================================================
    // Public API — asynchronous
    // ========================================================================

    /// Async variant of [`PipelineCompiler::get_graphics_pipeline`].
    ///
    /// An L1 hit resolves without occupying a worker; otherwise the
    /// compile runs on the engine under the configured timeout.
    pub fn get_graphics_pipeline_async(
        self: &Arc<Self>,
        desc: PipelineDescription,
    ) -> Job<Arc<PipelineStateObject>> {
        self.get_pipeline_async_of_kind(desc, PipelineKind::Graphics)
    }

    pub fn get_compute_pipeline_async(
        self: &Arc<Self>,
        desc: PipelineDescription,
    ) -> Job<Arc<PipelineStateObject>> {
        self.get_pipeline_async_of_kind(desc, PipelineKind::Compute)
    }

    pub fn get_mesh_pipeline_async(
        self: &Arc<Self>,
        desc: PipelineDescription,
    ) -> Job<Arc<PipelineStateObject>> {
        self.get_pipeline_async_of_kind(desc, PipelineKind::Mesh)
    }

    fn get_pipeline_async_of_kind(
        self: &Arc<Self>,
        desc: PipelineDescription,
        kind: PipelineKind,
    ) -> Job<Arc<PipelineStateObject>> {
        let budget = self.config.compile_timeout;
        if let Err(err) = self.ensure_running() {
            return Job::completed(Err(err), budget);
        }
        if desc.kind != kind {
            return Job::completed(
                Err(ForgeError::UnsupportedFeature(format!(
                    "{:?} description passed to the {kind:?} entry point",
                    desc.kind
                ))),
                budget,
            );
        }

        // Synchronous L1 lookup so cached pipelines never occupy a worker.
        let fingerprint = pipeline_fingerprint(&desc);
        if let Some(pipeline) = self.pipelines.get(fingerprint) {
            self.stats.record_pipeline_hit();
            return Job::completed(Ok(pipeline), budget);
        }

        self.stats.record_async_submission();
        let service = Arc::clone(self);
        self.engine
            .submit(budget, move |token| service.compile_and_install(&desc, Some(token)))
    }

    /// Pre-compiles `descriptions` on the engine.
    ///
    /// Individual failures are logged and skipped — warming is
    /// best-effort. `progress` is invoked after each description with
    /// `(finished, total)`.
    pub fn warm_cache(
        self: &Arc<Self>,
        descriptions: Vec<PipelineDescription>,
        progress: Option<WarmupProgress>,
    ) -> Job<()> {
        let total = descriptions.len();
        let budget = self.config.compile_timeout * total.max(1) as u32;
        if let Err(err) = self.ensure_running() {
            return Job::completed(Err(err), budget);
        }
        if total == 0 {
            return Job::completed(Ok(()), budget);
        }

        let (done_tx, done_rx) = flume::bounded(1);
        let finished = Arc::new(AtomicUsize::new(0));

        for desc in descriptions {
            let service = Arc::clone(self);
            let finished = Arc::clone(&finished);
            let progress = progress.clone();
            let done_tx = done_tx.clone();
            self.stats.record_async_submission();
            self.engine
                .submit::<(), _>(self.config.compile_timeout, move |token| {
                    if let Err(err) = service.compile_and_install(&desc, Some(token)) {
                        warn!("Cache warmup skipped one pipeline: {err}");
                    }
                    let count = finished.fetch_add(1, Ordering::AcqRel) + 1;
                    if let Some(progress) = &progress {
                        progress(count, total);
                    }
                    if count == total {
                        let _ = done_tx.send(Ok(()));
                    }
                    Ok(())
                })
                .detach();
        }

        Job::from_channel(done_rx, budget)
    }

    // ========================================================================
    // Public API — translation, maintenance, stats
    // ========================================================================

    /// Translates one shader source (with defines injected), through the
    /// translation cache.
    pub fn translate_shader(
        &self,
        source: &ShaderSource,
        defines: &ShaderDefines,
    ) -> Result<Arc<TranslationResult>> {
        self.ensure_running()?;
        self.translate_cached(source, defines)
    }

    /// Clears the in-memory tiers, releasing backend objects. Returns the
    /// number of entries removed across all of them.
    pub fn clear_memory_cache(&self) -> Result<usize> {
        self.ensure_running()?;
        Ok(self.clear_memory_tiers())
    }

    /// [`PipelineCompiler::clear_memory_cache`] plus the disk tier.
    pub fn clear_all_caches(&self) -> Result<usize> {
        self.ensure_running()?;
        let mut removed = self.clear_memory_tiers();
        if let Some(disk) = &self.disk {
            let files = disk.clear();
            debug!("Deleted {files} disk cache entries");
            removed += files;
        }
        Ok(removed)
    }

    fn clear_memory_tiers(&self) -> usize {
        let pipelines = self.pipelines.drain();
        let pipeline_count = pipelines.len();
        for (_, pipeline) in pipelines {
            self.backend.release_pipeline(&pipeline);
        }

        let mut removed = pipeline_count;
        removed += self.bytecode.clear();
        removed += self.translations.clear();
        removed += self.clear_root_signatures();

        info!("Cleared {removed} in-memory cache entries ({pipeline_count} pipelines)");
        removed
    }

    /// Drops one fingerprint from every tier, releasing the backend
    /// pipeline if it was resident.
    pub fn invalidate_pipeline(&self, fingerprint: u64) -> Result<()> {
        self.ensure_running()?;
        if let Some(pipeline) = self.pipelines.remove(fingerprint) {
            self.backend.release_pipeline(&pipeline);
        }
        self.bytecode.remove(fingerprint);
        if let Some(disk) = &self.disk {
            disk.remove(fingerprint);
        }
        debug!("Invalidated pipeline {fingerprint:016x}");
        Ok(())
    }

    pub fn stats(&self) -> Result<StatsSnapshot> {
        self.ensure_running()?;
        Ok(self.stats.snapshot())
    }

    pub fn reset_stats(&self) -> Result<()> {
        self.ensure_running()?;
        self.stats.reset();
        Ok(())
    }

    /// Number of resident pipeline-state entries.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Number of resident bytecode (L2) entries.
    #[must_use]
    pub fn bytecode_count(&self) -> usize {
        self.bytecode.len()
    }

    /// Fingerprint a description the way the cache tiers do.
    #[must_use]
    pub fn fingerprint(desc: &PipelineDescription) -> u64 {
        pipeline_fingerprint(desc)
    }

    /// Stops the service: drains the engine, releases every resident
    /// backend object, and transitions to `Shutdown`.
    ///
    /// Idempotent; worker threads that outlive the grace period are
    /// logged as warnings, never raised.
    pub fn shutdown(&self) {
        if !self.state.advance(STATE_RUNNING, STATE_SHUTTING_DOWN) {
            debug!("Shutdown requested while {}", self.state.name());
            return;
        }

        let clean = self.engine.shutdown(self.config.shutdown_grace);
        if !clean {
            warn!("Some compilation workers did not stop within the grace period");
        }

        let pipelines = self.pipelines.drain();
        for (_, pipeline) in &pipelines {
            self.backend.release_pipeline(pipeline);
        }
        let signatures = self.clear_root_signatures();
        self.bytecode.clear();
        self.translations.clear();

        self.state.advance(STATE_SHUTTING_DOWN, STATE_SHUTDOWN);
        info!(
            "Pipeline compiler shut down ({} pipelines, {signatures} root signatures released)",
            pipelines.len(),
        );
    }

    // ========================================================================
    // Compilation core
    // ========================================================================

    /// The shared algorithm behind every pipeline entry point.
    ///
    /// `token` is present on the async path; it gates the final cache
    /// install so abandoned jobs never publish results.
    fn compile_and_install(
        &self,
        desc: &PipelineDescription,
        token: Option<&JobToken>,
    ) -> Result<Arc<PipelineStateObject>> {
        let result = self.compile_and_install_inner(desc, token);
        if result.is_err() {
            self.stats.record_compile_error();
        }
        result
    }

    fn compile_and_install_inner(
        &self,
        desc: &PipelineDescription,
        token: Option<&JobToken>,
    ) -> Result<Arc<PipelineStateObject>> {
        desc.validate().map_err(ForgeError::UnsupportedFeature)?;
        if desc.kind == PipelineKind::Mesh && !self.backend.supports_mesh_shaders() {
            return Err(ForgeError::UnsupportedFeature(
                "backend does not support mesh shaders".to_string(),
            ));
        }

        let fingerprint = pipeline_fingerprint(desc);

        if let Some(pipeline) = self.pipelines.get(fingerprint) {
            self.stats.record_pipeline_hit();
            return Ok(pipeline);
        }
        self.stats.record_pipeline_miss();

        let shaders = self.obtain_shader_set(desc, fingerprint)?;
        let root_signature = self.obtain_root_signature(&shaders)?;
        let pipeline = self.realize_pipeline(desc, fingerprint, &shaders, &root_signature)?;
        self.install_pipeline(fingerprint, pipeline, token)
    }

    /// L2 → disk → full compile, populating both on the way back up.
    fn obtain_shader_set(
        &self,
        desc: &PipelineDescription,
        fingerprint: u64,
    ) -> Result<Arc<CompiledShaderSet>> {
        if let Some(set) = self.bytecode.get(fingerprint) {
            self.stats.record_bytecode_hit();
            return Ok(set);
        }
        self.stats.record_bytecode_miss();

        if let Some(disk) = &self.disk {
            if let Some(stages) = disk.load(fingerprint) {
                self.stats.record_disk_hit();
                let set = self.reflect_loaded_stages(stages)?;
                self.store_bytecode(fingerprint, Arc::clone(&set));
                return Ok(set);
            }
            self.stats.record_disk_miss();
        }

        let started = Instant::now();
        let mut set = CompiledShaderSet::new();
        for source in desc.present_stages() {
            set.insert(self.compile_stage(source, &desc.defines)?);
        }
        self.stats.record_compile(started.elapsed());
        debug!(
            "Full compile of {fingerprint:016x} ({} stages) took {:?}",
            set.stage_count(),
            started.elapsed(),
        );

        let set = Arc::new(set);
        self.store_bytecode(fingerprint, Arc::clone(&set));
        if let Some(disk) = &self.disk {
            disk.store(fingerprint, &set);
        }
        Ok(set)
    }

    /// Rebuilds reflection for bytecode loaded from disk.
    fn reflect_loaded_stages(
        &self,
        stages: Vec<(crate::pipeline::ShaderStage, Vec<u8>)>,
    ) -> Result<Arc<CompiledShaderSet>> {
        let mut set = CompiledShaderSet::new();
        for (stage, bytecode) in stages {
            let reflection = self
                .backend
                .reflect(&bytecode, stage)
                .map_err(|log| ForgeError::NativeCompilationFailure { stage, log })?;
            set.insert(CompiledStage {
                stage,
                bytecode,
                reflection,
            });
        }
        Ok(Arc::new(set))
    }

    fn store_bytecode(&self, fingerprint: u64, set: Arc<CompiledShaderSet>) {
        if self.bytecode.put(fingerprint, set).is_eviction() {
            self.stats.record_eviction();
        }
    }

    /// Translate (if needed), native-compile and reflect one stage.
    fn compile_stage(&self, source: &ShaderSource, defines: &ShaderDefines) -> Result<CompiledStage> {
        let text = if source.language == ShaderLanguage::Hlsl {
            inject_defines(&source.text, defines)
        } else {
            self.translate_cached(source, defines)?.text.clone()
        };

        let profile = self
            .config
            .shader_model
            .profile(source.stage)
            .map_err(ForgeError::UnsupportedFeature)?;

        let bytecode = self
            .backend
            .compile_native(
                &text,
                &self.config.entry_point,
                &profile,
                self.config.compile_flags,
            )
            .map_err(|log| ForgeError::NativeCompilationFailure {
                stage: source.stage,
                log,
            })?;

        let reflection = self
            .backend
            .reflect(&bytecode, source.stage)
            .map_err(|log| ForgeError::NativeCompilationFailure {
                stage: source.stage,
                log,
            })?;

        Ok(CompiledStage {
            stage: source.stage,
            bytecode,
            reflection,
        })
    }

    fn translate_cached(
        &self,
        source: &ShaderSource,
        defines: &ShaderDefines,
    ) -> Result<Arc<TranslationResult>> {
        let key = translation_fingerprint(source, defines);
        if let Some(result) = self.translations.get(key) {
            self.stats.record_translation_hit();
            return Ok(result);
        }
        self.stats.record_translation_miss();

        let injected = inject_defines(&source.text, defines);
        let started = Instant::now();
        let (text, warnings) = self
            .translator
            .translate(&injected, source.stage, &self.config.translation)
            .map_err(|diagnostics| ForgeError::TranslationFailure {
                stage: source.stage,
                diagnostics,
            })?;
        self.stats.record_translation();

        if self.config.translation.strict && !warnings.is_empty() {
            return Err(ForgeError::TranslationFailure {
                stage: source.stage,
                diagnostics: warnings,
            });
        }
        for warning in &warnings {
            warn!("Translation warning ({:?}): {warning}", source.stage);
        }

        let result = Arc::new(TranslationResult {
            text,
            warnings,
            elapsed: started.elapsed(),
        });
        if self.translations.put(key, Arc::clone(&result)).is_eviction() {
            self.stats.record_eviction();
        }
        Ok(result)
    }

    /// Fetch-or-create the root signature for a compiled set.
    ///
    /// Keyed by the merged-reflection fingerprint, never by bytecode, so
    /// pipelines with different code but identical bindings share one
    /// signature instance.
    fn obtain_root_signature(&self, shaders: &CompiledShaderSet) -> Result<Arc<RootSignature>> {
        let merged = merge_bindings(shaders);
        if let Some(signature) = self.root_signatures.get(merged.fingerprint) {
            self.stats.record_root_signature_hit();
            return Ok(signature);
        }
        self.stats.record_root_signature_miss();

        let raw = self
            .backend
            .create_root_signature(&merged.parameters)
            .map_err(ForgeError::BindingConflict)?;
        let signature = Arc::new(RootSignature {
            raw,
            fingerprint: merged.fingerprint,
        });

        match self
            .root_signatures
            .put(merged.fingerprint, Arc::clone(&signature))
        {
            Displaced::Evicted(_, old) => {
                self.stats.record_eviction();
                self.backend.release_root_signature(&old);
            }
            Displaced::Replaced(old) => {
                // A concurrent request created the same signature; keep
                // ours (last put wins) and release the duplicate.
                self.backend.release_root_signature(&old);
            }
            Displaced::None => {}
        }
        Ok(signature)
    }

    fn realize_pipeline(
        &self,
        desc: &PipelineDescription,
        fingerprint: u64,
        shaders: &CompiledShaderSet,
        root_signature: &RootSignature,
    ) -> Result<Arc<PipelineStateObject>> {
        let raw = match desc.kind {
            PipelineKind::Graphics => self.backend.realize_graphics_pipeline(
                root_signature,
                shaders,
                &desc.fixed_function,
            ),
            PipelineKind::Compute => self
                .backend
                .realize_compute_pipeline(root_signature, shaders),
            PipelineKind::Mesh => self.backend.realize_mesh_pipeline(
                root_signature,
                shaders,
                &desc.fixed_function,
            ),
        }
        .map_err(ForgeError::BindingConflict)?;

        Ok(Arc::new(PipelineStateObject {
            raw,
            kind: desc.kind,
            fingerprint,
        }))
    }

    /// Publishes a realized pipeline into L1.
    ///
    /// Abandoned jobs (expired token) and a stopped service release the
    /// object instead of caching it; concurrent duplicates for the same
    /// fingerprint resolve to last-put-wins with the loser released.
    fn install_pipeline(
        &self,
        fingerprint: u64,
        pipeline: Arc<PipelineStateObject>,
        token: Option<&JobToken>,
    ) -> Result<Arc<PipelineStateObject>> {
        if token.is_some_and(JobToken::expired) {
            warn!("Discarding pipeline {fingerprint:016x} compiled after its deadline");
            self.backend.release_pipeline(&pipeline);
            return Err(ForgeError::Timeout(
                token.map_or(self.config.compile_timeout, JobToken::budget),
            ));
        }
        if !self.state.is_running() {
            self.backend.release_pipeline(&pipeline);
            return Err(ForgeError::NotRunning(self.state.name()));
        }

        match self.pipelines.put(fingerprint, Arc::clone(&pipeline)) {
            Displaced::Evicted(evicted_key, old) => {
                self.stats.record_eviction();
                debug!("Evicted pipeline {evicted_key:016x} from the state cache");
                self.backend.release_pipeline(&old);
            }
            Displaced::Replaced(old) => {
                if old.raw != pipeline.raw {
                    self.backend.release_pipeline(&old);
                }
            }
            Displaced::None => {}
        }

        // Shutdown may have drained L1 between the check above and the
        // put; re-check and undo the install, or the entry would outlive
        // teardown unreleased. Remove and drain are atomic under the tier
        // lock, so exactly one side ends up releasing it.
        if !self.state.is_running() {
            if let Some(installed) = self.pipelines.remove(fingerprint) {
                self.backend.release_pipeline(&installed);
            }
            return Err(ForgeError::NotRunning(self.state.name()));
        }
        Ok(pipeline)
    }

    fn clear_root_signatures(&self) -> usize {
        let signatures = self.root_signatures.drain();
        let count = signatures.len();
        for (_, signature) in signatures {
            self.backend.release_root_signature(&signature);
        }
        count
    }
}

impl Drop for PipelineCompiler {
    fn drop(&mut self) {
        // Last-resort teardown for instances dropped without an explicit
        // shutdown; releases still happen exactly once because shutdown
        // drains the tiers.
        self.shutdown();
    }
}
