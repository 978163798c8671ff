//! Cache Key Fingerprinting
//!
//! Every cache key in the service is a 64-bit fingerprint produced by
//! folding content hashes of stable fields with a fixed multiplicative
//! mixing constant, in a fixed field order. Defines are folded in sorted
//! key order (guaranteed by [`ShaderDefines`]' representation), so equal
//! descriptions fingerprint identically regardless of construction order.
//!
//! Raw content (source text, byte strings) is hashed with xxh3-64;
//! structured state goes through `FxHasher` via `hash_one`.

use std::hash::BuildHasher;

use rustc_hash::FxBuildHasher;
use xxhash_rust::xxh3::xxh3_64;

use super::description::{PipelineDescription, ShaderDefines, ShaderSource};

/// FNV-1a 64-bit prime, used as the multiplicative mixing constant.
const MIX: u64 = 0x0000_0100_0000_01B3;

/// Incremental 64-bit fold over field hashes.
///
/// Field order is fixed by the call sequence; callers must always fold the
/// same fields in the same order for a given key family.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintBuilder {
    state: u64,
}

impl FingerprintBuilder {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    #[inline]
    pub fn fold(&mut self, field_hash: u64) -> &mut Self {
        self.state = (self.state ^ field_hash).wrapping_mul(MIX);
        self
    }

    #[inline]
    pub fn fold_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.fold(xxh3_64(bytes))
    }

    #[inline]
    pub fn fold_str(&mut self, s: &str) -> &mut Self {
        self.fold_bytes(s.as_bytes())
    }

    /// Folds any `Hash` value through `FxHasher`.
    #[inline]
    pub fn fold_hashed<T: std::hash::Hash>(&mut self, value: &T) -> &mut Self {
        self.fold(FxBuildHasher.hash_one(value))
    }

    #[inline]
    #[must_use]
    pub fn finish(&self) -> u64 {
        self.state
    }
}

/// Per-key-family seeds, so a pipeline and a translation of the same
/// source never collide on the same fingerprint.
mod seed {
    pub const PIPELINE: u64 = 0x5068_6172_6F73_0001;
    pub const TRANSLATION: u64 = 0x5068_6172_6F73_0002;
    pub const ROOT_SIGNATURE: u64 = 0x5068_6172_6F73_0003;
}

fn fold_defines(builder: &mut FingerprintBuilder, defines: &ShaderDefines) {
    // Sorted key order; a correctness requirement, not an optimization.
    for (key, value) in defines.iter() {
        builder.fold_str(key).fold_str(value);
    }
}

/// Fingerprint of a whole pipeline description. Primary cache key for the
/// pipeline-state, bytecode and disk tiers.
#[must_use]
pub fn pipeline_fingerprint(desc: &PipelineDescription) -> u64 {
    let mut builder = FingerprintBuilder::new(seed::PIPELINE);
    builder.fold_hashed(&desc.kind);
    for source in desc.present_stages() {
        builder
            .fold_hashed(&source.stage)
            .fold_hashed(&source.language)
            .fold_str(&source.text);
    }
    builder.fold_hashed(&desc.fixed_function);
    fold_defines(&mut builder, &desc.defines);
    builder.finish()
}

/// Fingerprint of one stage's translation input: source text, stage,
/// source language and sorted defines.
#[must_use]
pub fn translation_fingerprint(source: &ShaderSource, defines: &ShaderDefines) -> u64 {
    let mut builder = FingerprintBuilder::new(seed::TRANSLATION);
    builder
        .fold_str(&source.text)
        .fold_hashed(&source.stage)
        .fold_hashed(&source.language);
    fold_defines(&mut builder, defines);
    builder.finish()
}

/// Seed for root-signature fingerprints; the fold itself lives with the
/// builder in [`crate::root_signature`].
#[must_use]
pub fn root_signature_builder() -> FingerprintBuilder {
    FingerprintBuilder::new(seed::ROOT_SIGNATURE)
}
