//! Compiled Shader Artifacts
//!
//! [`CompiledStage`] is one stage's native bytecode plus the reflection
//! data extracted from it; [`CompiledShaderSet`] aggregates the stages of
//! one pipeline. A set is produced once per pipeline fingerprint and then
//! shared read-only across every cache tier referencing that fingerprint.
//!
//! # Disk layout
//!
//! A set serializes to a flat little-endian layout:
//!
//! ```text
//! [magic u32][format version u32][reserved u32]
//! [stage tag u32][length u32][length bytes of bytecode]  (repeated)
//! ```
//!
//! Only bytecode is persisted; reflection is re-derived through
//! [`ShaderBackend::reflect`] when a set is loaded back from disk.
//!
//! [`ShaderBackend::reflect`]: crate::backend::ShaderBackend::reflect

use std::sync::Arc;

use super::description::{ShaderStage, STAGE_COUNT};

/// Magic stamp at the start of every disk-cache entry (`"SFGC"`).
pub const DISK_MAGIC: u32 = 0x5346_4743;

/// Bumped whenever the serialized layout changes; a mismatch invalidates
/// the entry on load.
pub const DISK_FORMAT_VERSION: u32 = 2;

// ─── Reflection ───────────────────────────────────────────────────────────────

/// One declared resource binding in a stage's reflection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceBinding {
    pub name: String,
    pub slot: u32,
    pub space: u32,
}

impl ResourceBinding {
    #[must_use]
    pub fn new(name: impl Into<String>, slot: u32, space: u32) -> Self {
        Self {
            name: name.into(),
            slot,
            space,
        }
    }
}

/// Resource-binding metadata extracted from one stage's bytecode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflectionData {
    pub constant_buffers: Vec<ResourceBinding>,
    /// Read-only resources (textures, structured buffers).
    pub resources: Vec<ResourceBinding>,
    /// Read-write (UAV-style) resources.
    pub rw_resources: Vec<ResourceBinding>,
    pub samplers: Vec<ResourceBinding>,
    /// Thread-group dimensions; compute stages only.
    pub thread_group_size: Option<[u32; 3]>,
}

// ─── Compiled Stage / Set ─────────────────────────────────────────────────────

/// One stage's compiled bytecode and its reflection. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub bytecode: Vec<u8>,
    pub reflection: ReflectionData,
}

/// The compiled stages of one pipeline, indexed by stage.
#[derive(Debug, Clone, Default)]
pub struct CompiledShaderSet {
    stages: [Option<Arc<CompiledStage>>; STAGE_COUNT],
}

impl CompiledShaderSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stage: CompiledStage) {
        let index = stage.stage.index();
        self.stages[index] = Some(Arc::new(stage));
    }

    #[inline]
    #[must_use]
    pub fn stage(&self, stage: ShaderStage) -> Option<&Arc<CompiledStage>> {
        self.stages[stage.index()].as_ref()
    }

    /// Iterates present stages in tag order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CompiledStage>> {
        self.stages.iter().filter_map(Option::as_ref)
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.iter().filter(|s| s.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stage_count() == 0
    }

    // ── Disk serialization ───────────────────────────────────────────────────

    /// Serializes the set (bytecode only) to the documented disk layout.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let payload: usize = self.iter().map(|s| 8 + s.bytecode.len()).sum();
        let mut out = Vec::with_capacity(12 + payload);
        out.extend_from_slice(&DISK_MAGIC.to_le_bytes());
        out.extend_from_slice(&DISK_FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // reserved
        for stage in self.iter() {
            out.extend_from_slice(&stage.stage.tag().to_le_bytes());
            out.extend_from_slice(&(stage.bytecode.len() as u32).to_le_bytes());
            out.extend_from_slice(&stage.bytecode);
        }
        out
    }

    /// Parses the disk layout back into `(stage, bytecode)` pairs.
    ///
    /// Returns `None` on a mismatched magic, wrong format version, or a
    /// truncated/garbled record list; the disk cache treats all of those
    /// as an invalid entry.
    #[must_use]
    pub fn deserialize_bytecode(bytes: &[u8]) -> Option<Vec<(ShaderStage, Vec<u8>)>> {
        let read_u32 = |at: usize| -> Option<u32> {
            bytes
                .get(at..at + 4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        };

        if read_u32(0)? != DISK_MAGIC || read_u32(4)? != DISK_FORMAT_VERSION {
            return None;
        }

        let mut stages = Vec::new();
        let mut cursor = 12;
        while cursor < bytes.len() {
            let stage = ShaderStage::from_tag(read_u32(cursor)?)?;
            let len = read_u32(cursor + 4)? as usize;
            let bytecode = bytes.get(cursor + 8..cursor + 8 + len)?.to_vec();
            stages.push((stage, bytecode));
            cursor += 8 + len;
        }
        if stages.is_empty() {
            return None;
        }
        Some(stages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> CompiledShaderSet {
        let mut set = CompiledShaderSet::new();
        set.insert(CompiledStage {
            stage: ShaderStage::Vertex,
            bytecode: vec![0xDE, 0xAD, 0xBE, 0xEF],
            reflection: ReflectionData::default(),
        });
        set.insert(CompiledStage {
            stage: ShaderStage::Pixel,
            bytecode: vec![0x01, 0x02, 0x03],
            reflection: ReflectionData::default(),
        });
        set
    }

    #[test]
    fn round_trip_preserves_bytecode() {
        let set = sample_set();
        let bytes = set.serialize();
        let stages = CompiledShaderSet::deserialize_bytecode(&bytes).unwrap();

        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].0, ShaderStage::Vertex);
        assert_eq!(stages[0].1, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(stages[1].0, ShaderStage::Pixel);
        assert_eq!(stages[1].1, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut bytes = sample_set().serialize();
        bytes[0] ^= 0xFF;
        assert!(CompiledShaderSet::deserialize_bytecode(&bytes).is_none());
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut bytes = sample_set().serialize();
        bytes[4] = 0xFF;
        assert!(CompiledShaderSet::deserialize_bytecode(&bytes).is_none());
    }

    #[test]
    fn truncated_record_is_rejected() {
        let bytes = sample_set().serialize();
        assert!(CompiledShaderSet::deserialize_bytecode(&bytes[..bytes.len() - 1]).is_none());
    }

    #[test]
    fn unknown_stage_tag_is_rejected() {
        let mut bytes = sample_set().serialize();
        bytes[12] = 0xAA; // first record's stage tag
        assert!(CompiledShaderSet::deserialize_bytecode(&bytes).is_none());
    }
}
