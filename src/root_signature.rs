//! Root-Signature Synthesis
//!
//! Derives one resource-binding layout from the reflection data of every
//! stage in a compiled set. The result is keyed by a fingerprint of the
//! *merged* parameters — not the bytecode — so two pipelines with
//! different code but identical bindings resolve to one cached signature.
//!
//! Synthesis appends one parameter per declared constant buffer,
//! read-only resource, read-write resource and sampler, recording
//! `(kind, slot, space, stage visibility)`. Conflicting slot/space
//! assignments across stages are deliberately not validated here; the
//! backend factory is the authority and rejects them at realization time.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::pipeline::fingerprint;
use crate::pipeline::{CompiledShaderSet, ShaderStage};

bitflags! {
    /// Which stages can see a binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StageVisibility: u8 {
        const VERTEX        = 1 << 0;
        const HULL          = 1 << 1;
        const DOMAIN        = 1 << 2;
        const GEOMETRY      = 1 << 3;
        const PIXEL         = 1 << 4;
        const COMPUTE       = 1 << 5;
        const AMPLIFICATION = 1 << 6;
        const MESH          = 1 << 7;
    }
}

impl From<ShaderStage> for StageVisibility {
    fn from(stage: ShaderStage) -> Self {
        match stage {
            ShaderStage::Vertex => Self::VERTEX,
            ShaderStage::Hull => Self::HULL,
            ShaderStage::Domain => Self::DOMAIN,
            ShaderStage::Geometry => Self::GEOMETRY,
            ShaderStage::Pixel => Self::PIXEL,
            ShaderStage::Compute => Self::COMPUTE,
            ShaderStage::Amplification => Self::AMPLIFICATION,
            ShaderStage::Mesh => Self::MESH,
        }
    }
}

/// Resource class of a binding parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BindingKind {
    ConstantBuffer = 0,
    /// Read-only resource (texture, structured buffer).
    Resource = 1,
    /// Read-write (UAV-style) resource.
    RwResource = 2,
    Sampler = 3,
}

/// One entry of a merged binding layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingParameter {
    pub kind: BindingKind,
    pub slot: u32,
    pub space: u32,
    pub visibility: StageVisibility,
}

/// The merged parameter list of one compiled set, plus its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedBindings {
    pub parameters: SmallVec<[BindingParameter; 16]>,
    pub fingerprint: u64,
}

/// Merges per-stage reflection into a flat parameter list.
///
/// Stages are visited in tag order and each stage's resource classes in a
/// fixed sequence, so the same bindings always produce the same parameter
/// order and therefore the same fingerprint.
#[must_use]
pub fn merge_bindings(shaders: &CompiledShaderSet) -> MergedBindings {
    let mut parameters: SmallVec<[BindingParameter; 16]> = SmallVec::new();

    for stage in shaders.iter() {
        let visibility = StageVisibility::from(stage.stage);
        let reflection = &stage.reflection;
        let classes = [
            (BindingKind::ConstantBuffer, &reflection.constant_buffers),
            (BindingKind::Resource, &reflection.resources),
            (BindingKind::RwResource, &reflection.rw_resources),
            (BindingKind::Sampler, &reflection.samplers),
        ];
        for (kind, bindings) in classes {
            for binding in bindings {
                parameters.push(BindingParameter {
                    kind,
                    slot: binding.slot,
                    space: binding.space,
                    visibility,
                });
            }
        }
    }

    let mut builder = fingerprint::root_signature_builder();
    for param in &parameters {
        builder
            .fold(u64::from(param.kind as u8))
            .fold(u64::from(param.slot))
            .fold(u64::from(param.space))
            .fold(u64::from(param.visibility.bits()));
    }

    MergedBindings {
        fingerprint: builder.finish(),
        parameters,
    }
}
