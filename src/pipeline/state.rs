//! Fixed-Function Pipeline State
//!
//! Plain, hashable value types describing the non-programmable half of a
//! pipeline: rasterizer, depth/stencil, blend, input layout, attachment
//! formats and sample count. Everything here derives `Hash`/`Eq` so a
//! whole [`FixedFunctionState`] can participate in fingerprinting; floats
//! are stored as raw bit patterns for that reason.

// ─── Rasterizer ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerState {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_bias: i32,
    pub depth_bias_clamp_bits: u32,
    pub slope_scaled_depth_bias_bits: u32,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::default(),
            cull_mode: CullMode::default(),
            front_face: FrontFace::default(),
            depth_bias: 0,
            depth_bias_clamp_bits: 0.0_f32.to_bits(),
            slope_scaled_depth_bias_bits: 0.0_f32.to_bits(),
        }
    }
}

// ─── Depth / Stencil ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOperation {
    #[default]
    Keep,
    Zero,
    Replace,
    Invert,
    IncrementClamp,
    DecrementClamp,
    IncrementWrap,
    DecrementWrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_enabled: bool,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
    pub stencil_enabled: bool,
    pub front: StencilFaceState,
    pub back: StencilFaceState,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_enabled: true,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil_enabled: false,
            front: StencilFaceState::default(),
            back: StencilFaceState::default(),
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
        }
    }
}

// ─── Blend ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFactor {
    Zero,
    #[default]
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DstColor,
    InvDstColor,
    DstAlpha,
    InvDstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOperation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOperation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub enabled: bool,
    pub color: BlendComponent,
    pub alpha: BlendComponent,
    /// Per-channel write mask bits (RGBA = 0b1111).
    pub write_mask: u8,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            color: BlendComponent::default(),
            alpha: BlendComponent::default(),
            write_mask: 0b1111,
        }
    }
}

// ─── Input Layout ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint32x2,
    Uint32x4,
    Unorm8x4,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub semantic: String,
    pub semantic_index: u32,
    pub format: VertexFormat,
    pub buffer_slot: u32,
    pub byte_offset: u32,
}

// ─── Attachment Formats ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    Rg11b10Float,
    Depth32Float,
    Depth24PlusStencil8,
    Unknown,
}

// ─── Aggregate ────────────────────────────────────────────────────────────────

/// All fixed-function state of a pipeline, in hashable mirror form.
///
/// Compute pipelines carry the default value; it still participates in the
/// fingerprint so the fold stays uniform across kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FixedFunctionState {
    pub rasterizer: RasterizerState,
    pub depth_stencil: DepthStencilState,
    pub blend: BlendState,
    pub vertex_attributes: Vec<VertexAttribute>,
    pub color_formats: Vec<TextureFormat>,
    pub depth_format: Option<TextureFormat>,
    pub sample_count: u32,
}

impl Default for FixedFunctionState {
    fn default() -> Self {
        Self {
            rasterizer: RasterizerState::default(),
            depth_stencil: DepthStencilState::default(),
            blend: BlendState::default(),
            vertex_attributes: Vec::new(),
            color_formats: vec![TextureFormat::Rgba8Unorm],
            depth_format: Some(TextureFormat::Depth32Float),
            sample_count: 1,
        }
    }
}
