//! Resource formats and aliasing-group classification.
//!
//! Formats describe the immutable shape of a scheduled resource: enough to
//! size it for heap packing, to validate usage declarations against it, and
//! to hand it to the backend for the actual allocation.

/// Dimensionality of a texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D1,
    D2,
    D3,
    D2Array,
}

/// Pixel formats understood by the scheduler.
///
/// Typeless formats carry a bit layout without an interpretation; they are
/// the only formats that accept a shader-visible format override at usage
/// declaration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Bgra8Unorm,
    Rgb10A2Unorm,
    Rg11B10Float,
    R16Float,
    Rg16Float,
    Rgba16Float,
    R32Float,
    Rg32Float,
    Rgba32Float,
    R32Uint,
    Depth32Float,
    Depth24Stencil8,
    R16Typeless,
    R32Typeless,
    Rgba8Typeless,
}

impl PixelFormat {
    /// Size of one pixel in bytes.
    pub fn bytes_per_pixel(self) -> u64 {
        match self {
            Self::R8Unorm => 1,
            Self::Rg8Unorm | Self::R16Float | Self::R16Typeless => 2,
            Self::Rgba8Unorm
            | Self::Bgra8Unorm
            | Self::Rgb10A2Unorm
            | Self::Rg11B10Float
            | Self::Rg16Float
            | Self::R32Float
            | Self::R32Uint
            | Self::Depth32Float
            | Self::Depth24Stencil8
            | Self::R32Typeless
            | Self::Rgba8Typeless => 4,
            Self::Rgba16Float | Self::Rg32Float => 8,
            Self::Rgba32Float => 16,
        }
    }

    /// Check if this format has no interpretation of its own.
    pub fn is_typeless(self) -> bool {
        matches!(self, Self::R16Typeless | Self::R32Typeless | Self::Rgba8Typeless)
    }

    /// Check if this format carries a depth component.
    pub fn has_depth(self) -> bool {
        matches!(self, Self::Depth32Float | Self::Depth24Stencil8)
    }
}

/// Optimized clear value baked into a texture allocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u8 },
}

/// Description of a texture resource.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureProperties {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    /// Depth for 3D textures, array layer count for 2D arrays, 1 otherwise.
    pub depth_or_layers: u32,
    pub mip_count: u32,
    pub sample_count: u32,
    pub pixel_format: PixelFormat,
    pub clear_value: Option<ClearValue>,
    pub is_render_target: bool,
    pub is_depth_stencil: bool,
    pub is_unordered_access: bool,
}

impl TextureProperties {
    /// Create a 2D texture description with a single mip and sample.
    pub fn new_2d(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            kind: TextureKind::D2,
            width,
            height,
            depth_or_layers: 1,
            mip_count: 1,
            sample_count: 1,
            pixel_format,
            clear_value: None,
            is_render_target: false,
            is_depth_stencil: false,
            is_unordered_access: false,
        }
    }

    /// Create a 3D (volume) texture description.
    pub fn new_3d(width: u32, height: u32, depth: u32, pixel_format: PixelFormat) -> Self {
        Self {
            kind: TextureKind::D3,
            depth_or_layers: depth,
            ..Self::new_2d(width, height, pixel_format)
        }
    }

    /// Create a 2D array texture description.
    pub fn new_2d_array(
        width: u32,
        height: u32,
        layer_count: u32,
        pixel_format: PixelFormat,
    ) -> Self {
        Self {
            kind: TextureKind::D2Array,
            depth_or_layers: layer_count,
            ..Self::new_2d(width, height, pixel_format)
        }
    }

    /// Set the mip level count.
    pub fn with_mip_count(mut self, count: u32) -> Self {
        self.mip_count = count;
        self
    }

    /// Set the sample count for multisampling.
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    /// Set the optimized clear value.
    pub fn with_clear_value(mut self, clear: ClearValue) -> Self {
        self.clear_value = Some(clear);
        self
    }

    /// Allow use as a color render target.
    pub fn as_render_target(mut self) -> Self {
        self.is_render_target = true;
        self
    }

    /// Allow use as a depth/stencil target.
    pub fn as_depth_stencil(mut self) -> Self {
        self.is_depth_stencil = true;
        self
    }

    /// Allow use through unordered-access views.
    pub fn as_unordered_access(mut self) -> Self {
        self.is_unordered_access = true;
        self
    }
}

/// Description of a buffer resource.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferProperties {
    pub size_bytes: u64,
    /// Element stride for structured access; 0 for raw buffers.
    pub stride: u64,
}

impl BufferProperties {
    /// Create a raw buffer description.
    pub fn new(size_bytes: u64) -> Self {
        Self {
            size_bytes,
            stride: 0,
        }
    }

    /// Set the structured element stride.
    pub fn with_stride(mut self, stride: u64) -> Self {
        self.stride = stride;
        self
    }
}

/// A class of resources that may share one backend heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AliasingGroup {
    /// Render-target and depth-stencil textures.
    RtDsTextures,
    /// Textures that are neither render targets nor depth-stencil.
    NonRtDsTextures,
    /// Buffers.
    Buffers,
    /// Any resource, when the backend supports mixed heaps.
    Universal,
}

impl AliasingGroup {
    /// All groups, in a stable order.
    pub const ALL: [AliasingGroup; 4] = [
        AliasingGroup::RtDsTextures,
        AliasingGroup::NonRtDsTextures,
        AliasingGroup::Buffers,
        AliasingGroup::Universal,
    ];
}

/// The format of a scheduled resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceFormat {
    Texture(TextureProperties),
    Buffer(BufferProperties),
}

impl ResourceFormat {
    /// Total size of the resource in bytes, without backend alignment.
    ///
    /// Textures sum the full mip chain; arrays multiply by layer count,
    /// multisampled textures by sample count.
    pub fn size_in_bytes(&self) -> u64 {
        match self {
            Self::Buffer(buffer) => buffer.size_bytes,
            Self::Texture(tex) => {
                let layers = match tex.kind {
                    TextureKind::D2Array => u64::from(tex.depth_or_layers),
                    _ => 1,
                };
                let mut total = 0u64;
                for mip in 0..tex.mip_count {
                    let w = u64::from((tex.width >> mip).max(1));
                    let h = u64::from((tex.height >> mip).max(1));
                    let d = match tex.kind {
                        TextureKind::D3 => u64::from((tex.depth_or_layers >> mip).max(1)),
                        _ => 1,
                    };
                    total += w * h * d * tex.pixel_format.bytes_per_pixel();
                }
                total * layers * u64::from(tex.sample_count)
            }
        }
    }

    /// Number of subresources: one per mip level (times array layers for 2D
    /// arrays); buffers are a single subresource.
    pub fn subresource_count(&self) -> u32 {
        match self {
            Self::Buffer(_) => 1,
            Self::Texture(tex) => match tex.kind {
                TextureKind::D2Array => tex.mip_count * tex.depth_or_layers,
                _ => tex.mip_count,
            },
        }
    }

    /// Classify the resource for heap sharing.
    ///
    /// Backends with universal heap support collapse every resource into the
    /// [`AliasingGroup::Universal`] group.
    pub fn aliasing_group(&self, supports_universal_heaps: bool) -> AliasingGroup {
        if supports_universal_heaps {
            return AliasingGroup::Universal;
        }
        match self {
            Self::Buffer(_) => AliasingGroup::Buffers,
            Self::Texture(tex) => {
                if tex.is_render_target || tex.is_depth_stencil {
                    AliasingGroup::RtDsTextures
                } else {
                    AliasingGroup::NonRtDsTextures
                }
            }
        }
    }

    /// Check if unordered-access usage is representable in this format.
    pub fn allows_unordered_access(&self) -> bool {
        match self {
            Self::Buffer(_) => true,
            Self::Texture(tex) => tex.is_unordered_access,
        }
    }

    /// The declared pixel format, if this is a texture.
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        match self {
            Self::Texture(tex) => Some(tex.pixel_format),
            Self::Buffer(_) => None,
        }
    }
}
