//! Abstract GPU backend model.
//!
//! The engine never talks to a graphics API directly; it records against the
//! [`Device`] and [`CommandEncoder`] traits defined here. A concrete binding
//! (Vulkan, Metal, a software rasterizer) implements them; the
//! [`crate::headless`] module implements them with a command log for tests.
//!
//! Handles are opaque ids. The backend owns their meaning; the engine only
//! stores, compares and returns them. Handles are destroyed exclusively
//! through the frame context's release queues, never by their creators.

use std::hash::{Hash, Hasher};

use thiserror::Error;
use vellum_core::{Vec2, Vec2U};

/// Error kind surfaced by a backend. Resource creation failures are treated
/// as fatal by the layers above.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendError {
    #[error("out of device memory")]
    OutOfDeviceMemory,
    #[error("out of host memory")]
    OutOfHostMemory,
    #[error("device lost")]
    DeviceLost,
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

macro_rules! handle {
    ($(#[$doc:meta] $name:ident),* $(,)?) => {
        $(
            #[$doc]
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            pub struct $name(pub u64);
        )*
    };
}

handle! {
    /// Opaque image handle.
    Image,
    /// Opaque image view handle.
    ImageView,
    /// Opaque buffer handle.
    Buffer,
    /// Opaque sampler handle.
    Sampler,
    /// Opaque descriptor set layout handle.
    DescriptorSetLayout,
    /// Opaque descriptor set handle.
    DescriptorSet,
    /// Opaque swapchain handle.
    Swapchain,
}

/// Monotonic frame counter maintained by the backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub u64);

bitflags::bitflags! {
    /// Per-format capability bits.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct FormatFeatures: u32 {
        const SAMPLED_IMAGE            = 1 << 0;
        const STORAGE_IMAGE            = 1 << 1;
        const COLOR_ATTACHMENT         = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 3;
        const TRANSFER_SRC             = 1 << 4;
        const TRANSFER_DST             = 1 << 5;
    }

    /// Declared usages of an image.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ImageUsage: u32 {
        const SAMPLED                  = 1 << 0;
        const STORAGE                  = 1 << 1;
        const COLOR_ATTACHMENT         = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 3;
        const TRANSFER_SRC             = 1 << 4;
        const TRANSFER_DST             = 1 << 5;
    }

    /// Declared usages of a buffer.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BufferUsage: u32 {
        const UNIFORM      = 1 << 0;
        const STORAGE      = 1 << 1;
        const TRANSFER_SRC = 1 << 2;
        const TRANSFER_DST = 1 << 3;
    }

    /// Image aspect selection.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ImageAspects: u32 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Format {
    #[default]
    Undefined,
    B8G8R8A8Unorm,
    R8G8B8A8Unorm,
    R16G16B16A16Sfloat,
    R32G32B32A32Sfloat,
    D16UnormS8Uint,
    D24UnormS8Uint,
    D32SfloatS8Uint,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    #[default]
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SamplerMipMapMode {
    #[default]
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SamplerAddressMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompareOp {
    #[default]
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BorderColor {
    #[default]
    FloatTransparentBlack,
    FloatOpaqueBlack,
    FloatOpaqueWhite,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ComponentSwizzle {
    #[default]
    Identity,
    Zero,
    One,
    R,
    G,
    B,
    A,
}

/// Per-channel swizzle applied by an image view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ComponentMapping {
    pub r: ComponentSwizzle,
    pub g: ComponentSwizzle,
    pub b: ComponentSwizzle,
    pub a: ComponentSwizzle,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImageType {
    #[default]
    Type2D,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SampleCount {
    #[default]
    Count1,
    Count2,
    Count4,
    Count8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent3D {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Extent3D {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ImageDesc {
    pub label: &'static str,
    pub ty: ImageType,
    pub format: Format,
    pub usage: ImageUsage,
    pub aspects: ImageAspects,
    pub extent: Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub sample_count: SampleCount,
}

#[derive(Clone, Copy, Debug)]
pub struct ImageViewDesc {
    pub label: &'static str,
    pub image: Image,
    pub view_format: Format,
    pub mapping: ComponentMapping,
    pub aspects: ImageAspects,
    pub first_mip_level: u32,
    pub num_mip_levels: u32,
    pub first_array_layer: u32,
    pub num_array_layers: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BufferDesc {
    pub label: &'static str,
    pub size: u64,
    pub host_mapped: bool,
    pub usage: BufferUsage,
}

/// Sampler description. Equality and hashing ignore the label so the sampler
/// cache keys on behavior only; float fields compare by bit pattern.
#[derive(Clone, Copy, Debug)]
pub struct SamplerDesc {
    pub label: &'static str,
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mip_map_mode: SamplerMipMapMode,
    pub address_mode_u: SamplerAddressMode,
    pub address_mode_v: SamplerAddressMode,
    pub address_mode_w: SamplerAddressMode,
    pub mip_lod_bias: f32,
    pub anisotropy_enable: bool,
    pub max_anisotropy: f32,
    pub compare_enable: bool,
    pub compare_op: CompareOp,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: BorderColor,
    pub unnormalized_coordinates: bool,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            label: "",
            mag_filter: Filter::Nearest,
            min_filter: Filter::Nearest,
            mip_map_mode: SamplerMipMapMode::Nearest,
            address_mode_u: SamplerAddressMode::Repeat,
            address_mode_v: SamplerAddressMode::Repeat,
            address_mode_w: SamplerAddressMode::Repeat,
            mip_lod_bias: 0.0,
            anisotropy_enable: false,
            max_anisotropy: 1.0,
            compare_enable: false,
            compare_op: CompareOp::Never,
            min_lod: 0.0,
            max_lod: 0.0,
            border_color: BorderColor::FloatTransparentBlack,
            unnormalized_coordinates: false,
        }
    }
}

impl SamplerDesc {
    fn key(
        &self,
    ) -> (
        Filter,
        Filter,
        SamplerMipMapMode,
        [SamplerAddressMode; 3],
        u32,
        bool,
        u32,
        bool,
        CompareOp,
        [u32; 2],
        BorderColor,
        bool,
    ) {
        (
            self.mag_filter,
            self.min_filter,
            self.mip_map_mode,
            [
                self.address_mode_u,
                self.address_mode_v,
                self.address_mode_w,
            ],
            self.mip_lod_bias.to_bits(),
            self.anisotropy_enable,
            self.max_anisotropy.to_bits(),
            self.compare_enable,
            self.compare_op,
            [self.min_lod.to_bits(), self.max_lod.to_bits()],
            self.border_color,
            self.unnormalized_coordinates,
        )
    }
}

impl PartialEq for SamplerDesc {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for SamplerDesc {}

impl Hash for SamplerDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    #[default]
    Sampler,
    SampledImage,
    UniformBuffer,
    DynamicUniformBuffer,
    StorageBuffer,
    DynamicStorageBuffer,
}

#[derive(Clone, Copy, Debug)]
pub struct DescriptorBindingDesc {
    pub ty: DescriptorType,
    pub count: u32,
    pub is_variable_length: bool,
}

#[derive(Clone, Debug)]
pub struct DescriptorSetLayoutDesc {
    pub label: &'static str,
    pub bindings: Vec<DescriptorBindingDesc>,
}

/// A sampled-image or sampler element written into a descriptor set.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageBinding {
    pub image_view: Option<ImageView>,
    pub sampler: Option<Sampler>,
}

#[derive(Clone, Copy, Debug)]
pub struct BufferBinding {
    pub buffer: Buffer,
    pub offset: u64,
    pub size: u64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DescriptorSetUpdate<'a> {
    pub set: Option<DescriptorSet>,
    pub binding: u32,
    pub element: u32,
    pub images: &'a [ImageBinding],
    pub buffers: &'a [BufferBinding],
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FormatProperties {
    pub optimal_tiling_features: FormatFeatures,
    pub linear_tiling_features: FormatFeatures,
    pub buffer_features: FormatFeatures,
}

#[derive(Clone, Copy, Debug)]
pub struct ImageSubresourceRange {
    pub aspects: ImageAspects,
    pub first_mip_level: u32,
    pub num_mip_levels: u32,
    pub first_array_layer: u32,
    pub num_array_layers: u32,
}

impl ImageSubresourceRange {
    pub const COLOR: Self = Self {
        aspects: ImageAspects::COLOR,
        first_mip_level: 0,
        num_mip_levels: 1,
        first_array_layer: 0,
        num_array_layers: 1,
    };

    pub const DEPTH_STENCIL: Self = Self {
        aspects: ImageAspects::DEPTH.union(ImageAspects::STENCIL),
        first_mip_level: 0,
        num_mip_levels: 1,
        first_array_layer: 0,
        num_array_layers: 1,
    };
}

#[derive(Clone, Copy, Debug)]
pub struct ImageSubresourceLayers {
    pub aspects: ImageAspects,
    pub mip_level: u32,
    pub first_array_layer: u32,
    pub num_array_layers: u32,
}

impl ImageSubresourceLayers {
    pub const COLOR: Self = Self {
        aspects: ImageAspects::COLOR,
        mip_level: 0,
        first_array_layer: 0,
        num_array_layers: 1,
    };
}

/// One region of a blit: `offsets[0]` is the inclusive start corner,
/// `offsets[1]` the exclusive end corner.
#[derive(Clone, Copy, Debug)]
pub struct ImageBlit {
    pub src_layers: ImageSubresourceLayers,
    pub src_offsets: [[u32; 3]; 2],
    pub dst_layers: ImageSubresourceLayers,
    pub dst_offsets: [[u32; 3]; 2],
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DepthStencil {
    pub depth: f32,
    pub stencil: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct MemoryRange {
    pub offset: u64,
    pub size: u64,
}

pub const WHOLE_SIZE: u64 = u64::MAX;

impl MemoryRange {
    pub const WHOLE: Self = Self {
        offset: 0,
        size: WHOLE_SIZE,
    };
}

/// Pixel-space viewport with depth range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub offset: Vec2,
    pub extent: Vec2,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            extent: Vec2::ZERO,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Attachments for a dynamic rendering scope.
#[derive(Clone, Copy, Debug)]
pub struct RenderingInfo<'a> {
    pub render_extent: Vec2U,
    pub color_attachments: &'a [ImageView],
    pub depth_stencil_attachment: Option<ImageView>,
}

/// State of the frame ring as reported by the backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameContext {
    /// Frame currently being recorded.
    pub current: FrameId,
    /// Oldest frame that may still be in flight.
    pub tail: FrameId,
    /// `current` modulo the buffering depth.
    pub ring_index: u32,
    /// Number of frames in flight.
    pub buffering: u32,
}

#[derive(Clone, Debug, Default)]
pub struct SwapchainState {
    pub images: Vec<Image>,
    /// Index into `images` of the acquired image, if acquisition succeeded.
    pub current_image: Option<u32>,
    pub extent: Vec2U,
}

/// The device half of a backend binding.
///
/// All methods take `&self`; implementations use interior synchronization.
/// `uninit_*` calls are only issued by the frame context's release machinery
/// once the handle can no longer be referenced by in-flight frames.
pub trait Device: Send + Sync {
    fn create_image(&self, desc: ImageDesc) -> Result<Image, BackendError>;
    fn create_image_view(&self, desc: ImageViewDesc) -> Result<ImageView, BackendError>;
    fn create_buffer(&self, desc: BufferDesc) -> Result<Buffer, BackendError>;
    fn create_sampler(&self, desc: SamplerDesc) -> Result<Sampler, BackendError>;
    fn create_descriptor_set_layout(
        &self,
        desc: DescriptorSetLayoutDesc,
    ) -> Result<DescriptorSetLayout, BackendError>;
    /// `variable_lengths` sizes any variable-length bindings in the layout.
    fn create_descriptor_set(
        &self,
        layout: DescriptorSetLayout,
        variable_lengths: &[u32],
    ) -> Result<DescriptorSet, BackendError>;

    fn uninit_image(&self, image: Image);
    fn uninit_image_view(&self, view: ImageView);
    fn uninit_buffer(&self, buffer: Buffer);
    fn uninit_sampler(&self, sampler: Sampler);
    fn uninit_descriptor_set_layout(&self, layout: DescriptorSetLayout);
    fn uninit_descriptor_set(&self, set: DescriptorSet);

    fn update_descriptor_set(&self, update: DescriptorSetUpdate<'_>);

    fn map_buffer_memory(&self, buffer: Buffer) -> Result<*mut u8, BackendError>;
    fn unmap_buffer_memory(&self, buffer: Buffer);
    fn flush_mapped_buffer_memory(
        &self,
        buffer: Buffer,
        range: MemoryRange,
    ) -> Result<(), BackendError>;

    fn get_format_properties(&self, format: Format) -> FormatProperties;

    fn begin_frame(&self, swapchain: Option<Swapchain>) -> Result<(), BackendError>;
    fn submit_frame(&self, swapchain: Option<Swapchain>) -> Result<(), BackendError>;
    fn get_frame_context(&self) -> FrameContext;
    fn get_swapchain_state(&self, swapchain: Swapchain) -> SwapchainState;
    /// Command encoder for the given ring slot of the current frame.
    fn encoder(&self, ring_index: u32) -> &dyn CommandEncoder;
    fn wait_idle(&self) -> Result<(), BackendError>;
}

/// The command-recording half of a backend binding.
pub trait CommandEncoder {
    fn clear_color_image(&self, image: Image, color: [f32; 4], ranges: &[ImageSubresourceRange]);
    fn clear_depth_stencil_image(
        &self,
        image: Image,
        depth_stencil: DepthStencil,
        ranges: &[ImageSubresourceRange],
    );
    fn blit_image(&self, src: Image, dst: Image, blits: &[ImageBlit], filter: Filter);

    fn begin_rendering(&self, info: RenderingInfo<'_>);
    fn end_rendering(&self);
    fn set_viewport(&self, viewport: Viewport);
    fn set_scissor(&self, scissor: vellum_core::RectU);
    fn bind_descriptor_sets(&self, sets: &[DescriptorSet]);
    fn draw(&self, first_vertex: u32, num_vertices: u32, first_instance: u32, num_instances: u32);
}
