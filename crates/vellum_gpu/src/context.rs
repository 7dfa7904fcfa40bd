//! GPU frame context.
//!
//! [`GpuContext`] owns the long-lived GPU state the canvas renders through:
//! the chosen color/depth-stencil formats, the bindless texture and sampler
//! descriptor arrays with their slot allocators, a 1x1 default image exposed
//! through six swizzled views, the screen and scratch framebuffers, a
//! sampler cache, and one release queue per frame ring slot.
//!
//! Deferred release replaces reference counting: owners never destroy GPU
//! objects, they enqueue them with [`GpuContext::release`]. An object
//! released during frame `N` is destroyed when ring slot `N % B` is
//! re-acquired `B` frames later, at which point no in-flight frame can
//! reference it.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use thiserror::Error;
use vellum_core::{Bitset, Vec2U};

use crate::backend::{
    BackendError, Buffer, CommandEncoder, ComponentMapping, ComponentSwizzle, DepthStencil,
    DescriptorBindingDesc, DescriptorSet, DescriptorSetLayout, DescriptorSetLayoutDesc,
    DescriptorSetUpdate, DescriptorType, Device, Extent3D, Filter, Format, FormatFeatures,
    FrameId, Image, ImageAspects, ImageBinding, ImageBlit, ImageDesc, ImageSubresourceLayers,
    ImageSubresourceRange, ImageType, ImageUsage, ImageView, ImageViewDesc, SampleCount, Sampler,
    SamplerAddressMode, SamplerDesc, SamplerMipMapMode, Swapchain,
};

/// Size of the bindless sampled-image array.
pub const NUM_TEXTURE_SLOTS: u32 = 1024;
/// Size of the bindless sampler array.
pub const NUM_SAMPLER_SLOTS: u32 = 64;
/// Upper bound on frames in flight.
pub const MAX_FRAME_BUFFERING: u32 = 4;
/// Scratch framebuffers available to post-fx passes.
pub const NUM_SCRATCH_FRAMEBUFFERS: usize = 2;

/// Default texture slots, bound at init to swizzled views of a 1x1 image.
pub const TEXTURE_WHITE: u32 = 0;
pub const TEXTURE_BLACK: u32 = 1;
pub const TEXTURE_TRANSPARENT: u32 = 2;
pub const TEXTURE_RED: u32 = 3;
pub const TEXTURE_GREEN: u32 = 4;
pub const TEXTURE_BLUE: u32 = 5;
const NUM_DEFAULT_TEXTURES: usize = 6;

/// Canonical sampler slots, created at init in this order.
pub const SAMPLER_LINEAR: u32 = 0;
pub const SAMPLER_NEAREST: u32 = 1;
pub const SAMPLER_LINEAR_CLAMPED: u32 = 2;
pub const SAMPLER_NEAREST_CLAMPED: u32 = 3;

/// Feature bits a color format must carry in optimal tiling.
pub const COLOR_FEATURES: FormatFeatures = FormatFeatures::COLOR_ATTACHMENT
    .union(FormatFeatures::STORAGE_IMAGE)
    .union(FormatFeatures::SAMPLED_IMAGE)
    .union(FormatFeatures::TRANSFER_SRC)
    .union(FormatFeatures::TRANSFER_DST);

/// Feature bits a depth-stencil format must carry in optimal tiling.
pub const DEPTH_STENCIL_FEATURES: FormatFeatures = FormatFeatures::DEPTH_STENCIL_ATTACHMENT
    .union(FormatFeatures::SAMPLED_IMAGE)
    .union(FormatFeatures::TRANSFER_SRC)
    .union(FormatFeatures::TRANSFER_DST);

/// Priority-ordered candidates; first supported wins.
const HDR_COLOR_FORMATS: &[Format] = &[Format::R16G16B16A16Sfloat, Format::R32G32B32A32Sfloat];
const SDR_COLOR_FORMATS: &[Format] = &[Format::B8G8R8A8Unorm, Format::R8G8B8A8Unorm];
const DEPTH_STENCIL_FORMATS: &[Format] = &[
    Format::D16UnormS8Uint,
    Format::D24UnormS8Uint,
    Format::D32SfloatS8Uint,
];

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("device doesn't support any known color format")]
    NoColorFormat,
    #[error("device doesn't support any known depth stencil format")]
    NoDepthStencilFormat,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// A released object queued for deferred destruction.
#[derive(Clone, Copy, Debug)]
pub enum Object {
    Image(Image),
    ImageView(ImageView),
    Buffer(Buffer),
    Sampler(Sampler),
    DescriptorSet(DescriptorSet),
    DescriptorSetLayout(DescriptorSetLayout),
}

impl From<Image> for Object {
    fn from(v: Image) -> Self {
        Self::Image(v)
    }
}
impl From<ImageView> for Object {
    fn from(v: ImageView) -> Self {
        Self::ImageView(v)
    }
}
impl From<Buffer> for Object {
    fn from(v: Buffer) -> Self {
        Self::Buffer(v)
    }
}
impl From<Sampler> for Object {
    fn from(v: Sampler) -> Self {
        Self::Sampler(v)
    }
}
impl From<DescriptorSet> for Object {
    fn from(v: DescriptorSet) -> Self {
        Self::DescriptorSet(v)
    }
}
impl From<DescriptorSetLayout> for Object {
    fn from(v: DescriptorSetLayout) -> Self {
        Self::DescriptorSetLayout(v)
    }
}

fn uninit_objects(device: &dyn Device, objects: Vec<Object>) {
    for object in objects {
        match object {
            Object::Image(v) => device.uninit_image(v),
            Object::ImageView(v) => device.uninit_image_view(v),
            Object::Buffer(v) => device.uninit_buffer(v),
            Object::Sampler(v) => device.uninit_sampler(v),
            Object::DescriptorSet(v) => device.uninit_descriptor_set(v),
            Object::DescriptorSetLayout(v) => device.uninit_descriptor_set_layout(v),
        }
    }
}

/// One framebuffer attachment: the image, the view the passes render
/// through, and the description it was created with.
#[derive(Clone, Copy, Debug)]
pub struct FramebufferAttachment {
    pub image: Image,
    pub view: ImageView,
    pub desc: ImageDesc,
}

/// A render target: color + depth-stencil attachments and a single-texture
/// descriptor set for sampling the color attachment in post-fx passes.
/// Recreated whenever the surface extent changes.
#[derive(Clone, Copy, Debug)]
pub struct Framebuffer {
    pub color: FramebufferAttachment,
    pub depth_stencil: FramebufferAttachment,
    pub color_texture: DescriptorSet,
    pub extent: Vec2U,
}

/// A sampler plus its slot in the bindless sampler array.
#[derive(Clone, Copy, Debug)]
pub struct CachedSampler {
    pub sampler: Sampler,
    pub slot: u32,
}

pub struct GpuContext {
    device: Arc<dyn Device>,
    color_format: Format,
    depth_stencil_format: Format,
    buffering: u32,

    pub ubo_layout: DescriptorSetLayout,
    pub ssbo_layout: DescriptorSetLayout,
    pub textures_layout: DescriptorSetLayout,
    pub samplers_layout: DescriptorSetLayout,
    /// The bindless sampled-image array, one element per texture slot.
    pub texture_views: DescriptorSet,
    /// The bindless sampler array, one element per sampler slot.
    pub samplers: DescriptorSet,

    texture_slots: Bitset,
    sampler_slots: Bitset,

    default_image: Image,
    default_image_views: [ImageView; NUM_DEFAULT_TEXTURES],

    screen_fb: Framebuffer,
    scratch_fbs: [Framebuffer; NUM_SCRATCH_FRAMEBUFFERS],

    sampler_cache: FxHashMap<SamplerDesc, CachedSampler>,
    released: Vec<Vec<Object>>,
}

impl GpuContext {
    /// Bring up the context on `device`.
    ///
    /// Scans the HDR format table first when `use_hdr` is set, falling back
    /// to SDR with a warning; a device supporting neither is an error.
    pub fn new(
        device: Arc<dyn Device>,
        use_hdr: bool,
        buffering: u32,
        initial_extent: Vec2U,
    ) -> Result<Self, GpuError> {
        assert!(
            buffering > 0 && buffering <= MAX_FRAME_BUFFERING,
            "buffering must be in 1..={MAX_FRAME_BUFFERING}"
        );
        assert!(
            initial_extent.x > 0 && initial_extent.y > 0,
            "initial extent must be non-zero"
        );

        let color_format = select_color_format(&*device, use_hdr)?;
        let depth_stencil_format = select_depth_stencil_format(&*device)?;
        tracing::debug!("gpu context formats: color {color_format:?}, depth-stencil {depth_stencil_format:?}");

        let ubo_layout = device.create_descriptor_set_layout(DescriptorSetLayoutDesc {
            label: "ubo layout",
            bindings: vec![DescriptorBindingDesc {
                ty: DescriptorType::DynamicUniformBuffer,
                count: 1,
                is_variable_length: false,
            }],
        })?;

        let ssbo_layout = device.create_descriptor_set_layout(DescriptorSetLayoutDesc {
            label: "ssbo layout",
            bindings: vec![DescriptorBindingDesc {
                ty: DescriptorType::DynamicStorageBuffer,
                count: 1,
                is_variable_length: false,
            }],
        })?;

        let textures_layout = device.create_descriptor_set_layout(DescriptorSetLayoutDesc {
            label: "textures layout",
            bindings: vec![DescriptorBindingDesc {
                ty: DescriptorType::SampledImage,
                count: NUM_TEXTURE_SLOTS,
                is_variable_length: true,
            }],
        })?;

        let samplers_layout = device.create_descriptor_set_layout(DescriptorSetLayoutDesc {
            label: "samplers layout",
            bindings: vec![DescriptorBindingDesc {
                ty: DescriptorType::Sampler,
                count: NUM_SAMPLER_SLOTS,
                is_variable_length: true,
            }],
        })?;

        let texture_views = device.create_descriptor_set(textures_layout, &[NUM_TEXTURE_SLOTS])?;
        let samplers = device.create_descriptor_set(samplers_layout, &[NUM_SAMPLER_SLOTS])?;

        let default_image = device.create_image(ImageDesc {
            label: "default texture image",
            ty: ImageType::Type2D,
            format: Format::B8G8R8A8Unorm,
            usage: ImageUsage::SAMPLED | ImageUsage::STORAGE | ImageUsage::TRANSFER_DST,
            aspects: ImageAspects::COLOR,
            extent: Extent3D::new(1, 1, 1),
            mip_levels: 1,
            array_layers: 1,
            sample_count: SampleCount::Count1,
        })?;

        let screen_fb = create_framebuffer(
            &*device,
            color_format,
            depth_stencil_format,
            textures_layout,
            initial_extent,
        )?;
        let mut scratch = Vec::with_capacity(NUM_SCRATCH_FRAMEBUFFERS);
        for _ in 0..NUM_SCRATCH_FRAMEBUFFERS {
            scratch.push(create_framebuffer(
                &*device,
                color_format,
                depth_stencil_format,
                textures_layout,
                initial_extent,
            )?);
        }

        let mut ctx = Self {
            device,
            color_format,
            depth_stencil_format,
            buffering,
            ubo_layout,
            ssbo_layout,
            textures_layout,
            samplers_layout,
            texture_views,
            samplers,
            texture_slots: Bitset::new(NUM_TEXTURE_SLOTS as usize),
            sampler_slots: Bitset::new(NUM_SAMPLER_SLOTS as usize),
            default_image,
            default_image_views: [ImageView(0); NUM_DEFAULT_TEXTURES],
            screen_fb,
            scratch_fbs: scratch
                .try_into()
                .unwrap_or_else(|_| unreachable!("scratch framebuffer count is fixed")),
            sampler_cache: FxHashMap::default(),
            released: (0..buffering).map(|_| Vec::new()).collect(),
        };

        let sampler = ctx.create_sampler(SamplerDesc {
            label: "linear+repeat sampler",
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mip_map_mode: SamplerMipMapMode::Linear,
            ..Default::default()
        })?;
        assert_eq!(sampler.slot, SAMPLER_LINEAR);

        let sampler = ctx.create_sampler(SamplerDesc {
            label: "nearest+repeat sampler",
            ..Default::default()
        })?;
        assert_eq!(sampler.slot, SAMPLER_NEAREST);

        let sampler = ctx.create_sampler(SamplerDesc {
            label: "linear+edge-clamped sampler",
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mip_map_mode: SamplerMipMapMode::Linear,
            address_mode_u: SamplerAddressMode::ClampToEdge,
            address_mode_v: SamplerAddressMode::ClampToEdge,
            address_mode_w: SamplerAddressMode::ClampToEdge,
            ..Default::default()
        })?;
        assert_eq!(sampler.slot, SAMPLER_LINEAR_CLAMPED);

        let sampler = ctx.create_sampler(SamplerDesc {
            label: "nearest+edge-clamped sampler",
            address_mode_u: SamplerAddressMode::ClampToEdge,
            address_mode_v: SamplerAddressMode::ClampToEdge,
            address_mode_w: SamplerAddressMode::ClampToEdge,
            ..Default::default()
        })?;
        assert_eq!(sampler.slot, SAMPLER_NEAREST_CLAMPED);

        ctx.bind_default_textures()?;

        Ok(ctx)
    }

    fn bind_default_textures(&mut self) -> Result<(), GpuError> {
        use ComponentSwizzle::{One, Zero};

        let mut mappings = [ComponentMapping::default(); NUM_DEFAULT_TEXTURES];
        mappings[TEXTURE_WHITE as usize] = ComponentMapping {
            r: One,
            g: One,
            b: One,
            a: One,
        };
        mappings[TEXTURE_BLACK as usize] = ComponentMapping {
            r: Zero,
            g: Zero,
            b: Zero,
            a: One,
        };
        mappings[TEXTURE_TRANSPARENT as usize] = ComponentMapping {
            r: Zero,
            g: Zero,
            b: Zero,
            a: Zero,
        };
        mappings[TEXTURE_RED as usize] = ComponentMapping {
            r: One,
            g: Zero,
            b: Zero,
            a: One,
        };
        mappings[TEXTURE_GREEN as usize] = ComponentMapping {
            r: Zero,
            g: One,
            b: Zero,
            a: One,
        };
        mappings[TEXTURE_BLUE as usize] = ComponentMapping {
            r: Zero,
            g: Zero,
            b: One,
            a: One,
        };

        for (i, mapping) in mappings.into_iter().enumerate() {
            let view = self.device.create_image_view(ImageViewDesc {
                label: "default texture image view",
                image: self.default_image,
                view_format: Format::B8G8R8A8Unorm,
                mapping,
                aspects: ImageAspects::COLOR,
                first_mip_level: 0,
                num_mip_levels: 1,
                first_array_layer: 0,
                num_array_layers: 1,
            })?;
            self.default_image_views[i] = view;

            let slot = self.alloc_texture_slot();
            assert_eq!(slot, i as u32);

            self.device.update_descriptor_set(DescriptorSetUpdate {
                set: Some(self.texture_views),
                binding: 0,
                element: slot,
                images: &[ImageBinding {
                    image_view: Some(view),
                    sampler: None,
                }],
                buffers: &[],
            });
        }

        Ok(())
    }

    fn release_framebuffer(&mut self, fb: Framebuffer) {
        self.release(fb.color.view);
        self.release(fb.color.image);
        self.release(fb.depth_stencil.view);
        self.release(fb.depth_stencil.image);
        self.release(fb.color_texture);
    }

    /// Release and recreate the screen and scratch framebuffers at a new
    /// surface extent.
    pub fn recreate_framebuffers(&mut self, extent: Vec2U) -> Result<(), GpuError> {
        let old_screen = self.screen_fb;
        self.release_framebuffer(old_screen);
        self.screen_fb = create_framebuffer(
            &*self.device,
            self.color_format,
            self.depth_stencil_format,
            self.textures_layout,
            extent,
        )?;
        for i in 0..NUM_SCRATCH_FRAMEBUFFERS {
            let old = self.scratch_fbs[i];
            self.release_framebuffer(old);
            self.scratch_fbs[i] = create_framebuffer(
                &*self.device,
                self.color_format,
                self.depth_stencil_format,
                self.textures_layout,
                extent,
            )?;
        }
        Ok(())
    }
}

fn create_framebuffer(
    device: &dyn Device,
    color_format: Format,
    depth_stencil_format: Format,
    textures_layout: DescriptorSetLayout,
    extent: Vec2U,
) -> Result<Framebuffer, GpuError> {
    let color_desc = ImageDesc {
        label: "framebuffer color image",
        ty: ImageType::Type2D,
        format: color_format,
        usage: ImageUsage::COLOR_ATTACHMENT
            | ImageUsage::SAMPLED
            | ImageUsage::STORAGE
            | ImageUsage::TRANSFER_SRC
            | ImageUsage::TRANSFER_DST,
        aspects: ImageAspects::COLOR,
        extent: Extent3D::new(extent.x, extent.y, 1),
        mip_levels: 1,
        array_layers: 1,
        sample_count: SampleCount::Count1,
    };
    let color_image = device.create_image(color_desc)?;
    let color_view = device.create_image_view(ImageViewDesc {
        label: "framebuffer color image view",
        image: color_image,
        view_format: color_desc.format,
        mapping: ComponentMapping::default(),
        aspects: ImageAspects::COLOR,
        first_mip_level: 0,
        num_mip_levels: 1,
        first_array_layer: 0,
        num_array_layers: 1,
    })?;

    let depth_desc = ImageDesc {
        label: "framebuffer depth stencil image",
        ty: ImageType::Type2D,
        format: depth_stencil_format,
        usage: ImageUsage::DEPTH_STENCIL_ATTACHMENT
            | ImageUsage::SAMPLED
            | ImageUsage::TRANSFER_SRC
            | ImageUsage::TRANSFER_DST,
        aspects: ImageAspects::DEPTH | ImageAspects::STENCIL,
        extent: Extent3D::new(extent.x, extent.y, 1),
        mip_levels: 1,
        array_layers: 1,
        sample_count: SampleCount::Count1,
    };
    let depth_image = device.create_image(depth_desc)?;
    let depth_view = device.create_image_view(ImageViewDesc {
        label: "framebuffer depth stencil image view",
        image: depth_image,
        view_format: depth_desc.format,
        mapping: ComponentMapping::default(),
        aspects: ImageAspects::DEPTH | ImageAspects::STENCIL,
        first_mip_level: 0,
        num_mip_levels: 1,
        first_array_layer: 0,
        num_array_layers: 1,
    })?;

    let color_texture = device.create_descriptor_set(textures_layout, &[1])?;
    device.update_descriptor_set(DescriptorSetUpdate {
        set: Some(color_texture),
        binding: 0,
        element: 0,
        images: &[ImageBinding {
            image_view: Some(color_view),
            sampler: None,
        }],
        buffers: &[],
    });

    Ok(Framebuffer {
        color: FramebufferAttachment {
            image: color_image,
            view: color_view,
            desc: color_desc,
        },
        depth_stencil: FramebufferAttachment {
            image: depth_image,
            view: depth_view,
            desc: depth_desc,
        },
        color_texture,
        extent,
    })
}

impl GpuContext {
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    pub fn color_format(&self) -> Format {
        self.color_format
    }

    pub fn depth_stencil_format(&self) -> Format {
        self.depth_stencil_format
    }

    pub fn buffering(&self) -> u32 {
        self.buffering
    }

    pub fn screen_fb(&self) -> &Framebuffer {
        &self.screen_fb
    }

    pub fn scratch_fbs(&self) -> &[Framebuffer; NUM_SCRATCH_FRAMEBUFFERS] {
        &self.scratch_fbs
    }

    pub fn ring_index(&self) -> u32 {
        self.device.get_frame_context().ring_index
    }

    pub fn frame_id(&self) -> FrameId {
        self.device.get_frame_context().current
    }

    pub fn tail_frame_id(&self) -> FrameId {
        self.device.get_frame_context().tail
    }

    /// Command encoder of the current ring slot.
    pub fn encoder(&self) -> &dyn CommandEncoder {
        self.device.encoder(self.ring_index())
    }

    /// Allocate a texture slot in the bindless array.
    ///
    /// Panics when the array is exhausted: running out of texture slots is
    /// unrecoverable in-frame.
    pub fn alloc_texture_slot(&mut self) -> u32 {
        let slot = self.texture_slots.find_clear().expect("out of texture slots") as u32;
        self.texture_slots.set(slot as usize);
        slot
    }

    pub fn release_texture_slot(&mut self, slot: u32) {
        self.texture_slots.clear(slot as usize);
    }

    /// Allocate a sampler slot in the bindless array. Panics on exhaustion.
    pub fn alloc_sampler_slot(&mut self) -> u32 {
        let slot = self.sampler_slots.find_clear().expect("out of sampler slots") as u32;
        self.sampler_slots.set(slot as usize);
        slot
    }

    pub fn release_sampler_slot(&mut self, slot: u32) {
        self.sampler_slots.clear(slot as usize);
    }

    /// Get or create the sampler described by `desc`.
    ///
    /// Hash-equal descriptions share one sampler and one slot; a new
    /// description creates the sampler, binds it into the sampler array and
    /// caches it.
    pub fn create_sampler(&mut self, desc: SamplerDesc) -> Result<CachedSampler, GpuError> {
        if let Some(cached) = self.sampler_cache.get(&desc) {
            return Ok(*cached);
        }

        let sampler = CachedSampler {
            sampler: self.device.create_sampler(desc)?,
            slot: self.alloc_sampler_slot(),
        };

        self.device.update_descriptor_set(DescriptorSetUpdate {
            set: Some(self.samplers),
            binding: 0,
            element: sampler.slot,
            images: &[ImageBinding {
                image_view: None,
                sampler: Some(sampler.sampler),
            }],
            buffers: &[],
        });

        self.sampler_cache.insert(desc, sampler);
        Ok(sampler)
    }

    /// Enqueue `object` for destruction once the current ring slot comes
    /// around again. Owners must never destroy objects themselves.
    pub fn release(&mut self, object: impl Into<Object>) {
        let ring = self.ring_index() as usize;
        self.released[ring].push(object.into());
    }

    /// Wait for the device to idle and destroy everything pending in every
    /// ring slot. Shutdown path.
    pub fn idle_reclaim(&mut self) -> Result<(), GpuError> {
        self.device.wait_idle()?;
        for ring in 0..self.released.len() {
            let objects = std::mem::take(&mut self.released[ring]);
            uninit_objects(&*self.device, objects);
        }
        Ok(())
    }

    /// Acquire the next frame slot, destroy objects released `B` frames
    /// ago, and clear all render targets.
    pub fn begin_frame(&mut self, swapchain: Option<Swapchain>) -> Result<(), GpuError> {
        self.device.begin_frame(swapchain)?;

        let ring = self.ring_index() as usize;
        let objects = std::mem::take(&mut self.released[ring]);
        uninit_objects(&*self.device, objects);

        let enc = self.device.encoder(ring as u32);

        enc.clear_color_image(
            self.screen_fb.color.image,
            [0.0; 4],
            &[ImageSubresourceRange::COLOR],
        );
        for fb in &self.scratch_fbs {
            enc.clear_color_image(fb.color.image, [0.0; 4], &[ImageSubresourceRange::COLOR]);
        }

        enc.clear_depth_stencil_image(
            self.screen_fb.depth_stencil.image,
            DepthStencil::default(),
            &[ImageSubresourceRange::DEPTH_STENCIL],
        );
        for fb in &self.scratch_fbs {
            enc.clear_depth_stencil_image(
                fb.depth_stencil.image,
                DepthStencil::default(),
                &[ImageSubresourceRange::DEPTH_STENCIL],
            );
        }

        Ok(())
    }

    /// Blit the screen framebuffer onto the acquired swapchain image (if
    /// any) and submit the frame.
    pub fn end_frame(&mut self, swapchain: Option<Swapchain>) -> Result<(), GpuError> {
        if let Some(swapchain) = swapchain {
            let state = self.device.get_swapchain_state(swapchain);
            if let Some(image_index) = state.current_image {
                let enc = self.encoder();
                enc.blit_image(
                    self.screen_fb.color.image,
                    state.images[image_index as usize],
                    &[ImageBlit {
                        src_layers: ImageSubresourceLayers::COLOR,
                        src_offsets: [
                            [0, 0, 0],
                            [self.screen_fb.extent.x, self.screen_fb.extent.y, 1],
                        ],
                        dst_layers: ImageSubresourceLayers::COLOR,
                        dst_offsets: [[0, 0, 0], [state.extent.x, state.extent.y, 1]],
                    }],
                    Filter::Linear,
                );
            }
        }
        self.device.submit_frame(swapchain)?;
        Ok(())
    }

    /// Tear the context down: everything it owns goes through the release
    /// queues, then the queues are drained under `wait_idle`.
    pub fn uninit(mut self) -> Result<(), GpuError> {
        self.release(self.default_image);
        for view in self.default_image_views {
            self.release(view);
        }
        self.release(self.texture_views);
        self.release(self.samplers);
        self.release(self.ubo_layout);
        self.release(self.ssbo_layout);
        self.release(self.textures_layout);
        self.release(self.samplers_layout);

        let screen = self.screen_fb;
        self.release_framebuffer(screen);
        for i in 0..NUM_SCRATCH_FRAMEBUFFERS {
            let fb = self.scratch_fbs[i];
            self.release_framebuffer(fb);
        }

        let samplers: Vec<Sampler> =
            self.sampler_cache.values().map(|c| c.sampler).collect();
        for sampler in samplers {
            self.release(sampler);
        }

        self.idle_reclaim()
    }
}

fn select_color_format(device: &dyn Device, use_hdr: bool) -> Result<Format, GpuError> {
    if use_hdr {
        for &format in HDR_COLOR_FORMATS {
            let props = device.get_format_properties(format);
            if props.optimal_tiling_features.contains(COLOR_FEATURES) {
                return Ok(format);
            }
        }
        tracing::warn!(
            "HDR mode requested but device does not support an HDR render target, trying UNORM color"
        );
    }

    for &format in SDR_COLOR_FORMATS {
        let props = device.get_format_properties(format);
        if props.optimal_tiling_features.contains(COLOR_FEATURES) {
            return Ok(format);
        }
    }

    Err(GpuError::NoColorFormat)
}

fn select_depth_stencil_format(device: &dyn Device) -> Result<Format, GpuError> {
    for &format in DEPTH_STENCIL_FORMATS {
        let props = device.get_format_properties(format);
        if props
            .optimal_tiling_features
            .contains(DEPTH_STENCIL_FEATURES)
        {
            return Ok(format);
        }
    }
    Err(GpuError::NoDepthStencilFormat)
}
