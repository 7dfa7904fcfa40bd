//! Headless backend for tests.
//!
//! [`HeadlessDevice`] implements [`Device`]/[`CommandEncoder`] without a
//! GPU: handles are counters, buffers are host memory, and every encoder
//! call lands in a per-ring command log that tests inspect. Destruction is
//! logged too, so the deferred-release properties of the frame context can
//! be asserted exactly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use rustc_hash::FxHashMap;
use vellum_core::{RectU, Vec2U};

use crate::backend::{
    BackendError, Buffer, BufferDesc, CommandEncoder, DepthStencil, DescriptorSet,
    DescriptorSetLayout, DescriptorSetLayoutDesc, DescriptorSetUpdate, Device, Filter, Format,
    FormatFeatures, FormatProperties, FrameContext, FrameId, Image, ImageBlit, ImageDesc,
    ImageSubresourceRange, ImageView, ImageViewDesc, MemoryRange, RenderingInfo, Sampler,
    SamplerDesc, Swapchain, SwapchainState, Viewport,
};

/// A recorded encoder command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    ClearColorImage {
        image: Image,
        color: [f32; 4],
    },
    ClearDepthStencilImage {
        image: Image,
        depth_stencil: DepthStencil,
    },
    BlitImage {
        src: Image,
        dst: Image,
        num_blits: usize,
        filter: Filter,
    },
    BeginRendering {
        render_extent: Vec2U,
    },
    EndRendering,
    SetViewport {
        offset_y: f32,
        extent_y: f32,
    },
    SetScissor {
        scissor: RectU,
    },
    BindDescriptorSets {
        sets: Vec<DescriptorSet>,
    },
    Draw {
        first_vertex: u32,
        num_vertices: u32,
        first_instance: u32,
        num_instances: u32,
    },
}

/// Command log for one ring slot.
#[derive(Default)]
pub struct HeadlessEncoder {
    commands: Mutex<Vec<Command>>,
}

impl HeadlessEncoder {
    fn push(&self, command: Command) {
        self.commands.lock().unwrap().push(command);
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    fn reset(&self) {
        self.commands.lock().unwrap().clear();
    }
}

impl CommandEncoder for HeadlessEncoder {
    fn clear_color_image(&self, image: Image, color: [f32; 4], _ranges: &[ImageSubresourceRange]) {
        self.push(Command::ClearColorImage { image, color });
    }

    fn clear_depth_stencil_image(
        &self,
        image: Image,
        depth_stencil: DepthStencil,
        _ranges: &[ImageSubresourceRange],
    ) {
        self.push(Command::ClearDepthStencilImage {
            image,
            depth_stencil,
        });
    }

    fn blit_image(&self, src: Image, dst: Image, blits: &[ImageBlit], filter: Filter) {
        self.push(Command::BlitImage {
            src,
            dst,
            num_blits: blits.len(),
            filter,
        });
    }

    fn begin_rendering(&self, info: RenderingInfo<'_>) {
        self.push(Command::BeginRendering {
            render_extent: info.render_extent,
        });
    }

    fn end_rendering(&self) {
        self.push(Command::EndRendering);
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.push(Command::SetViewport {
            offset_y: viewport.offset.y,
            extent_y: viewport.extent.y,
        });
    }

    fn set_scissor(&self, scissor: RectU) {
        self.push(Command::SetScissor { scissor });
    }

    fn bind_descriptor_sets(&self, sets: &[DescriptorSet]) {
        self.push(Command::BindDescriptorSets {
            sets: sets.to_vec(),
        });
    }

    fn draw(&self, first_vertex: u32, num_vertices: u32, first_instance: u32, num_instances: u32) {
        self.push(Command::Draw {
            first_vertex,
            num_vertices,
            first_instance,
            num_instances,
        });
    }
}

#[derive(Default)]
struct DeviceState {
    buffers: FxHashMap<u64, Box<[u8]>>,
    destroyed_images: Vec<Image>,
    destroyed_image_views: Vec<ImageView>,
    destroyed_buffers: Vec<Buffer>,
    destroyed_samplers: Vec<Sampler>,
    destroyed_sets: Vec<DescriptorSet>,
    destroyed_layouts: Vec<DescriptorSetLayout>,
    num_samplers_created: u64,
    descriptor_updates: u64,
    frame: u64,
    begun: bool,
    swapchain: SwapchainState,
}

/// A command-recording, GPU-free [`Device`].
pub struct HeadlessDevice {
    next_id: AtomicU64,
    buffering: u32,
    hdr_supported: bool,
    state: Mutex<DeviceState>,
    encoders: Vec<HeadlessEncoder>,
}

impl HeadlessDevice {
    pub fn new(buffering: u32) -> Self {
        Self::with_hdr(buffering, false)
    }

    pub fn with_hdr(buffering: u32, hdr_supported: bool) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            buffering,
            hdr_supported,
            state: Mutex::new(DeviceState::default()),
            encoders: (0..buffering).map(|_| HeadlessEncoder::default()).collect(),
        }
    }

    fn id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Script the swapchain state returned to `end_frame`.
    pub fn set_swapchain_state(&self, state: SwapchainState) {
        self.state.lock().unwrap().swapchain = state;
    }

    pub fn destroyed_images(&self) -> Vec<Image> {
        self.state.lock().unwrap().destroyed_images.clone()
    }

    pub fn destroyed_buffers(&self) -> Vec<Buffer> {
        self.state.lock().unwrap().destroyed_buffers.clone()
    }

    pub fn num_samplers_created(&self) -> u64 {
        self.state.lock().unwrap().num_samplers_created
    }

    pub fn num_descriptor_updates(&self) -> u64 {
        self.state.lock().unwrap().descriptor_updates
    }

    /// Contents of a live buffer.
    pub fn buffer_data(&self, buffer: Buffer) -> Vec<u8> {
        self.state.lock().unwrap().buffers[&buffer.0].to_vec()
    }

    /// Command log of the given ring slot.
    pub fn ring_commands(&self, ring_index: u32) -> Vec<Command> {
        self.encoders[ring_index as usize].commands()
    }
}

impl Device for HeadlessDevice {
    fn create_image(&self, _desc: ImageDesc) -> Result<Image, BackendError> {
        Ok(Image(self.id()))
    }

    fn create_image_view(&self, _desc: ImageViewDesc) -> Result<ImageView, BackendError> {
        Ok(ImageView(self.id()))
    }

    fn create_buffer(&self, desc: BufferDesc) -> Result<Buffer, BackendError> {
        let buffer = Buffer(self.id());
        self.state
            .lock()
            .unwrap()
            .buffers
            .insert(buffer.0, vec![0u8; desc.size as usize].into_boxed_slice());
        Ok(buffer)
    }

    fn create_sampler(&self, _desc: SamplerDesc) -> Result<Sampler, BackendError> {
        self.state.lock().unwrap().num_samplers_created += 1;
        Ok(Sampler(self.id()))
    }

    fn create_descriptor_set_layout(
        &self,
        _desc: DescriptorSetLayoutDesc,
    ) -> Result<DescriptorSetLayout, BackendError> {
        Ok(DescriptorSetLayout(self.id()))
    }

    fn create_descriptor_set(
        &self,
        _layout: DescriptorSetLayout,
        _variable_lengths: &[u32],
    ) -> Result<DescriptorSet, BackendError> {
        Ok(DescriptorSet(self.id()))
    }

    fn uninit_image(&self, image: Image) {
        self.state.lock().unwrap().destroyed_images.push(image);
    }

    fn uninit_image_view(&self, view: ImageView) {
        self.state.lock().unwrap().destroyed_image_views.push(view);
    }

    fn uninit_buffer(&self, buffer: Buffer) {
        let mut state = self.state.lock().unwrap();
        state.buffers.remove(&buffer.0);
        state.destroyed_buffers.push(buffer);
    }

    fn uninit_sampler(&self, sampler: Sampler) {
        self.state.lock().unwrap().destroyed_samplers.push(sampler);
    }

    fn uninit_descriptor_set_layout(&self, layout: DescriptorSetLayout) {
        self.state.lock().unwrap().destroyed_layouts.push(layout);
    }

    fn uninit_descriptor_set(&self, set: DescriptorSet) {
        self.state.lock().unwrap().destroyed_sets.push(set);
    }

    fn update_descriptor_set(&self, _update: DescriptorSetUpdate<'_>) {
        self.state.lock().unwrap().descriptor_updates += 1;
    }

    fn map_buffer_memory(&self, buffer: Buffer) -> Result<*mut u8, BackendError> {
        let mut state = self.state.lock().unwrap();
        let data = state
            .buffers
            .get_mut(&buffer.0)
            .ok_or(BackendError::DeviceLost)?;
        Ok(data.as_mut_ptr())
    }

    fn unmap_buffer_memory(&self, _buffer: Buffer) {}

    fn flush_mapped_buffer_memory(
        &self,
        _buffer: Buffer,
        _range: MemoryRange,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn get_format_properties(&self, format: Format) -> FormatProperties {
        let color = FormatFeatures::SAMPLED_IMAGE
            | FormatFeatures::STORAGE_IMAGE
            | FormatFeatures::COLOR_ATTACHMENT
            | FormatFeatures::TRANSFER_SRC
            | FormatFeatures::TRANSFER_DST;
        let depth = FormatFeatures::SAMPLED_IMAGE
            | FormatFeatures::DEPTH_STENCIL_ATTACHMENT
            | FormatFeatures::TRANSFER_SRC
            | FormatFeatures::TRANSFER_DST;

        let optimal_tiling_features = match format {
            Format::B8G8R8A8Unorm | Format::R8G8B8A8Unorm => color,
            Format::R16G16B16A16Sfloat | Format::R32G32B32A32Sfloat => {
                if self.hdr_supported {
                    color
                } else {
                    FormatFeatures::empty()
                }
            }
            Format::D16UnormS8Uint | Format::D24UnormS8Uint | Format::D32SfloatS8Uint => depth,
            Format::Undefined => FormatFeatures::empty(),
        };

        FormatProperties {
            optimal_tiling_features,
            ..Default::default()
        }
    }

    fn begin_frame(&self, _swapchain: Option<Swapchain>) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.begun {
            state.frame += 1;
        }
        state.begun = true;
        let ring = (state.frame % self.buffering as u64) as usize;
        self.encoders[ring].reset();
        Ok(())
    }

    fn submit_frame(&self, _swapchain: Option<Swapchain>) -> Result<(), BackendError> {
        Ok(())
    }

    fn get_frame_context(&self) -> FrameContext {
        let state = self.state.lock().unwrap();
        FrameContext {
            current: FrameId(state.frame),
            tail: FrameId(state.frame.saturating_sub(self.buffering as u64 - 1)),
            ring_index: (state.frame % self.buffering as u64) as u32,
            buffering: self.buffering,
        }
    }

    fn get_swapchain_state(&self, _swapchain: Swapchain) -> SwapchainState {
        self.state.lock().unwrap().swapchain.clone()
    }

    fn encoder(&self, ring_index: u32) -> &dyn CommandEncoder {
        &self.encoders[ring_index as usize]
    }

    fn wait_idle(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
