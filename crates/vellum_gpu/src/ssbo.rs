//! Host-visible storage buffer helper.
//!
//! One `Ssbo` backs one storage descriptor binding. `reserve` grows the
//! buffer and re-binds the descriptor; `copy` is the per-frame upload path.
//! The renderer keeps one set of these per ring slot, so a buffer being
//! replaced in `reserve` was last used `B` frames ago and can be destroyed
//! immediately.

use crate::backend::{
    BufferBinding, BufferDesc, BufferUsage, DescriptorSetUpdate, MemoryRange,
};
use crate::backend::{Buffer, DescriptorSet};
use crate::context::{GpuContext, GpuError};

/// A storage buffer plus the descriptor set exposing it at binding 0.
pub struct Ssbo {
    label: &'static str,
    buffer: Option<Buffer>,
    size: u64,
    descriptor: Option<DescriptorSet>,
}

impl Ssbo {
    pub const fn new(label: &'static str) -> Self {
        Self {
            label,
            buffer: None,
            size: 0,
            descriptor: None,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn buffer(&self) -> Option<Buffer> {
        self.buffer
    }

    /// Descriptor set bound to the current backing buffer.
    ///
    /// Panics before the first `reserve`/`copy`.
    pub fn descriptor(&self) -> DescriptorSet {
        self.descriptor.expect("ssbo used before reserve")
    }

    /// Ensure the backing buffer holds at least `size` bytes, reallocating
    /// and re-binding the storage descriptor when it doesn't.
    pub fn reserve(&mut self, ctx: &GpuContext, size: u64) -> Result<(), GpuError> {
        let size = size.max(1);
        if self.buffer.is_some() && self.size >= size {
            return Ok(());
        }

        if let Some(old) = self.buffer.take() {
            ctx.device().uninit_buffer(old);
        }

        let buffer = ctx.device().create_buffer(BufferDesc {
            label: self.label,
            size,
            host_mapped: true,
            usage: BufferUsage::STORAGE
                | BufferUsage::UNIFORM
                | BufferUsage::TRANSFER_SRC
                | BufferUsage::TRANSFER_DST,
        })?;
        self.buffer = Some(buffer);

        if self.descriptor.is_none() {
            self.descriptor = Some(ctx.device().create_descriptor_set(ctx.ssbo_layout, &[])?);
        }

        ctx.device().update_descriptor_set(DescriptorSetUpdate {
            set: self.descriptor,
            binding: 0,
            element: 0,
            images: &[],
            buffers: &[BufferBinding {
                buffer,
                offset: 0,
                size,
            }],
        });

        self.size = size;
        Ok(())
    }

    /// Upload `src` into the buffer: reserve, map, copy, flush, unmap.
    pub fn copy(&mut self, ctx: &GpuContext, src: &[u8]) -> Result<(), GpuError> {
        self.reserve(ctx, src.len() as u64)?;
        let buffer = self.buffer.expect("reserve populated the buffer");
        let data = ctx.device().map_buffer_memory(buffer)?;
        // Safety: the mapping spans `size >= src.len()` bytes and nothing
        // else aliases it while mapped.
        unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), data, src.len()) };
        ctx.device()
            .flush_mapped_buffer_memory(buffer, MemoryRange::WHOLE)?;
        ctx.device().unmap_buffer_memory(buffer);
        Ok(())
    }

    /// Defer buffer and descriptor destruction to the frame ring.
    pub fn release(&mut self, ctx: &mut GpuContext) {
        if let Some(buffer) = self.buffer.take() {
            ctx.release(buffer);
        }
        if let Some(descriptor) = self.descriptor.take() {
            ctx.release(descriptor);
        }
        self.size = 0;
    }

    /// Destroy immediately. Shutdown path only: the caller must know the
    /// buffer is not referenced by any in-flight frame.
    pub fn uninit(&mut self, ctx: &GpuContext) {
        if let Some(buffer) = self.buffer.take() {
            ctx.device().uninit_buffer(buffer);
        }
        if let Some(descriptor) = self.descriptor.take() {
            ctx.device().uninit_descriptor_set(descriptor);
        }
        self.size = 0;
    }
}
