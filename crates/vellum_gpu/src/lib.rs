//! Vellum GPU
//!
//! The GPU layer of the engine, split in two:
//!
//! - [`backend`] — the abstract device model: opaque handles, descriptor
//!   structs, format/feature flags, and the [`backend::Device`] /
//!   [`backend::CommandEncoder`] traits a concrete binding implements
//! - [`context`] — [`GpuContext`], the frame-ring resource manager: format
//!   selection, bindless texture/sampler slots, default textures, screen and
//!   scratch framebuffers, the sampler cache, and deferred object release
//!   tied to frame lifetime
//!
//! [`headless`] provides a command-recording [`backend::Device`]
//! implementation so everything above the backend boundary is testable
//! without a GPU.

pub mod backend;
pub mod context;
pub mod headless;
pub mod ssbo;

pub use context::{
    CachedSampler, Framebuffer, GpuContext, GpuError, MAX_FRAME_BUFFERING, NUM_SAMPLER_SLOTS,
    NUM_SCRATCH_FRAMEBUFFERS, NUM_TEXTURE_SLOTS, SAMPLER_LINEAR, SAMPLER_LINEAR_CLAMPED,
    SAMPLER_NEAREST, SAMPLER_NEAREST_CLAMPED, TEXTURE_BLACK, TEXTURE_BLUE, TEXTURE_GREEN,
    TEXTURE_RED, TEXTURE_TRANSPARENT, TEXTURE_WHITE,
};
pub use ssbo::Ssbo;
