//! Offscreen targets, frame plans and pass execution for the compositor.
//!
//! The compositor renders a frame in two steps. First it builds a
//! [`FramePlan`], a GPU-free list of full-screen passes naming which program
//! runs, which [`TargetSlot`] it writes and which attachments it samples.
//! Then the [`PassExecutor`] walks the plan, clearing each target and drawing
//! a full-screen triangle into it.
//!
//! ```text
//! ┌──────────┐    ┌────────────┐    ┌────────────┐    ┌───────────────┐
//! │  User    │───▶│ Blur (h)   │───▶│ Blur (v)   │───▶│  Composite    │
//! │  (HDR)   │    │ Bright ▶ A │    │   A ▶ B    │ …  │ HDR + blur ▶  │
//! └──────────┘    └────────────┘    └────────────┘    │ ShaderOutput  │
//!                                                      └───────────────┘
//! ```

mod executor;
pub mod ping_pong;
pub mod plan;
mod render_target;

pub use executor::{PassExecutor, RenderContext, UniformArena, slot_offset};
pub use ping_pong::{BlurSource, BlurStep, PingPong, PingPongSlot, blur_steps};
pub use plan::{FramePlan, InputRef, PassDesc, PassParams, ProgramRef, TargetSlot};
pub use render_target::{
    Attachment, HDR_FORMAT, LDR_FORMAT, RenderTarget, TargetSet, clamp_extent, resize_extent,
};
