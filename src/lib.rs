//! # ShaderVis
//!
//! **A live pixel-shader visualizer with an HDR bloom compositor.**
//!
//! Write a WGSL pixel function, watch it render into an HDR target, and tune
//! bloom, exposure and gamma while it runs. Shader files are watched on disk
//! and recompiled on save; a failed compile keeps the last good frame on
//! screen.
//!
//! ## Quick Start
//!
//! ```no_run
//! use shadervis::*;
//!
//! fn main() -> Result<(), AppError> {
//!     init_logging(LoggingConfig::default());
//!     run(AppConfig::new().settings_path("plasma.yaml").shader_path("plasma.wgsl"))
//! }
//! ```
//!
//! ## Frame flow
//!
//! - The user shader writes an HDR color and an HDR bright-pass image.
//! - The bright image is blurred back and forth between two ping-pong targets.
//! - A composite pass tone-maps the scene, adds the bloom and writes the
//!   8-bit output, which is drawn as a sprite through an orthographic camera.
//!
//! Without a window, [`FramePlan`] and [`ShaderPackage`] can be used on their
//! own to inspect pass ordering and read or write shader packages.

mod app;
mod camera;
mod compositor;
mod gpu;
mod hot_shader;
mod input;
mod logging;
pub mod render_graph;
pub mod scene;
mod settings;
mod shader;
mod shader_factory;
mod snapshot;
mod sprite_pass;
mod texture;
mod viewer;

pub use app::{AppConfig, AppError, run};
pub use camera::{CameraUniforms, MIN_ORTHO_SIZE, OrthographicCamera};
pub use compositor::{Compositor, CompositorConfig, DebugPass, pass_uniforms};
pub use gpu::{GpuContext, GpuError};
pub use hot_shader::{CompileStatus, EditState, HotShader, ShaderSession};
pub use input::{Command, Input};
pub use logging::{LoggingConfig, init_logging};
pub use render_graph::{
    Attachment, FramePlan, HDR_FORMAT, LDR_FORMAT, PassDesc, PassExecutor, RenderContext,
    RenderTarget, TargetSlot,
};
pub use scene::{Color, RectTransform, Scene, Sprite};
pub use settings::{MAX_OUTPUT_SIZE, SettingsError, ShaderPackage};
pub use shader::{PassUniforms, ShaderError, ShaderProgram, validate_wgsl};
pub use shader_factory::{PixelShader, ShaderFactory, assemble_source};
pub use snapshot::{Snapshot, SnapshotError, snapshot_path};
pub use sprite_pass::SpritePass;
pub use texture::{
    CHANNEL_COUNT, CHANNEL_FORMAT, Texture, TextureError, TextureSlots, fits_device_limit,
};
pub use viewer::{ViewState, ViewUpdate, Viewer};

// Re-export glam math types for convenience
pub use glam::{Mat4, Vec2};

// Re-export commonly used winit types for convenience
pub use winit::keyboard::KeyCode;

pub use hecs::{Entity, World};
