use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::compositor::{CompositorConfig, DebugPass};
use crate::gpu::{GpuContext, GpuError};
use crate::hot_shader::{EditState, ShaderSession};
use crate::input::{Command, Input};
use crate::settings::ShaderPackage;
use crate::snapshot::{Snapshot, snapshot_path};
use crate::texture::TextureSlots;
use crate::viewer::Viewer;

const EXPOSURE_STEP: f32 = 0.1;
const GAMMA_STEP: f32 = 0.1;
const MIN_GAMMA: f32 = 0.1;

/// Window and file configuration for [`run`].
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Shader package to load at startup and write on save.
    pub settings_path: PathBuf,
    /// Shader file to open and watch instead of the package's code.
    pub shader_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "ShaderVis".to_string(),
            width: 1280,
            height: 720,
            settings_path: PathBuf::from("shadervis.yaml"),
            shader_path: None,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = path.into();
        self
    }

    pub fn shader_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.shader_path = Some(path.into());
        self
    }

    /// Build from command-line arguments, program name excluded:
    /// `[settings.yaml] [shader.wgsl]`.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter().map(Into::into);
        if let Some(settings) = args.next() {
            config = config.settings_path(settings);
        }
        if let Some(shader) = args.next() {
            config = config.shader_path(shader);
        }
        config
    }
}

/// Where a shader without a file is saved: next to the settings file, with
/// a `.wgsl` extension.
pub fn shader_path_for(settings_path: &Path) -> PathBuf {
    settings_path.with_extension("wgsl")
}

/// Longest compile error excerpt shown in the title bar.
const TITLE_ERROR_CHARS: usize = 80;

/// Window title: file, edit and compile status, the first line of any
/// compile error, the bloom view and the output size.
pub fn window_title(
    app: &str,
    file_name: &str,
    state: &EditState,
    bloom: Option<DebugPass>,
    size: (u32, u32),
) -> String {
    let mut title = format!(
        "{} - {}{} [{:?}]",
        app,
        file_name,
        if state.file_changed() { "*" } else { "" },
        state.status(),
    );
    if let Some(error) = state.error_summary() {
        let excerpt: String = error.chars().take(TITLE_ERROR_CHARS).collect();
        title.push_str(": ");
        title.push_str(&excerpt);
    }
    if let Some(pass) = bloom {
        title.push_str(&format!(" bloom: {}", pass.label()));
    }
    title.push_str(&format!(" {}x{}", size.0, size.1));
    title
}

/// Fatal errors from [`run`].
#[derive(Debug)]
pub enum AppError {
    EventLoop(winit::error::EventLoopError),
    Window(winit::error::OsError),
    Gpu(GpuError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::EventLoop(e) => write!(f, "Event loop error: {}", e),
            AppError::Window(e) => write!(f, "Failed to create window: {}", e),
            AppError::Gpu(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::EventLoop(e) => Some(e),
            AppError::Window(e) => Some(e),
            AppError::Gpu(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for AppError {
    fn from(e: winit::error::EventLoopError) -> Self {
        AppError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for AppError {
    fn from(e: winit::error::OsError) -> Self {
        AppError::Window(e)
    }
}

impl From<GpuError> for AppError {
    fn from(e: GpuError) -> Self {
        AppError::Gpu(e)
    }
}

/// Open the visualizer window and run until it is closed.
pub fn run(config: AppConfig) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ShaderVisApp::Pending { config };
    event_loop.run_app(&mut app)?;

    match app {
        ShaderVisApp::Failed(e) => Err(e),
        _ => Ok(()),
    }
}

/// Copies the viewport target onto the window surface.
struct Blit {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl Blit {
    fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blit Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blit Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Blit Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            pipeline,
            bind_group_layout,
            sampler,
        }
    }

    fn render(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        target: &wgpu::TextureView,
    ) {
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Blit Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

/// Everything alive while the window is open.
struct Session {
    window: Arc<Window>,
    gpu: GpuContext,
    input: Input,
    viewer: Viewer,
    shader: ShaderSession,
    channels: TextureSlots,
    package: ShaderPackage,
    settings_path: PathBuf,
    blit: Blit,
    title: String,
    shown_title: String,
    last_frame: Instant,
}

impl Session {
    fn new(config: &AppConfig, window: Arc<Window>) -> Result<Self, AppError> {
        let gpu = GpuContext::new(window.clone())?;

        let package = ShaderPackage::load_or_default(&config.settings_path).unwrap_or_else(|e| {
            log::warn!(
                "Failed to load settings from {:?}: {}; using defaults",
                config.settings_path,
                e
            );
            ShaderPackage::default()
        });

        let shader = match &config.shader_path {
            Some(path) => ShaderSession::open(&gpu, path).unwrap_or_else(|e| {
                log::warn!("Failed to open shader {:?}: {}", path, e);
                ShaderSession::from_code(&gpu, &package.code)
            }),
            None => ShaderSession::from_code(&gpu, &package.code),
        };

        let viewer = Viewer::new(
            &gpu,
            CompositorConfig::from_package(&package),
            (package.width, package.height),
            (gpu.width(), gpu.height()),
        );
        let channels = TextureSlots::new(&gpu, &package.textures);
        let blit = Blit::new(&gpu);

        Ok(Self {
            window,
            gpu,
            input: Input::new(),
            viewer,
            shader,
            channels,
            package,
            settings_path: config.settings_path.clone(),
            blit,
            title: config.title.clone(),
            shown_title: String::new(),
            last_frame: Instant::now(),
        })
    }

    fn apply(&mut self, command: Command) {
        let config = self.viewer.compositor_mut().config_mut();
        match command {
            Command::TogglePlaying => self.viewer.toggle_playing(),
            Command::ToggleBloom => {
                let enabled = !config.bloom_enabled();
                config.set_bloom_enabled(enabled);
                log::info!("Bloom {}", if enabled { "on" } else { "off" });
            }
            Command::CycleDebugPass => {
                let pass = config.debug_pass().next();
                config.set_debug_pass(pass);
                log::info!("Debug pass: {}", pass.label());
            }
            Command::Focus => self.viewer.focus(),
            Command::ExposureUp => {
                config.set_exposure(config.exposure() + EXPOSURE_STEP);
            }
            Command::ExposureDown => {
                config.set_exposure((config.exposure() - EXPOSURE_STEP).max(0.0));
            }
            Command::GammaUp => {
                config.set_gamma(config.gamma() + GAMMA_STEP);
            }
            Command::GammaDown => {
                config.set_gamma((config.gamma() - GAMMA_STEP).max(MIN_GAMMA));
            }
            Command::Recompile => {
                self.shader.compile(&self.gpu);
            }
            Command::Snapshot => self.snapshot(Path::new(".")),
            Command::Save => self.save(),
            Command::NewShader => self.shader.new_file(&self.gpu),
            Command::DoubleOutputSize => self.viewer.double_desired_size(),
            Command::HalveOutputSize => self.viewer.halve_desired_size(),
            Command::MatchViewport => self.viewer.match_viewport(),
        }
    }

    fn snapshot(&self, dir: &Path) {
        let output = self.viewer.compositor().output();
        let result = Snapshot::capture(&self.gpu, output)
            .and_then(|snapshot| snapshot.save_png(snapshot_path(dir)));
        if let Err(e) = result {
            log::warn!("Snapshot failed: {}", e);
        }
    }

    fn save(&mut self) {
        self.viewer
            .compositor()
            .config()
            .apply_to(&mut self.package);
        let (width, height) = self.viewer.state().desired_size();
        self.package.width = width;
        self.package.height = height;
        self.package.textures = self.channels.paths().clone();
        self.package.code = self.shader.code().to_string();

        if let Err(e) = self.package.save(&self.settings_path) {
            log::warn!("Failed to save settings: {}", e);
        }
        let saved = if self.shader.path().is_some() {
            self.shader.save().map(|_| ())
        } else {
            self.shader.save_as(shader_path_for(&self.settings_path))
        };
        if let Err(e) = saved {
            log::warn!("Failed to save shader: {}", e);
        }
    }

    fn update_title(&mut self) {
        let config = self.viewer.compositor().config();
        let bloom = config.bloom_enabled().then(|| config.debug_pass());
        let title = window_title(
            &self.title,
            &self.shader.file_name(),
            self.shader.state(),
            bloom,
            self.viewer.state().size(),
        );
        if title != self.shown_title {
            self.window.set_title(&title);
            self.shown_title = title;
        }
    }

    /// Returns `false` if rendering can no longer continue.
    fn redraw(&mut self) -> bool {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.shader.poll_file(&self.gpu);
        for command in self.input.commands() {
            self.apply(command);
        }
        let scroll = self.input.scroll_delta();
        if scroll != 0.0 {
            self.viewer.on_scroll(scroll);
        }
        self.input.begin_frame();

        self.viewer.update(&self.gpu, dt);
        self.update_title();

        let output = match self.gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost, reconfiguring");
                self.gpu.reconfigure();
                return true;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of GPU memory");
                return false;
            }
            Err(e) => {
                log::warn!("Skipping frame: {}", e);
                return true;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let program = self.shader.program().map(|p| p.as_ref());
        self.viewer
            .render(&self.gpu, &mut encoder, program, &self.channels);
        self.blit
            .render(&self.gpu, &mut encoder, self.viewer.output_view(), &view);

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        true
    }
}

enum ShaderVisApp {
    Pending { config: AppConfig },
    Running(Box<Session>),
    Failed(AppError),
}

impl ApplicationHandler for ShaderVisApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let ShaderVisApp::Pending { config } = self else {
            return;
        };

        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

        let session = event_loop
            .create_window(window_attrs)
            .map_err(AppError::from)
            .and_then(|window| Session::new(config, Arc::new(window)));

        match session {
            Ok(session) => {
                session.window.request_redraw();
                *self = ShaderVisApp::Running(Box::new(session));
            }
            Err(e) => {
                log::error!("{}", e);
                *self = ShaderVisApp::Failed(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let ShaderVisApp::Running(session) = self else {
            return;
        };

        session.input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                if session.shader.state().file_changed() && session.shader.path().is_some() {
                    log::warn!("Closing with unsaved changes to {}", session.shader.file_name());
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                session.gpu.resize(size.width, size.height);
                session
                    .viewer
                    .on_output_size_changed(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                if !session.redraw() {
                    event_loop.exit();
                    return;
                }
                session.window.request_redraw();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_args_uses_defaults() {
        let config = AppConfig::from_args(Vec::<String>::new());
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.settings_path, PathBuf::from("shadervis.yaml"));
        assert_eq!(config.shader_path, None);
    }

    #[test]
    fn args_set_settings_then_shader() {
        let config = AppConfig::from_args(["scene.yaml", "plasma.wgsl"]);
        assert_eq!(config.settings_path, PathBuf::from("scene.yaml"));
        assert_eq!(config.shader_path, Some(PathBuf::from("plasma.wgsl")));
    }

    #[test]
    fn shader_is_saved_beside_settings() {
        assert_eq!(
            shader_path_for(Path::new("scenes/plasma.yaml")),
            PathBuf::from("scenes/plasma.wgsl")
        );
        assert_eq!(
            shader_path_for(Path::new("shadervis")),
            PathBuf::from("shadervis.wgsl")
        );
    }

    #[test]
    fn title_shows_compile_error() {
        let mut state = EditState::new("fn pixel");
        state.record_compile(Err("\nerror: expected '('\n  at line 40".into()));

        let title = window_title("ShaderVis", "plasma.wgsl", &state, None, (800, 600));
        assert_eq!(
            title,
            "ShaderVis - plasma.wgsl [Failed]: error: expected '(' 800x600"
        );
    }

    #[test]
    fn title_truncates_long_errors() {
        let mut state = EditState::new("x");
        state.record_compile(Err("e".repeat(500)));
        let title = window_title("A", "Untitled", &state, None, (1, 1));
        assert!(title.contains(&"e".repeat(TITLE_ERROR_CHARS)));
        assert!(!title.contains(&"e".repeat(TITLE_ERROR_CHARS + 1)));
    }

    #[test]
    fn title_shows_bloom_view_and_status() {
        let mut state = EditState::new("a");
        state.record_compile(Ok(()));
        let title = window_title(
            "ShaderVis",
            "Untitled",
            &state,
            Some(DebugPass::ShowBlurPass),
            (256, 256),
        );
        assert_eq!(title, "ShaderVis - Untitled [Compiled] bloom: Blur Pass 256x256");
    }

    #[test]
    fn builder_overrides() {
        let config = AppConfig::new().title("Test").size(320, 200);
        assert_eq!(config.title, "Test");
        assert_eq!((config.width, config.height), (320, 200));
    }
}
