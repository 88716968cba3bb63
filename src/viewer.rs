//! The viewer: shader output composited, placed on a sprite and viewed
//! through an orthographic camera.
//!
//! Size changes are requested at any time but applied only in
//! [`Viewer::update`], between frames.

use hecs::Entity;

use crate::camera::OrthographicCamera;
use crate::compositor::{Compositor, CompositorConfig};
use crate::gpu::GpuContext;
use crate::render_graph::{LDR_FORMAT, RenderContext, RenderTarget, clamp_extent};
use crate::scene::{Color, RectTransform, Scene, Sprite};
use crate::settings::MAX_OUTPUT_SIZE;
use crate::shader_factory::PixelShader;
use crate::sprite_pass::SpritePass;
use crate::texture::TextureSlots;

/// Resizes to apply this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewUpdate {
    /// New shader output size.
    pub shader_resized: Option<(u32, u32)>,
    /// New viewport size.
    pub viewport_resized: Option<(u32, u32)>,
}

/// Size, playback and camera bookkeeping of the viewer.
#[derive(Clone, Debug)]
pub struct ViewState {
    size: (u32, u32),
    desired_size: (u32, u32),
    output_size: (u32, u32),
    output_size_changed: bool,
    playing: bool,
    camera: OrthographicCamera,
}

impl ViewState {
    /// State for a shader output of `desired_size` shown in a viewport of
    /// `output_size`. Both are applied by the first [`update`](Self::update).
    pub fn new(desired_size: (u32, u32), output_size: (u32, u32)) -> Self {
        let mut state = Self {
            size: (1, 1),
            desired_size: (1, 1),
            output_size: (1, 1),
            output_size_changed: false,
            playing: true,
            camera: OrthographicCamera::new(),
        };
        state.set_desired_size(desired_size.0 as i64, desired_size.1 as i64);
        state.on_output_size_changed(output_size.0, output_size.1);
        state
    }

    /// Request a shader output size, clamped to `1..=4096` per axis.
    pub fn set_desired_size(&mut self, width: i64, height: i64) {
        let clamp = |v: i64| v.clamp(1, MAX_OUTPUT_SIZE as i64) as u32;
        self.desired_size = (clamp(width), clamp(height));
    }

    /// Request double the current desired size, clamped like
    /// [`set_desired_size`](Self::set_desired_size).
    pub fn double_desired_size(&mut self) {
        let (width, height) = self.desired_size;
        self.set_desired_size(width as i64 * 2, height as i64 * 2);
    }

    /// Request half the current desired size, rounded down and clamped.
    pub fn halve_desired_size(&mut self) {
        let (width, height) = self.desired_size;
        self.set_desired_size(width as i64 / 2, height as i64 / 2);
    }

    /// Request a shader output the size of the viewport.
    pub fn match_viewport(&mut self) {
        let (width, height) = self.output_size;
        self.set_desired_size(width as i64, height as i64);
    }

    /// Record a new viewport size.
    pub fn on_output_size_changed(&mut self, width: u32, height: u32) {
        if (width, height) != self.output_size {
            self.output_size = (width, height);
            self.output_size_changed = true;
        }
    }

    /// Apply pending size changes.
    pub fn update(&mut self) -> ViewUpdate {
        let mut update = ViewUpdate::default();

        if self.desired_size != self.size {
            self.size = self.desired_size;
            update.shader_resized = Some(self.size);
            self.focus();
        }

        if self.output_size_changed {
            self.output_size_changed = false;
            let (width, height) = clamp_extent(self.output_size.0 as i64, self.output_size.1 as i64);
            update.viewport_resized = Some((width, height));
            self.camera.set_viewport(width, height);
            self.focus();
        }

        update
    }

    /// Fit the camera to the shader output.
    pub fn focus(&mut self) {
        self.camera.focus(self.size.0, self.size.1);
    }

    pub fn on_scroll(&mut self, delta: f32) {
        self.camera.zoom(delta);
    }

    pub fn toggle_playing(&mut self) {
        self.playing = !self.playing;
    }

    pub fn playing(&self) -> bool {
        self.playing
    }

    /// Current shader output size.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn desired_size(&self) -> (u32, u32) {
        self.desired_size
    }

    pub fn output_size(&self) -> (u32, u32) {
        self.output_size
    }

    pub fn camera(&self) -> &OrthographicCamera {
        &self.camera
    }
}

/// Owns the compositor and the scene that presents its output.
pub struct Viewer {
    state: ViewState,
    scene: Scene,
    sprite: Entity,
    sprite_pass: SpritePass,
    viewport: RenderTarget,
    compositor: Compositor,
}

impl Viewer {
    pub fn new(
        gpu: &GpuContext,
        config: CompositorConfig,
        desired_size: (u32, u32),
        output_size: (u32, u32),
    ) -> Self {
        let state = ViewState::new(desired_size, output_size);
        let (width, height) = state.size();
        let compositor = Compositor::new(gpu, config, width, height);

        let mut scene = Scene::new();
        let sprite = scene.spawn_sprite(
            "Sprite_01",
            RectTransform::cover(width, height),
            Sprite::new(compositor.output().clone()),
        );

        let (vw, vh) = state.output_size();
        let viewport = RenderTarget::new(gpu, "Viewport", &[LDR_FORMAT], vw, vh);

        Self {
            state,
            scene,
            sprite,
            sprite_pass: SpritePass::new(gpu, LDR_FORMAT),
            viewport,
            compositor,
        }
    }

    /// Apply pending resizes and advance the scene while playing.
    pub fn update(&mut self, gpu: &GpuContext, dt: f32) {
        let update = self.state.update();

        if let Some((width, height)) = update.shader_resized {
            log::debug!("Shader output resized to {}x{}", width, height);
            self.compositor.resize(gpu, width, height);
            self.scene
                .set_rect(self.sprite, RectTransform::cover(width, height));
            // The old attachment handle is stale after a resize
            self.scene
                .set_texture(self.sprite, self.compositor.output().clone());
        }

        if let Some((width, height)) = update.viewport_resized {
            self.viewport.resize(gpu, width, height);
        }

        if self.state.playing() {
            self.scene.computations(dt);
        }
    }

    /// Record the compositor passes and the sprite pass into `encoder`.
    /// Returns the number of compositor passes recorded.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        shader: Option<&PixelShader>,
        channels: &TextureSlots,
    ) -> usize {
        let mut ctx = RenderContext {
            gpu,
            encoder: &mut *encoder,
            time: self.scene.time(),
        };
        let recorded = self.compositor.render(&mut ctx, shader, channels);

        let camera = self.state.camera().uniforms(self.state.size());
        let quads = self.scene.quads();
        self.sprite_pass.render(
            gpu,
            encoder,
            &self.viewport,
            &camera,
            &quads,
            Color::BACKGROUND,
        );
        recorded
    }

    /// The viewport image, ready to present.
    pub fn output_view(&self) -> &wgpu::TextureView {
        self.viewport.view(0)
    }

    pub fn on_output_size_changed(&mut self, width: u32, height: u32) {
        self.state.on_output_size_changed(width, height);
    }

    pub fn on_scroll(&mut self, delta: f32) {
        self.state.on_scroll(delta);
    }

    pub fn double_desired_size(&mut self) {
        self.state.double_desired_size();
    }

    pub fn halve_desired_size(&mut self) {
        self.state.halve_desired_size();
    }

    pub fn match_viewport(&mut self) {
        self.state.match_viewport();
    }

    pub fn focus(&mut self) {
        self.state.focus();
    }

    pub fn toggle_playing(&mut self) {
        self.state.toggle_playing();
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor {
        &mut self.compositor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_applies_both_sizes() {
        let mut state = ViewState::new((800, 600), (1280, 720));
        let update = state.update();
        assert_eq!(update.shader_resized, Some((800, 600)));
        assert_eq!(update.viewport_resized, Some((1280, 720)));
        assert_eq!(state.size(), (800, 600));
        assert_eq!(state.camera().ortho_size(), 800.0);

        assert_eq!(state.update(), ViewUpdate::default());
    }

    #[test]
    fn desired_size_is_clamped() {
        let mut state = ViewState::new((800, 600), (100, 100));
        state.set_desired_size(0, 10_000);
        assert_eq!(state.desired_size(), (1, MAX_OUTPUT_SIZE));
        state.set_desired_size(-5, 300);
        assert_eq!(state.desired_size(), (1, 300));
    }

    #[test]
    fn shader_resize_refocuses_camera() {
        let mut state = ViewState::new((800, 600), (100, 100));
        state.update();
        state.on_scroll(20.0);
        assert_eq!(state.camera().ortho_size(), 600.0);

        state.set_desired_size(256, 1024);
        let update = state.update();
        assert_eq!(update.shader_resized, Some((256, 1024)));
        assert_eq!(update.viewport_resized, None);
        assert_eq!(state.camera().ortho_size(), 1024.0);
    }

    #[test]
    fn viewport_resize_updates_aspect_and_refocuses() {
        let mut state = ViewState::new((800, 600), (100, 100));
        state.update();
        state.on_scroll(5.0);

        state.on_output_size_changed(1600, 800);
        let update = state.update();
        assert_eq!(update.viewport_resized, Some((1600, 800)));
        assert_eq!(state.camera().aspect(), 2.0);
        assert_eq!(state.camera().ortho_size(), 800.0);
    }

    #[test]
    fn same_viewport_size_is_not_a_change() {
        let mut state = ViewState::new((800, 600), (640, 480));
        state.update();
        state.on_output_size_changed(640, 480);
        assert_eq!(state.update().viewport_resized, None);
    }

    #[test]
    fn zero_viewport_is_clamped() {
        let mut state = ViewState::new((800, 600), (640, 480));
        state.update();
        state.on_output_size_changed(0, 0);
        assert_eq!(state.update().viewport_resized, Some((1, 1)));
    }

    #[test]
    fn scroll_zoom_floors_at_ten() {
        let mut state = ViewState::new((800, 600), (640, 480));
        state.update();
        for _ in 0..200 {
            state.on_scroll(1.0);
        }
        assert_eq!(state.camera().ortho_size(), 10.0);
        state.focus();
        assert_eq!(state.camera().ortho_size(), 800.0);
    }

    #[test]
    fn doubling_and_halving_go_through_clamp() {
        let mut state = ViewState::new((800, 600), (640, 480));
        state.update();

        state.double_desired_size();
        assert_eq!(state.desired_size(), (1600, 1200));
        state.double_desired_size();
        state.double_desired_size();
        assert_eq!(state.desired_size(), (MAX_OUTPUT_SIZE, MAX_OUTPUT_SIZE));

        let mut state = ViewState::new((3, 1), (640, 480));
        state.halve_desired_size();
        assert_eq!(state.desired_size(), (1, 1));
    }

    #[test]
    fn requested_size_change_resizes_on_next_update() {
        let mut state = ViewState::new((800, 600), (640, 480));
        state.update();

        state.halve_desired_size();
        assert_eq!(state.size(), (800, 600));
        let update = state.update();
        assert_eq!(update.shader_resized, Some((400, 300)));
        assert_eq!(state.camera().ortho_size(), 400.0);
    }

    #[test]
    fn match_viewport_uses_output_size() {
        let mut state = ViewState::new((800, 600), (1280, 720));
        state.update();
        state.match_viewport();
        assert_eq!(state.update().shader_resized, Some((1280, 720)));

        state.on_output_size_changed(0, 0);
        state.match_viewport();
        assert_eq!(state.desired_size(), (1, 1));
    }

    #[test]
    fn playback_toggles() {
        let mut state = ViewState::new((1, 1), (1, 1));
        assert!(state.playing());
        state.toggle_playing();
        assert!(!state.playing());
    }
}
