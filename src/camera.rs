use glam::{Mat4, Vec2};

/// Smallest ortho size scroll zoom can reach.
pub const MIN_ORTHO_SIZE: f32 = 10.0;

/// Camera data uploaded for the sprite pass.
///
/// # WGSL Declaration
///
/// ```wgsl
/// struct Camera {
///     view_proj: mat4x4f,
///     viewport: vec4f,
/// }
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// Shader output size in `xy`.
    pub viewport: [f32; 4],
}

/// A 2D orthographic camera looking down -Z.
///
/// `ortho_size` is the vertical half-extent of the view in world units; the
/// horizontal half-extent is `ortho_size * aspect`.
#[derive(Clone, Copy, Debug)]
pub struct OrthographicCamera {
    pub position: Vec2,
    aspect: f32,
    ortho_size: f32,
    zoom_modifier: f32,
}

impl Default for OrthographicCamera {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            aspect: 1.0,
            ortho_size: 500.0,
            zoom_modifier: 10.0,
        }
    }
}

impl OrthographicCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the aspect ratio from a viewport size in pixels.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    /// Fit a `width`×`height` rectangle: ortho size becomes the larger side.
    /// Unlike [`zoom`](Self::zoom) this is not floored.
    pub fn focus(&mut self, width: u32, height: u32) {
        self.ortho_size = width.max(height) as f32;
    }

    /// Scroll zoom. Positive `delta` zooms in. Never goes below
    /// [`MIN_ORTHO_SIZE`].
    pub fn zoom(&mut self, delta: f32) {
        self.ortho_size = (self.ortho_size - delta * self.zoom_modifier).max(MIN_ORTHO_SIZE);
    }

    pub fn ortho_size(&self) -> f32 {
        self.ortho_size
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn projection(&self) -> Mat4 {
        let half_h = self.ortho_size;
        let half_w = self.ortho_size * self.aspect;
        Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, -1.0, 1.0)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_translation(-self.position.extend(0.0))
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Uniforms for a viewport showing an output of `output_size` pixels.
    pub fn uniforms(&self, output_size: (u32, u32)) -> CameraUniforms {
        CameraUniforms {
            view_proj: self.view_projection().to_cols_array_2d(),
            viewport: [output_size.0 as f32, output_size.1 as f32, 0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_ndc(camera: &OrthographicCamera, world: Vec2) -> Vec2 {
        let clip = camera.view_projection() * world.extend(0.0).extend(1.0);
        Vec2::new(clip.x, clip.y) / clip.w
    }

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn zoom_never_goes_below_floor() {
        let mut camera = OrthographicCamera::new();
        camera.zoom(1000.0);
        assert_eq!(camera.ortho_size(), MIN_ORTHO_SIZE);

        camera.zoom(1.0);
        assert_eq!(camera.ortho_size(), MIN_ORTHO_SIZE);
    }

    #[test]
    fn zoom_scales_by_modifier() {
        let mut camera = OrthographicCamera::new();
        camera.focus(800, 600);
        camera.zoom(2.0);
        assert_eq!(camera.ortho_size(), 780.0);
        camera.zoom(-3.0);
        assert_eq!(camera.ortho_size(), 810.0);
    }

    #[test]
    fn focus_uses_larger_side() {
        let mut camera = OrthographicCamera::new();
        camera.focus(320, 1024);
        assert_eq!(camera.ortho_size(), 1024.0);
        camera.focus(1, 1);
        assert_eq!(camera.ortho_size(), 1.0);
    }

    #[test]
    fn zoom_after_tiny_focus_returns_to_floor() {
        let mut camera = OrthographicCamera::new();
        camera.focus(4, 2);
        assert_eq!(camera.ortho_size(), 4.0);
        camera.zoom(-1.0);
        assert_eq!(camera.ortho_size(), 14.0);
        camera.zoom(1.0);
        assert_eq!(camera.ortho_size(), MIN_ORTHO_SIZE);
    }

    #[test]
    fn ortho_size_is_vertical_half_extent() {
        let mut camera = OrthographicCamera::new();
        camera.set_viewport(200, 100);
        camera.focus(100, 50);

        assert!(approx(to_ndc(&camera, Vec2::new(0.0, 100.0)), Vec2::new(0.0, 1.0)));
        assert!(approx(to_ndc(&camera, Vec2::new(200.0, 0.0)), Vec2::new(1.0, 0.0)));
        assert!(approx(to_ndc(&camera, Vec2::new(-200.0, -100.0)), Vec2::new(-1.0, -1.0)));
    }

    #[test]
    fn view_follows_position() {
        let mut camera = OrthographicCamera::new();
        camera.position = Vec2::new(50.0, 0.0);
        camera.focus(50, 50);
        assert!(approx(to_ndc(&camera, Vec2::new(50.0, 0.0)), Vec2::ZERO));
    }

    #[test]
    fn degenerate_viewport_keeps_aspect_finite() {
        let mut camera = OrthographicCamera::new();
        camera.set_viewport(0, 0);
        assert_eq!(camera.aspect(), 1.0);
        camera.set_viewport(1600, 800);
        assert_eq!(camera.aspect(), 2.0);
    }

    #[test]
    fn uniforms_carry_viewport() {
        let camera = OrthographicCamera::new();
        let uniforms = camera.uniforms((640, 480));
        assert_eq!(uniforms.viewport, [640.0, 480.0, 0.0, 0.0]);
        assert_eq!(std::mem::size_of::<CameraUniforms>(), 80);
    }
}
