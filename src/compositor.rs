//! HDR compositor: user shader, bloom blur, tonemap and composite.
//!
//! Each frame the [`Compositor`] builds a [`FramePlan`] from its
//! [`CompositorConfig`] and hands every pass to the [`PassExecutor`]. The end
//! product is the shader-output target, a display-ready `Rgba8Unorm` image
//! that the viewer presents on a sprite.

use std::rc::Rc;

use crate::gpu::GpuContext;
use crate::render_graph::{
    Attachment, FramePlan, HDR_FORMAT, LDR_FORMAT, PassDesc, PassExecutor, ProgramRef,
    RenderContext, TargetSet,
};
use crate::settings::ShaderPackage;
use crate::shader::{PassUniforms, ProgramDesc, ShaderProgram};
use crate::shader_factory::PixelShader;
use crate::texture::TextureSlots;

/// Which image the final pass shows when bloom is enabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DebugPass {
    /// Composite of the HDR color and the blurred bloom.
    #[default]
    Normal,
    /// The bright pass before blurring.
    ShowBrightPass,
    /// The final blurred buffer.
    ShowBlurPass,
}

impl DebugPass {
    /// Cycle to the next view.
    pub fn next(self) -> Self {
        match self {
            DebugPass::Normal => DebugPass::ShowBrightPass,
            DebugPass::ShowBrightPass => DebugPass::ShowBlurPass,
            DebugPass::ShowBlurPass => DebugPass::Normal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DebugPass::Normal => "Normal",
            DebugPass::ShowBrightPass => "Bright Pass",
            DebugPass::ShowBlurPass => "Blur Pass",
        }
    }
}

/// User-adjustable compositing parameters. Changes apply on the next frame.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositorConfig {
    bloom_enabled: bool,
    gamma: f32,
    exposure: f32,
    debug_pass: DebugPass,
    blur_iterations: u32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            bloom_enabled: false,
            gamma: 2.2,
            exposure: 1.0,
            debug_pass: DebugPass::Normal,
            blur_iterations: 10,
        }
    }
}

impl CompositorConfig {
    /// Seed the config from a loaded shader package.
    pub fn from_package(package: &ShaderPackage) -> Self {
        let mut config = Self::default();
        config.set_bloom_enabled(package.bloom_enabled);
        config.set_gamma(package.gamma);
        config.set_exposure(package.exposure);
        config
    }

    /// Write the persisted parts of the config back into `package`.
    pub fn apply_to(&self, package: &mut ShaderPackage) {
        package.bloom_enabled = self.bloom_enabled;
        package.gamma = self.gamma;
        package.exposure = self.exposure;
    }

    pub fn bloom_enabled(&self) -> bool {
        self.bloom_enabled
    }

    pub fn set_bloom_enabled(&mut self, enabled: bool) {
        self.bloom_enabled = enabled;
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Set gamma. Non-finite values are rejected and the previous value kept.
    pub fn set_gamma(&mut self, gamma: f32) -> bool {
        if !gamma.is_finite() {
            log::warn!("Ignoring non-finite gamma {}", gamma);
            return false;
        }
        self.gamma = gamma;
        true
    }

    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    /// Set exposure. Non-finite values are rejected and the previous value
    /// kept.
    pub fn set_exposure(&mut self, exposure: f32) -> bool {
        if !exposure.is_finite() {
            log::warn!("Ignoring non-finite exposure {}", exposure);
            return false;
        }
        self.exposure = exposure;
        true
    }

    pub fn debug_pass(&self) -> DebugPass {
        self.debug_pass
    }

    pub fn set_debug_pass(&mut self, debug_pass: DebugPass) {
        self.debug_pass = debug_pass;
    }

    pub fn blur_iterations(&self) -> u32 {
        self.blur_iterations
    }

    pub fn set_blur_iterations(&mut self, iterations: u32) {
        self.blur_iterations = iterations;
    }
}

/// Owns the offscreen targets and built-in programs of the bloom chain.
pub struct Compositor {
    config: CompositorConfig,
    targets: TargetSet,
    executor: PassExecutor,
    blur: ShaderProgram,
    composite: ShaderProgram,
    debug: ShaderProgram,
}

impl Compositor {
    pub fn new(gpu: &GpuContext, config: CompositorConfig, width: u32, height: u32) -> Self {
        let blur = ShaderProgram::new(
            gpu,
            &ProgramDesc {
                label: "Blur",
                source: include_str!("shaders/blur.wgsl"),
                fragment_entry: "fs",
                inputs: 1,
                targets: &[HDR_FORMAT],
            },
        );
        let composite = ShaderProgram::new(
            gpu,
            &ProgramDesc {
                label: "Composite",
                source: include_str!("shaders/composite.wgsl"),
                fragment_entry: "fs",
                inputs: 2,
                targets: &[LDR_FORMAT],
            },
        );
        let debug = ShaderProgram::new(
            gpu,
            &ProgramDesc {
                label: "Debug View",
                source: include_str!("shaders/debug.wgsl"),
                fragment_entry: "fs",
                inputs: 1,
                targets: &[LDR_FORMAT],
            },
        );

        // user pass + blur iterations + composite
        let capacity = config.blur_iterations() + 2;

        Self {
            config,
            targets: TargetSet::new(gpu, width, height),
            executor: PassExecutor::new(gpu, capacity),
            blur,
            composite,
            debug,
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CompositorConfig {
        &mut self.config
    }

    /// Resize every offscreen target. Returns `true` if anything was
    /// reallocated, in which case [`output`](Self::output) handles must be
    /// re-fetched.
    pub fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) -> bool {
        self.targets.resize(gpu, width, height)
    }

    /// The shader-output attachment, display-ready.
    pub fn output(&self) -> &Rc<Attachment> {
        self.targets.shader_output.attachment(0)
    }

    /// The passes the next frame would run.
    pub fn plan(&self, shader_ready: bool) -> FramePlan {
        FramePlan::build(&self.config, shader_ready)
    }

    /// Record one frame into `ctx.encoder`. Returns the number of passes
    /// recorded; zero when no user shader is ready, leaving the shader output
    /// untouched.
    pub fn render(
        &mut self,
        ctx: &mut RenderContext,
        shader: Option<&PixelShader>,
        channels: &TextureSlots,
    ) -> usize {
        let plan = self.plan(shader.is_some());
        if plan.is_empty() {
            return 0;
        }

        self.executor.begin_frame(ctx.gpu, plan.len() as u32);
        let channel_views = channels.views();

        let mut recorded = 0;
        for pass in plan.passes() {
            let program = match pass.program {
                ProgramRef::UserHdr => shader.map(|s| &s.hdr),
                ProgramRef::UserLdr => shader.map(|s| &s.ldr),
                ProgramRef::Blur => Some(&self.blur),
                ProgramRef::Composite => Some(&self.composite),
                ProgramRef::Debug => Some(&self.debug),
            };

            let inputs: Vec<&wgpu::TextureView> = if pass.program.is_user() {
                channel_views.clone()
            } else {
                pass.inputs.iter().map(|&i| self.targets.view(i)).collect()
            };

            let target = self.targets.get(pass.target);
            let uniforms = pass_uniforms(pass, target.extent(), ctx.time);

            if self
                .executor
                .run(ctx, pass.label, program, target, &inputs, &uniforms)
            {
                recorded += 1;
            }
        }
        recorded
    }
}

/// Uniforms for `pass` rendering into a target of `extent`.
pub fn pass_uniforms(pass: &PassDesc, extent: (u32, u32), time: f32) -> PassUniforms {
    PassUniforms {
        resolution: [extent.0 as f32, extent.1 as f32],
        time,
        gamma: pass.params.gamma,
        exposure: pass.params.exposure,
        horizontal: pass.params.horizontal as u32,
        _pad: [0.0; 2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CompositorConfig::default();
        assert!(!config.bloom_enabled());
        assert_eq!(config.gamma(), 2.2);
        assert_eq!(config.exposure(), 1.0);
        assert_eq!(config.debug_pass(), DebugPass::Normal);
        assert_eq!(config.blur_iterations(), 10);
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut config = CompositorConfig::default();
        assert!(!config.set_gamma(f32::NAN));
        assert!(!config.set_exposure(f32::INFINITY));
        assert_eq!(config.gamma(), 2.2);
        assert_eq!(config.exposure(), 1.0);

        assert!(config.set_exposure(0.5));
        assert_eq!(config.exposure(), 0.5);
    }

    #[test]
    fn debug_pass_cycles() {
        let mut pass = DebugPass::Normal;
        pass = pass.next();
        assert_eq!(pass, DebugPass::ShowBrightPass);
        pass = pass.next();
        assert_eq!(pass, DebugPass::ShowBlurPass);
        assert_eq!(pass.next(), DebugPass::Normal);
    }

    #[test]
    fn package_round_trip() {
        let mut package = ShaderPackage::default();
        package.bloom_enabled = true;
        package.gamma = 1.8;
        package.exposure = 2.5;

        let mut config = CompositorConfig::from_package(&package);
        assert!(config.bloom_enabled());
        assert_eq!(config.gamma(), 1.8);
        assert_eq!(config.exposure(), 2.5);

        config.set_bloom_enabled(false);
        config.apply_to(&mut package);
        assert!(!package.bloom_enabled);
        assert_eq!(package.gamma, 1.8);
    }

    #[test]
    fn uniforms_follow_pass_params() {
        let mut config = CompositorConfig::default();
        config.set_bloom_enabled(true);
        let plan = FramePlan::build(&config, true);

        let first_blur = &plan.passes()[1];
        let uniforms = pass_uniforms(first_blur, (640, 480), 3.5);
        assert_eq!(uniforms.resolution, [640.0, 480.0]);
        assert_eq!(uniforms.time, 3.5);
        assert_eq!(uniforms.horizontal, 1);
        assert_eq!(uniforms.gamma, 2.2);

        let second_blur = &plan.passes()[2];
        assert_eq!(pass_uniforms(second_blur, (640, 480), 0.0).horizontal, 0);
    }
}
