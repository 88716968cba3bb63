//! Assembly and compilation of user pixel shaders.

use std::rc::Rc;

use crate::gpu::GpuContext;
use crate::render_graph::{HDR_FORMAT, LDR_FORMAT};
use crate::shader::{ProgramDesc, ShaderError, ShaderProgram, compile_checked, validate_wgsl};
use crate::texture::CHANNEL_COUNT;

/// Declarations and entry points wrapped around every user pixel function.
pub const PREAMBLE: &str = include_str!("shaders/pixel_preamble.wgsl");

/// Pixel function shown for a new, untitled shader.
pub const DEFAULT_PIXEL_CODE: &str = include_str!("shaders/default_pixel.wgsl");

/// Prepend the preamble to user code.
pub fn assemble_source(code: &str) -> String {
    let mut source = String::with_capacity(PREAMBLE.len() + code.len() + 1);
    source.push_str(PREAMBLE);
    source.push('\n');
    source.push_str(code);
    source
}

/// Line in the assembled source where user code starts (1-based).
pub fn user_line_offset() -> usize {
    PREAMBLE.matches('\n').count() + 2
}

/// A user pixel shader compiled for both compositor paths.
pub struct PixelShader {
    /// Writes color and bright-pass attachments for the bloom chain.
    pub hdr: ShaderProgram,
    /// Writes straight to the display-ready shader output.
    pub ldr: ShaderProgram,
}

/// Compiles user pixel code into [`PixelShader`]s.
pub struct ShaderFactory;

impl ShaderFactory {
    /// Validate and compile `code`.
    ///
    /// The error's `Display` output is the message shown to the user; it
    /// points into the assembled source, which starts
    /// [`user_line_offset`] lines before the user's first line.
    pub fn compile_from_source(
        gpu: &GpuContext,
        code: &str,
    ) -> Result<Rc<PixelShader>, ShaderError> {
        let source = assemble_source(code);
        validate_wgsl(&source)?;

        let shader = compile_checked(gpu, || PixelShader {
            hdr: ShaderProgram::new(
                gpu,
                &ProgramDesc {
                    label: "User Shader (HDR)",
                    source: &source,
                    fragment_entry: "fs_hdr",
                    inputs: CHANNEL_COUNT,
                    targets: &[HDR_FORMAT, HDR_FORMAT],
                },
            ),
            ldr: ShaderProgram::new(
                gpu,
                &ProgramDesc {
                    label: "User Shader",
                    source: &source,
                    fragment_entry: "fs_ldr",
                    inputs: CHANNEL_COUNT,
                    targets: &[LDR_FORMAT],
                },
            ),
        })?;

        log::info!("Compiled user shader ({} bytes)", code.len());
        Ok(Rc::new(shader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembled_source_wraps_user_code() {
        let source = assemble_source("fn pixel(uv: vec2f, p: vec2f) -> vec4f { return vec4f(1.0); }");
        assert!(source.starts_with(PREAMBLE));
        assert!(source.ends_with("return vec4f(1.0); }"));
    }

    #[test]
    fn default_code_validates() {
        assert!(validate_wgsl(&assemble_source(DEFAULT_PIXEL_CODE)).is_ok());
    }

    #[test]
    fn preamble_helpers_are_visible_to_user_code() {
        let code = r#"
            fn pixel(uv: vec2f, pixcoord: vec2f) -> vec4f {
                let wave = 0.5 + 0.5 * sin(u.time + uv.x * MATH_TAU);
                let tex = textureSample(channel3, channel_sampler, uv);
                return vec4f(wave * tex.rgb, 1.0);
            }
        "#;
        assert!(validate_wgsl(&assemble_source(code)).is_ok());
    }

    #[test]
    fn missing_pixel_function_fails() {
        let err = validate_wgsl(&assemble_source("fn other() {}")).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Parse(_) | ShaderError::Validation(_)
        ));
    }

    #[test]
    fn syntax_errors_fail() {
        let code = "fn pixel(uv: vec2f, pixcoord: vec2f) -> vec4f { return vec4f(uv; }";
        assert!(validate_wgsl(&assemble_source(code)).is_err());
    }

    #[test]
    fn user_code_starts_after_preamble() {
        let source = assemble_source("// first user line");
        let line = source.lines().nth(user_line_offset() - 1);
        assert_eq!(line, Some("// first user line"));
    }
}
