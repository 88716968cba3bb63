//! Compiled full-screen shader programs.
//!
//! Every program the compositor runs shares one bind group layout shape:
//!
//! ```wgsl
//! @group(0) @binding(0) var<uniform> u: Uniforms;   // dynamic offset
//! @group(0) @binding(1) var input_sampler: sampler;
//! @group(0) @binding(2) var input0: texture_2d<f32>;
//! @group(0) @binding(3) var input1: texture_2d<f32>;  // ...one per input
//! ```
//!
//! and a vertex entry point `vs` that emits a full-screen triangle.

use crate::gpu::GpuContext;

/// Uniform block shared by every full-screen pass.
///
/// # WGSL Declaration
///
/// ```wgsl
/// struct Uniforms {
///     resolution: vec2f,
///     time: f32,
///     gamma: f32,
///     exposure: f32,
///     horizontal: u32,
///     _pad: vec2f,
/// }
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PassUniforms {
    /// Target resolution in pixels.
    pub resolution: [f32; 2],
    /// Scene time in seconds; frozen while paused.
    pub time: f32,
    pub gamma: f32,
    pub exposure: f32,
    /// Blur direction, 1 for horizontal.
    pub horizontal: u32,
    pub _pad: [f32; 2],
}

/// Errors from compiling a shader program.
#[derive(Debug)]
pub enum ShaderError {
    /// Shader file could not be read.
    Io(std::io::Error),
    /// WGSL failed to parse.
    Parse(String),
    /// WGSL parsed but failed validation.
    Validation(String),
    /// wgpu rejected the module or pipeline.
    Pipeline(String),
}

impl std::fmt::Display for ShaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderError::Io(e) => write!(f, "IO error: {}", e),
            ShaderError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ShaderError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ShaderError::Pipeline(msg) => write!(f, "Pipeline error: {}", msg),
        }
    }
}

impl std::error::Error for ShaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShaderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ShaderError {
    fn from(e: std::io::Error) -> Self {
        ShaderError::Io(e)
    }
}

/// Parse and validate WGSL with naga.
///
/// Catches errors in user code before wgpu sees it, and yields a readable,
/// source-annotated message for the status line.
pub fn validate_wgsl(source: &str) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| ShaderError::Parse(e.emit_to_string(source)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| ShaderError::Validation(e.emit_to_string(source)))?;

    Ok(module)
}

/// Description of a program to build.
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub source: &'a str,
    /// Fragment entry point name.
    pub fragment_entry: &'a str,
    /// Number of sampled texture inputs.
    pub inputs: usize,
    /// Color attachment formats of the targets this program renders into.
    pub targets: &'a [wgpu::TextureFormat],
}

/// A compiled full-screen program: pipeline, bind group layout and sampler.
pub struct ShaderProgram {
    label: String,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    inputs: usize,
    targets: Vec<wgpu::TextureFormat>,
}

impl ShaderProgram {
    /// Build a program from trusted source.
    ///
    /// Invalid source surfaces as a wgpu validation error; use
    /// [`compile_checked`] for user-supplied code.
    pub fn new(gpu: &GpuContext, desc: &ProgramDesc) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.source.into()),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} Sampler", desc.label)),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<PassUniforms>() as u64
                    ),
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        entries.extend((0..desc.inputs).map(|i| wgpu::BindGroupLayoutEntry {
            binding: 2 + i as u32,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        }));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{} Bind Group Layout", desc.label)),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} Pipeline Layout", desc.label)),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let color_targets: Vec<_> = desc
            .targets
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} Pipeline", desc.label)),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(desc.fragment_entry),
                targets: &color_targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            label: desc.label.to_string(),
            pipeline,
            bind_group_layout,
            sampler,
            inputs: desc.inputs,
            targets: desc.targets.to_vec(),
        }
    }

    /// Create a bind group over the frame's uniform buffer and the given
    /// input views.
    ///
    /// # Panics
    ///
    /// Panics if the number of views does not match the program's inputs.
    pub fn create_bind_group(
        &self,
        gpu: &GpuContext,
        uniforms: &wgpu::Buffer,
        inputs: &[&wgpu::TextureView],
    ) -> wgpu::BindGroup {
        assert_eq!(
            inputs.len(),
            self.inputs,
            "program '{}' expects {} inputs",
            self.label,
            self.inputs
        );

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: uniforms,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<PassUniforms>() as u64),
                }),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        entries.extend(inputs.iter().enumerate().map(|(i, view)| {
            wgpu::BindGroupEntry {
                binding: 2 + i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            }
        }));

        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Bind Group", self.label)),
            layout: &self.bind_group_layout,
            entries: &entries,
        })
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Attachment formats the pipeline was built for.
    pub fn targets(&self) -> &[wgpu::TextureFormat] {
        &self.targets
    }
}

/// Run `build` inside a wgpu validation error scope, turning any captured
/// error into [`ShaderError::Pipeline`].
pub fn compile_checked<T>(
    gpu: &GpuContext,
    build: impl FnOnce() -> T,
) -> Result<T, ShaderError> {
    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(gpu.device.pop_error_scope()) {
        Some(err) => Err(ShaderError::Pipeline(err.to_string())),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_match_wgsl_layout() {
        // vec2f + 4 scalars + vec2f padding, 16-byte multiple
        assert_eq!(std::mem::size_of::<PassUniforms>(), 32);
        assert_eq!(std::mem::size_of::<PassUniforms>() % 16, 0);
    }

    #[test]
    fn validate_accepts_valid_wgsl() {
        let source = r#"
            @fragment
            fn fs() -> @location(0) vec4f {
                return vec4f(1.0, 0.0, 0.0, 1.0);
            }
        "#;
        assert!(validate_wgsl(source).is_ok());
    }

    #[test]
    fn validate_reports_parse_errors() {
        let err = validate_wgsl("fn broken( -> vec4f {").unwrap_err();
        assert!(matches!(err, ShaderError::Parse(_)));
        assert!(err.to_string().starts_with("Parse error"));
    }

    #[test]
    fn validate_reports_type_errors() {
        let source = r#"
            fn f() -> f32 {
                return vec2f(1.0, 2.0);
            }
        "#;
        let err = validate_wgsl(source).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Parse(_) | ShaderError::Validation(_)
        ));
    }
}
