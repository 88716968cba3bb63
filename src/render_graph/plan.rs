//! Frame plans: the ordered list of passes the compositor runs each frame.
//!
//! A plan is built from the [`CompositorConfig`] and whether a user shader is
//! ready, without touching the GPU. The executor then walks it in order.
//!
//! ```text
//! bloom on:   User(HDR) ─▶ Hdr ─▶ Blur×N (ping-pong) ─▶ Composite|Debug ─▶ ShaderOutput
//! bloom off:  User(LDR) ─────────────────────────────────────────────────▶ ShaderOutput
//! no shader:  (empty, ShaderOutput keeps last frame)
//! ```

use crate::compositor::{CompositorConfig, DebugPass};
use crate::render_graph::ping_pong::{BlurSource, PingPongSlot, blur_steps};

/// A render target owned by the compositor's [`TargetSet`](crate::render_graph::TargetSet).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetSlot {
    Hdr,
    PingPong(PingPongSlot),
    ShaderOutput,
}

/// A sampled input: one attachment of one target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputRef {
    pub slot: TargetSlot,
    pub attachment: usize,
}

impl InputRef {
    /// Tonemap input: the user shader's HDR color.
    pub const HDR_COLOR: InputRef = InputRef {
        slot: TargetSlot::Hdr,
        attachment: 0,
    };

    /// The user shader's bright-pass output.
    pub const HDR_BRIGHT: InputRef = InputRef {
        slot: TargetSlot::Hdr,
        attachment: 1,
    };

    pub fn ping_pong(slot: PingPongSlot) -> Self {
        Self {
            slot: TargetSlot::PingPong(slot),
            attachment: 0,
        }
    }

    fn from_blur_source(source: BlurSource) -> Self {
        match source {
            BlurSource::Bright => Self::HDR_BRIGHT,
            BlurSource::PingPong(slot) => Self::ping_pong(slot),
        }
    }
}

/// Which program a pass runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramRef {
    /// User shader, two-attachment HDR variant.
    UserHdr,
    /// User shader, single-attachment display variant.
    UserLdr,
    Blur,
    Composite,
    Debug,
}

impl ProgramRef {
    pub fn is_user(self) -> bool {
        matches!(self, ProgramRef::UserHdr | ProgramRef::UserLdr)
    }
}

/// Per-pass scalar parameters uploaded as uniforms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassParams {
    pub gamma: f32,
    pub exposure: f32,
    pub horizontal: bool,
}

/// One full-screen pass.
#[derive(Clone, Debug, PartialEq)]
pub struct PassDesc {
    pub label: &'static str,
    pub program: ProgramRef,
    pub target: TargetSlot,
    /// Target attachments sampled by the pass, in binding order. User
    /// programs sample the texture channels instead and list nothing here.
    pub inputs: Vec<InputRef>,
    pub params: PassParams,
}

/// Ordered passes for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePlan {
    passes: Vec<PassDesc>,
}

impl FramePlan {
    /// Build the plan for the given configuration.
    ///
    /// `shader_ready` is false when the user shader is missing or failed to
    /// compile; the plan is then empty so nothing is cleared or drawn.
    pub fn build(config: &CompositorConfig, shader_ready: bool) -> Self {
        let mut passes = Vec::new();
        if !shader_ready {
            return Self { passes };
        }

        let params = PassParams {
            gamma: config.gamma(),
            exposure: config.exposure(),
            horizontal: false,
        };

        if !config.bloom_enabled() {
            passes.push(PassDesc {
                label: "User Shader Pass",
                program: ProgramRef::UserLdr,
                target: TargetSlot::ShaderOutput,
                inputs: Vec::new(),
                params,
            });
            return Self { passes };
        }

        passes.push(PassDesc {
            label: "User Shader HDR Pass",
            program: ProgramRef::UserHdr,
            target: TargetSlot::Hdr,
            inputs: Vec::new(),
            params,
        });

        let (steps, result) = blur_steps(config.blur_iterations());
        passes.extend(steps.into_iter().map(|step| PassDesc {
            label: if step.horizontal {
                "Blur Pass (horizontal)"
            } else {
                "Blur Pass (vertical)"
            },
            program: ProgramRef::Blur,
            target: TargetSlot::PingPong(step.destination),
            inputs: vec![InputRef::from_blur_source(step.source)],
            params: PassParams {
                horizontal: step.horizontal,
                ..params
            },
        }));

        // With zero iterations the bright pass stands in for the blur result
        let blurred = result.map_or(InputRef::HDR_BRIGHT, InputRef::ping_pong);

        passes.push(match config.debug_pass() {
            DebugPass::Normal => PassDesc {
                label: "Composite Pass",
                program: ProgramRef::Composite,
                target: TargetSlot::ShaderOutput,
                inputs: vec![InputRef::HDR_COLOR, blurred],
                params,
            },
            DebugPass::ShowBrightPass => PassDesc {
                label: "Debug Pass (bright)",
                program: ProgramRef::Debug,
                target: TargetSlot::ShaderOutput,
                inputs: vec![InputRef::HDR_BRIGHT],
                params,
            },
            DebugPass::ShowBlurPass => PassDesc {
                label: "Debug Pass (blur)",
                program: ProgramRef::Debug,
                target: TargetSlot::ShaderOutput,
                inputs: vec![blurred],
                params,
            },
        });

        Self { passes }
    }

    pub fn passes(&self) -> &[PassDesc] {
        &self.passes
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Whether any pass writes to `slot`.
    pub fn writes(&self, slot: TargetSlot) -> bool {
        self.passes.iter().any(|p| p.target == slot)
    }

    /// Whether any pass samples from `slot`.
    pub fn reads(&self, slot: TargetSlot) -> bool {
        self.passes
            .iter()
            .any(|p| p.inputs.iter().any(|i| i.slot == slot))
    }
}
