//! Offscreen render targets and the compositor's target set.

use std::rc::Rc;

use crate::gpu::GpuContext;
use crate::render_graph::ping_pong::PingPongSlot;
use crate::render_graph::plan::{InputRef, TargetSlot};

/// Format of the HDR scene and blur intermediates.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Format of display-ready targets (shader output, viewport).
pub const LDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Clamp requested dimensions to a valid GPU extent of at least 1×1.
///
/// Requested sizes come from user settings and window events and may be zero
/// or negative; neither is an error.
pub fn clamp_extent(width: i64, height: i64) -> (u32, u32) {
    let clamp = |v: i64| v.clamp(1, u32::MAX as i64) as u32;
    (clamp(width), clamp(height))
}

/// Decide whether a target of size `current` must be reallocated to satisfy
/// a request for `requested`. Returns the clamped new extent, or `None` when
/// the target already has that size.
pub fn resize_extent(current: (u32, u32), requested: (u32, u32)) -> Option<(u32, u32)> {
    let next = (requested.0.max(1), requested.1.max(1));
    (next != current).then_some(next)
}

/// One color attachment of a [`RenderTarget`].
///
/// Shared as `Rc<Attachment>` between the compositor (which renders into it)
/// and the scene (which samples it as a sprite texture). The GPU memory lives
/// as long as the longest holder.
#[derive(Debug)]
pub struct Attachment {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

/// An off-screen render target with one or more color attachments.
///
/// Every attachment has the same dimensions. Resizing replaces all of them
/// in one step; handles obtained from [`attachment`](Self::attachment) before
/// a resize keep the old (now stale) texture alive and must be re-fetched.
pub struct RenderTarget {
    label: String,
    formats: Vec<wgpu::TextureFormat>,
    attachments: Vec<Rc<Attachment>>,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Creates a target with one attachment per entry in `formats`.
    ///
    /// Dimensions are clamped to at least 1×1.
    pub fn new(
        gpu: &GpuContext,
        label: &str,
        formats: &[wgpu::TextureFormat],
        width: u32,
        height: u32,
    ) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let attachments = Self::allocate(gpu, label, formats, width, height);
        Self {
            label: label.to_string(),
            formats: formats.to_vec(),
            attachments,
            width,
            height,
        }
    }

    fn allocate(
        gpu: &GpuContext,
        label: &str,
        formats: &[wgpu::TextureFormat],
        width: u32,
        height: u32,
    ) -> Vec<Rc<Attachment>> {
        formats
            .iter()
            .enumerate()
            .map(|(i, &format)| {
                let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&format!("{} Attachment {}", label, i)),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                Rc::new(Attachment {
                    texture,
                    view,
                    format,
                })
            })
            .collect()
    }

    /// Reallocates every attachment at the new size (clamped to 1×1).
    ///
    /// Returns `false` and keeps the current attachments when the size is
    /// unchanged.
    pub fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) -> bool {
        let Some((width, height)) = resize_extent((self.width, self.height), (width, height))
        else {
            return false;
        };

        log::debug!(
            "Resizing '{}' {}x{} -> {}x{}",
            self.label,
            self.width,
            self.height,
            width,
            height
        );
        self.attachments = Self::allocate(gpu, &self.label, &self.formats, width, height);
        self.width = width;
        self.height = height;
        true
    }

    /// The attachment at `index`; 0 is the primary attachment.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`attachment_count`](Self::attachment_count).
    pub fn attachment(&self, index: usize) -> &Rc<Attachment> {
        &self.attachments[index]
    }

    /// Texture view of the attachment at `index`.
    pub fn view(&self, index: usize) -> &wgpu::TextureView {
        &self.attachments[index].view
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    pub fn formats(&self) -> &[wgpu::TextureFormat] {
        &self.formats
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// All offscreen targets owned by the compositor.
///
/// - `hdr`: user shader output in bloom mode; attachment 0 is color,
///   attachment 1 the bright pass
/// - `ping_pong`: the two blur buffers
/// - `shader_output`: the final composited, display-ready image
pub struct TargetSet {
    pub hdr: RenderTarget,
    pub ping_pong: [RenderTarget; 2],
    pub shader_output: RenderTarget,
}

impl TargetSet {
    pub fn new(gpu: &GpuContext, width: u32, height: u32) -> Self {
        Self {
            hdr: RenderTarget::new(gpu, "HDR Target", &[HDR_FORMAT, HDR_FORMAT], width, height),
            ping_pong: [
                RenderTarget::new(gpu, "Bloom Target A", &[HDR_FORMAT], width, height),
                RenderTarget::new(gpu, "Bloom Target B", &[HDR_FORMAT], width, height),
            ],
            shader_output: RenderTarget::new(gpu, "Shader Output", &[LDR_FORMAT], width, height),
        }
    }

    /// Resizes every target together. Returns `true` if anything was
    /// reallocated.
    pub fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) -> bool {
        let mut changed = self.hdr.resize(gpu, width, height);
        for target in &mut self.ping_pong {
            changed |= target.resize(gpu, width, height);
        }
        changed |= self.shader_output.resize(gpu, width, height);
        changed
    }

    pub fn get(&self, slot: TargetSlot) -> &RenderTarget {
        match slot {
            TargetSlot::Hdr => &self.hdr,
            TargetSlot::PingPong(PingPongSlot::A) => &self.ping_pong[0],
            TargetSlot::PingPong(PingPongSlot::B) => &self.ping_pong[1],
            TargetSlot::ShaderOutput => &self.shader_output,
        }
    }

    pub fn view(&self, input: InputRef) -> &wgpu::TextureView {
        self.get(input.slot).view(input.attachment)
    }

    pub fn extent(&self) -> (u32, u32) {
        self.shader_output.extent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_extent_floors_at_one() {
        assert_eq!(clamp_extent(0, 0), (1, 1));
        assert_eq!(clamp_extent(-20, 5), (1, 5));
        assert_eq!(clamp_extent(800, -1), (800, 1));
        assert_eq!(clamp_extent(800, 600), (800, 600));
    }

    #[test]
    fn clamp_extent_matches_max_one_for_non_negative_sizes() {
        for w in [0i64, 1, 2, 17, 1024, 4096] {
            for h in [0i64, 1, 3, 600, 2160] {
                assert_eq!(clamp_extent(w, h), (w.max(1) as u32, h.max(1) as u32));
            }
        }
    }

    #[test]
    fn resize_extent_skips_identical_size() {
        assert_eq!(resize_extent((800, 600), (800, 600)), None);
        assert_eq!(resize_extent((1, 1), (0, 0)), None);
    }

    #[test]
    fn resize_extent_clamps_new_size() {
        assert_eq!(resize_extent((800, 600), (0, 300)), Some((1, 300)));
        assert_eq!(resize_extent((1, 1), (640, 480)), Some((640, 480)));
    }

    #[test]
    fn resize_extent_is_idempotent() {
        let first = resize_extent((1, 1), (320, 240)).unwrap();
        assert_eq!(resize_extent(first, (320, 240)), None);
    }
}
