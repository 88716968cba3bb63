//! Full-screen pass execution.

use crate::gpu::GpuContext;
use crate::render_graph::RenderTarget;
use crate::shader::{PassUniforms, ShaderProgram};

/// Execution context for one frame's passes.
///
/// The `'a` lifetime ties the encoder to the frame, so passes cannot hold
/// onto it beyond the current frame.
pub struct RenderContext<'a> {
    /// GPU context providing access to device, queue, and configuration.
    pub gpu: &'a GpuContext,
    /// Command encoder every pass of the frame records into.
    pub encoder: &'a mut wgpu::CommandEncoder,
    /// Scene time in seconds.
    pub time: f32,
}

/// Byte offset of uniform slot `index` given the device's dynamic offset
/// alignment.
pub fn slot_offset(index: u32, alignment: u32) -> u64 {
    let size = std::mem::size_of::<PassUniforms>() as u64;
    let alignment = alignment.max(1) as u64;
    let stride = size.div_ceil(alignment) * alignment;
    index as u64 * stride
}

/// One buffer holding every pass's uniforms for a frame.
///
/// All passes of a frame are recorded into one encoder, and queue writes land
/// before the encoder executes. A single shared uniform buffer would leave
/// every pass reading the last value written, so each pass gets its own slot
/// bound through a dynamic offset.
pub struct UniformArena {
    buffer: wgpu::Buffer,
    alignment: u32,
    capacity: u32,
}

impl UniformArena {
    pub fn new(gpu: &GpuContext, capacity: u32) -> Self {
        let alignment = gpu.uniform_alignment();
        let capacity = capacity.max(1);
        Self {
            buffer: Self::allocate(gpu, alignment, capacity),
            alignment,
            capacity,
        }
    }

    fn allocate(gpu: &GpuContext, alignment: u32, capacity: u32) -> wgpu::Buffer {
        gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pass Uniform Arena"),
            size: slot_offset(capacity, alignment),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Grow the arena to hold at least `passes` slots.
    ///
    /// Returns `true` if the buffer was replaced; bind groups created against
    /// the old buffer must not be reused.
    pub fn ensure_capacity(&mut self, gpu: &GpuContext, passes: u32) -> bool {
        if passes <= self.capacity {
            return false;
        }
        let capacity = passes.next_power_of_two();
        log::debug!("Growing uniform arena {} -> {} slots", self.capacity, capacity);
        self.buffer = Self::allocate(gpu, self.alignment, capacity);
        self.capacity = capacity;
        true
    }

    /// Stage `uniforms` into `slot`, returning the dynamic offset to bind.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is outside the arena's capacity.
    pub fn write(&self, gpu: &GpuContext, slot: u32, uniforms: &PassUniforms) -> u32 {
        assert!(slot < self.capacity, "uniform slot {} out of range", slot);
        let offset = slot_offset(slot, self.alignment);
        gpu.queue
            .write_buffer(&self.buffer, offset, bytemuck::bytes_of(uniforms));
        offset as u32
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// Runs full-screen passes: clear the target, bind a program, draw.
pub struct PassExecutor {
    arena: UniformArena,
    next_slot: u32,
}

impl PassExecutor {
    pub fn new(gpu: &GpuContext, capacity: u32) -> Self {
        Self {
            arena: UniformArena::new(gpu, capacity),
            next_slot: 0,
        }
    }

    /// Start a new frame of at most `passes` passes.
    pub fn begin_frame(&mut self, gpu: &GpuContext, passes: u32) {
        self.arena.ensure_capacity(gpu, passes);
        self.next_slot = 0;
    }

    /// Run one full-screen pass into `target`.
    ///
    /// The target is cleared unconditionally, so nothing accumulates across
    /// frames. With no program the pass is skipped entirely, clear included,
    /// and the target keeps its previous contents. Returns whether anything
    /// was recorded.
    pub fn run(
        &mut self,
        ctx: &mut RenderContext,
        label: &str,
        program: Option<&ShaderProgram>,
        target: &RenderTarget,
        inputs: &[&wgpu::TextureView],
        uniforms: &PassUniforms,
    ) -> bool {
        let Some(program) = program else {
            log::debug!("Skipping '{}': no program", label);
            return false;
        };
        if inputs.len() != program.inputs() || program.targets() != target.formats() {
            log::warn!(
                "Skipping '{}': program '{}' expects {} inputs and {:?}, got {} and {:?}",
                label,
                program.label(),
                program.inputs(),
                program.targets(),
                inputs.len(),
                target.formats()
            );
            return false;
        }

        let offset = self.arena.write(ctx.gpu, self.next_slot, uniforms);
        self.next_slot += 1;

        let bind_group = program.create_bind_group(ctx.gpu, self.arena.buffer(), inputs);

        let color_attachments: Vec<_> = (0..target.attachment_count())
            .map(|i| {
                Some(wgpu::RenderPassColorAttachment {
                    view: target.view(i),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(program.pipeline());
        pass.set_bind_group(0, &bind_group, &[offset]);
        pass.draw(0..3, 0..1);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_respect_alignment() {
        assert_eq!(slot_offset(0, 256), 0);
        assert_eq!(slot_offset(1, 256), 256);
        assert_eq!(slot_offset(5, 256), 1280);
    }

    #[test]
    fn slots_never_overlap_with_small_alignment() {
        let size = std::mem::size_of::<PassUniforms>() as u64;
        assert_eq!(slot_offset(1, 16), size);
        assert_eq!(slot_offset(3, 4), 3 * size);
    }

    #[test]
    fn zero_alignment_is_treated_as_one() {
        let size = std::mem::size_of::<PassUniforms>() as u64;
        assert_eq!(slot_offset(2, 0), 2 * size);
    }
}
