use crate::gpu::GpuContext;

/// Number of texture channels exposed to user shaders.
pub const CHANNEL_COUNT: usize = 8;

/// Channel texture format. Linear, so the shader sees the file's bytes as-is.
pub const CHANNEL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Why a channel image could not be turned into a texture.
#[derive(Debug)]
pub enum TextureError {
    /// The file could not be read or decoded.
    Image(image::ImageError),
    /// The image is empty or larger than the device allows.
    TooLarge { width: u32, height: u32, max: u32 },
}

impl std::fmt::Display for TextureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureError::Image(e) => write!(f, "Image error: {}", e),
            TextureError::TooLarge { width, height, max } => write!(
                f,
                "{}x{} image does not fit the device limit of {}x{}",
                width, height, max, max
            ),
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TextureError::Image(e) => Some(e),
            TextureError::TooLarge { .. } => None,
        }
    }
}

impl From<image::ImageError> for TextureError {
    fn from(e: image::ImageError) -> Self {
        TextureError::Image(e)
    }
}

/// Whether a `width`×`height` 2D texture can be created on a device whose
/// `max_texture_dimension_2d` is `max`.
pub fn fits_device_limit(width: u32, height: u32, max: u32) -> bool {
    width > 0 && height > 0 && width <= max && height <= max
}

/// A user texture channel on the GPU.
#[derive(Debug)]
pub struct Texture {
    view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Upload tightly packed RGBA8 pixels.
    ///
    /// Stored as [`CHANNEL_FORMAT`], not sRGB: a channel returned unchanged
    /// by `pixel` reproduces the image on the LDR path, and gamma is left to
    /// the composite or the user's code.
    fn from_rgba(gpu: &GpuContext, data: &[u8], width: u32, height: u32, label: &str) -> Self {
        use wgpu::util::DeviceExt;

        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: CHANNEL_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            width,
            height,
        }
    }

    /// Decode an image file and upload it.
    ///
    /// Images outside the device's 2D texture limit are rejected before
    /// anything reaches the GPU.
    pub fn from_file(gpu: &GpuContext, path: &str) -> Result<Self, TextureError> {
        let img = image::open(path)?.to_rgba8();
        let (width, height) = img.dimensions();
        let max = gpu.device.limits().max_texture_dimension_2d;
        if !fits_device_limit(width, height, max) {
            return Err(TextureError::TooLarge { width, height, max });
        }
        Ok(Self::from_rgba(gpu, &img, width, height, path))
    }

    /// A 1×1 opaque white texture bound to empty channels.
    pub fn placeholder(gpu: &GpuContext) -> Self {
        Self::from_rgba(gpu, &[255, 255, 255, 255], 1, 1, "Empty Channel")
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// The user shader's texture channels (`channel0` … `channel7`).
///
/// Each slot is loaded from a path in the shader package. Empty paths and
/// images that fail to load fall back to a white placeholder so the user
/// shader's bind group is always complete.
pub struct TextureSlots {
    paths: [String; CHANNEL_COUNT],
    textures: Vec<Texture>,
}

impl TextureSlots {
    pub fn new(gpu: &GpuContext, paths: &[String; CHANNEL_COUNT]) -> Self {
        let textures = paths
            .iter()
            .enumerate()
            .map(|(slot, path)| Self::load(gpu, slot, path))
            .collect();
        Self {
            paths: paths.clone(),
            textures,
        }
    }

    fn load(gpu: &GpuContext, slot: usize, path: &str) -> Texture {
        if path.is_empty() {
            return Texture::placeholder(gpu);
        }
        match Texture::from_file(gpu, path) {
            Ok(texture) => {
                log::info!(
                    "Loaded channel{} from '{}' ({}x{})",
                    slot,
                    path,
                    texture.width,
                    texture.height
                );
                texture
            }
            Err(e) => {
                log::warn!("Failed to load channel{} from '{}': {}", slot, path, e);
                Texture::placeholder(gpu)
            }
        }
    }

    pub fn paths(&self) -> &[String; CHANNEL_COUNT] {
        &self.paths
    }

    /// Views in binding order.
    pub fn views(&self) -> Vec<&wgpu::TextureView> {
        self.textures.iter().map(Texture::view).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_limit_is_inclusive() {
        assert!(fits_device_limit(8192, 8192, 8192));
        assert!(fits_device_limit(1, 8192, 8192));
        assert!(!fits_device_limit(8193, 1, 8192));
        assert!(!fits_device_limit(16384, 16384, 8192));
    }

    #[test]
    fn empty_images_do_not_fit() {
        assert!(!fits_device_limit(0, 16, 8192));
        assert!(!fits_device_limit(16, 0, 8192));
    }

    #[test]
    fn channels_are_linear_rgba8() {
        assert!(!CHANNEL_FORMAT.is_srgb());
        assert_eq!(CHANNEL_FORMAT.block_copy_size(None), Some(4));
    }

    #[test]
    fn too_large_error_names_sizes() {
        let message = TextureError::TooLarge {
            width: 16384,
            height: 2,
            max: 8192,
        }
        .to_string();
        assert!(message.contains("16384x2"));
        assert!(message.contains("8192x8192"));
    }
}
