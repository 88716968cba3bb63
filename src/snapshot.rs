//! PNG export of the shader output.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::gpu::GpuContext;
use crate::render_graph::{Attachment, LDR_FORMAT};

/// Errors from capturing or writing a snapshot.
#[derive(Debug)]
pub enum SnapshotError {
    /// File could not be written.
    Io(std::io::Error),
    /// PNG encoding failed.
    Image(image::ImageError),
    /// The readback buffer could not be mapped, or the attachment is not
    /// 8-bit RGBA.
    Map(String),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "IO error: {}", e),
            SnapshotError::Image(e) => write!(f, "Image error: {}", e),
            SnapshotError::Map(msg) => write!(f, "Readback failed: {}", msg),
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Io(e) => Some(e),
            SnapshotError::Image(e) => Some(e),
            SnapshotError::Map(_) => None,
        }
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(e: std::io::Error) -> Self {
        SnapshotError::Io(e)
    }
}

impl From<image::ImageError> for SnapshotError {
    fn from(e: image::ImageError) -> Self {
        SnapshotError::Image(e)
    }
}

const MAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Call `poll` until the map callback reports on `rx`, or `timeout` passes.
/// A failing `poll` ends the wait early.
fn wait_for_map<T, E: std::fmt::Display>(
    mut poll: impl FnMut() -> Result<(), E>,
    rx: &mpsc::Receiver<T>,
    timeout: Duration,
) -> Result<T, SnapshotError> {
    let deadline = Instant::now() + timeout;
    loop {
        poll().map_err(|e| SnapshotError::Map(e.to_string()))?;
        match rx.try_recv() {
            Ok(result) => return Ok(result),
            Err(mpsc::TryRecvError::Disconnected) => {
                return Err(SnapshotError::Map("map callback dropped".to_string()));
            }
            Err(mpsc::TryRecvError::Empty) => {}
        }
        if Instant::now() >= deadline {
            return Err(SnapshotError::Map("timed out".to_string()));
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Row pitch of an RGBA8 readback, padded to wgpu's copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Strip row padding from a readback of `height` rows.
pub fn unpad_rows(data: &[u8], width: u32, height: u32, padded_row: u32) -> Vec<u8> {
    let row = (width * 4) as usize;
    let padded_row = padded_row as usize;
    let mut pixels = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * padded_row;
        pixels.extend_from_slice(&data[start..start + row]);
    }
    pixels
}

/// A captured RGBA8 image, top row first.
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Snapshot {
    /// Read back an 8-bit RGBA attachment.
    ///
    /// Blocks until the copy has finished.
    pub fn capture(
        gpu: &GpuContext,
        attachment: &Attachment,
    ) -> Result<Self, SnapshotError> {
        if attachment.format != LDR_FORMAT {
            return Err(SnapshotError::Map(format!(
                "cannot capture {:?} attachment",
                attachment.format
            )));
        }

        let size = attachment.texture.size();
        let (width, height) = (size.width, size.height);
        let padded_row = padded_bytes_per_row(width);
        let buffer_size = padded_row as u64 * height as u64;

        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Snapshot Readback"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Snapshot Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &attachment.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            size,
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        let poll = || gpu.device.poll(wgpu::PollType::Poll).map(|_| ());
        match wait_for_map(poll, &rx, MAP_TIMEOUT)? {
            Ok(()) => {}
            Err(e) => return Err(SnapshotError::Map(e.to_string())),
        }

        let pixels = {
            let data = slice.get_mapped_range();
            unpad_rows(&data, width, height, padded_row)
        };
        buffer.unmap();

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Write the image as PNG.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let image = image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| SnapshotError::Map("pixel buffer size mismatch".to_string()))?;
        image.save_with_format(path.as_ref(), image::ImageFormat::Png)?;
        log::info!(
            "Wrote {}x{} snapshot to {:?}",
            self.width,
            self.height,
            path.as_ref()
        );
        Ok(())
    }
}

/// Default snapshot file name in `dir`, stamped with the current time.
pub fn snapshot_path(dir: impl AsRef<Path>) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    dir.as_ref().join(format!("snapshot-{}.png", stamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(800), 3328);
    }

    #[test]
    fn unpad_drops_row_padding() {
        let padded = padded_bytes_per_row(2) as usize;
        let mut data = vec![0u8; padded * 2];
        data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data[padded..padded + 8].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);

        let pixels = unpad_rows(&data, 2, 2, padded as u32);
        assert_eq!(pixels, (1..=16).collect::<Vec<u8>>());
    }

    #[test]
    fn wait_returns_delivered_result() {
        let (tx, rx) = mpsc::channel();
        tx.send(7).unwrap();
        let mut polls = 0;
        let result = wait_for_map(
            || {
                polls += 1;
                Ok::<(), String>(())
            },
            &rx,
            Duration::from_secs(1),
        );
        assert_eq!(result.unwrap(), 7);
        assert_eq!(polls, 1);
    }

    #[test]
    fn wait_times_out_without_callback() {
        let (_tx, rx) = mpsc::channel::<()>();
        let result = wait_for_map(|| Ok::<(), String>(()), &rx, Duration::ZERO);
        assert!(matches!(result, Err(SnapshotError::Map(msg)) if msg == "timed out"));
    }

    #[test]
    fn wait_stops_on_poll_error() {
        let (_tx, rx) = mpsc::channel::<()>();
        let result = wait_for_map(|| Err("device lost"), &rx, Duration::from_secs(60));
        assert!(matches!(result, Err(SnapshotError::Map(msg)) if msg == "device lost"));
    }

    #[test]
    fn wait_reports_dropped_callback() {
        let (tx, rx) = mpsc::channel::<()>();
        drop(tx);
        let result = wait_for_map(|| Ok::<(), String>(()), &rx, Duration::from_secs(60));
        assert!(matches!(result, Err(SnapshotError::Map(_))));
    }

    #[test]
    fn png_is_written() {
        let path = std::env::temp_dir().join(format!("shadervis-{}-snap.png", std::process::id()));
        let snapshot = Snapshot {
            width: 2,
            height: 1,
            pixels: vec![255, 0, 0, 255, 0, 255, 0, 255],
        };
        snapshot.save_png(&path).unwrap();

        let image = image::open(&path).unwrap().to_rgba8();
        std::fs::remove_file(&path).ok();
        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(image.get_pixel(1, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn snapshot_path_is_png() {
        let path = snapshot_path("out");
        assert!(path.starts_with("out"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
    }
}
