//! Texture readback with row padding handling.

use std::sync::mpsc;

/// Bytes per RGBA8 texel.
pub const RGBA8_BYTES: u32 = 4;

/// Row pitch of a texture copy: `width * bytes_per_pixel` rounded up to
/// `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`.
#[must_use]
pub const fn padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> u32 {
    let unpadded = width * bytes_per_pixel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Strip the row padding from a mapped copy.
#[must_use]
pub fn unpad_rows(
    data: &[u8],
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
) -> Vec<u8> {
    let row = (width * bytes_per_pixel) as usize;
    let padded = padded_bytes_per_row(width, bytes_per_pixel) as usize;
    let mut out = Vec::with_capacity(row * height as usize);
    for chunk in data.chunks(padded).take(height as usize) {
        out.extend_from_slice(&chunk[..row.min(chunk.len())]);
    }
    out
}

/// Host-visible buffer that receives one RGBA8 texture.
pub struct TextureReadback {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
}

impl TextureReadback {
    /// Staging buffer for a `width × height` RGBA8 texture.
    #[must_use]
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let size = u64::from(padded_bytes_per_row(width, RGBA8_BYTES))
            * u64::from(height);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            width,
            height,
        }
    }

    /// Record the copy from `texture` into the staging buffer.
    pub fn encode_copy(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
    ) {
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row(
                        self.width,
                        RGBA8_BYTES,
                    )),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Map the buffer, blocking until the copy has landed, and return tightly
    /// packed RGBA8 rows.
    ///
    /// # Errors
    ///
    /// Returns a description of the mapping or polling failure.
    pub fn read(self, device: &wgpu::Device) -> Result<Vec<u8>, String> {
        let slice = self.buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| format!("device poll failed: {e}"))?;
        rx.recv()
            .map_err(|_| "readback callback dropped".to_owned())?
            .map_err(|e| format!("buffer map failed: {e}"))?;

        let pixels = {
            let mapped = slice.get_mapped_range();
            unpad_rows(&mapped, self.width, self.height, RGBA8_BYTES)
        };
        self.buffer.unmap();
        Ok(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(64, 4), 256);
        assert_eq!(padded_bytes_per_row(65, 4), 512);
        assert_eq!(padded_bytes_per_row(2048, 4), 8192);
        assert_eq!(padded_bytes_per_row(1, 4), 256);
    }

    #[test]
    fn unpad_keeps_only_image_bytes() {
        let (width, height) = (3, 2);
        let padded = padded_bytes_per_row(width, 4) as usize;
        let mut data = vec![0xAA; padded * height as usize];
        for y in 0..height as usize {
            for x in 0..(width * 4) as usize {
                data[y * padded + x] = (y * 100 + x) as u8;
            }
        }
        let out = unpad_rows(&data, width, height, 4);
        assert_eq!(out.len(), 24);
        assert_eq!(out[0], 0);
        assert_eq!(out[12], 100);
        assert!(!out.contains(&0xAA));
    }
}
