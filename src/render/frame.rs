use crate::foundation::core::Canvas;
use crate::foundation::error::{ReelError, ReelResult};

/// Pixel layout of a [`RasterImage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// RGBA8 with straight (non-premultiplied) alpha.
    Rgba8,
    /// RGBA8 with premultiplied alpha.
    Rgba8Premul,
    /// Opaque RGB8.
    Rgb8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Rgba8Premul => 4,
            Self::Rgb8 => 3,
        }
    }
}

/// One frame of pixels, tightly packed and row-major.
///
/// A raster is owned by exactly one pipeline stage at a time. Submitting it to the encoder moves
/// it; the encoder drops it as soon as the codec has consumed it.
#[derive(Debug, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl RasterImage {
    /// Wrap `data`, checking it holds exactly `width * height` pixels of `format`.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> ReelResult<Self> {
        if width == 0 || height == 0 {
            return Err(ReelError::config("raster width/height must be non-zero"));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(format.bytes_per_pixel()))
            .ok_or_else(|| ReelError::config("raster dimensions overflow"))?;
        if data.len() != expected {
            return Err(ReelError::config(format!(
                "raster data is {} bytes, expected {expected} for {width}x{height} {format:?}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Allocate a raster filled with one RGBA8 color.
    pub fn filled_rgba(width: u32, height: u32, rgba: [u8; 4]) -> ReelResult<Self> {
        let px = (width as usize).saturating_mul(height as usize);
        let mut data = Vec::with_capacity(px.saturating_mul(4));
        for _ in 0..px {
            data.extend_from_slice(&rgba);
        }
        Self::new(width, height, PixelFormat::Rgba8, data)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Frame dimensions.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Fill the axis-aligned rectangle `[x, x+w) x [y, y+h)` clipped to the image.
    pub fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, rgba: [u8; 4]) {
        let x0 = x.clamp(0, i64::from(self.width)) as usize;
        let y0 = y.clamp(0, i64::from(self.height)) as usize;
        let x1 = (x + i64::from(w)).clamp(0, i64::from(self.width)) as usize;
        let y1 = (y + i64::from(h)).clamp(0, i64::from(self.height)) as usize;
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let bpp = self.format.bytes_per_pixel();
        let stride = self.stride();
        for row in y0..y1 {
            let start = row * stride + x0 * bpp;
            let end = row * stride + x1 * bpp;
            for px in self.data[start..end].chunks_exact_mut(bpp) {
                px.copy_from_slice(&rgba[..bpp]);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/frame.rs"]
mod tests;
