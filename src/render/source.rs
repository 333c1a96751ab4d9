use crate::foundation::core::{Canvas, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::frame::RasterImage;

/// Produces one raster per requested frame index.
///
/// Contract: deterministic in `index`, called in strictly increasing index order, and never blocks
/// indefinitely. An `Err` aborts the run.
pub trait FrameSource {
    /// Produce the raster for `index`.
    fn frame(&mut self, index: FrameIndex) -> ReelResult<RasterImage>;
}

impl<F> FrameSource for F
where
    F: FnMut(FrameIndex) -> ReelResult<RasterImage>,
{
    fn frame(&mut self, index: FrameIndex) -> ReelResult<RasterImage> {
        self(index)
    }
}

/// White canvas with a red square sliding from the left edge toward the right edge.
#[derive(Clone, Debug)]
pub struct MovingBoxSource {
    canvas: Canvas,
    frame_count: u64,
    box_size: u32,
    background: [u8; 4],
    foreground: [u8; 4],
}

impl MovingBoxSource {
    /// Box animation over `frame_count` frames.
    pub fn new(canvas: Canvas, frame_count: u64) -> Self {
        Self {
            canvas,
            frame_count,
            box_size: 100,
            background: [255, 255, 255, 255],
            foreground: [255, 0, 0, 255],
        }
    }

    /// Override the box edge length in pixels.
    pub fn with_box_size(mut self, box_size: u32) -> Self {
        self.box_size = box_size;
        self
    }

    /// Left edge of the box at `index`.
    pub fn box_x(&self, index: FrameIndex) -> i64 {
        if self.frame_count == 0 {
            return 0;
        }
        let x = u128::from(index.0) * u128::from(self.canvas.width) / u128::from(self.frame_count);
        i64::try_from(x).unwrap_or(i64::MAX)
    }
}

impl FrameSource for MovingBoxSource {
    fn frame(&mut self, index: FrameIndex) -> ReelResult<RasterImage> {
        if index.0 >= self.frame_count {
            return Err(ReelError::frame_source(
                index.0,
                format!("frame is past the animation end ({})", self.frame_count),
            ));
        }
        let mut img =
            RasterImage::filled_rgba(self.canvas.width, self.canvas.height, self.background)
                .map_err(|e| ReelError::frame_source(index.0, e.to_string()))?;
        img.fill_rect(
            self.box_x(index),
            0,
            self.box_size,
            self.box_size,
            self.foreground,
        );
        Ok(img)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/source.rs"]
mod tests;
