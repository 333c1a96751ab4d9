use image::ImageEncoder as _;

use crate::encode::codec::{
    CodecDescriptor, CodecFault, CodecParams, EncodeContext, EncodedPacket, VideoCodec,
    check_canvas, to_rgb8,
};
use crate::foundation::core::Canvas;
use crate::render::frame::RasterImage;

const MIN_QUALITY: u8 = 10;
const MAX_QUALITY: u8 = 95;

/// Motion-JPEG: each frame is an independent baseline JPEG, so every packet is a key frame.
///
/// Rate control is open-loop: the JPEG quality is picked once from the target bitrate's
/// bits-per-pixel budget.
#[derive(Clone, Debug)]
pub struct MjpegCodec {
    canvas: Canvas,
    quality: u8,
}

impl MjpegCodec {
    /// Codec targeting `params.bitrate`.
    pub fn new(params: CodecParams) -> Self {
        Self {
            canvas: params.canvas,
            quality: quality_for_bitrate(params),
        }
    }

    /// Override the derived quality (clamped to 10..=95).
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(MIN_QUALITY, MAX_QUALITY);
        self
    }

    /// JPEG quality in use.
    pub fn quality(&self) -> u8 {
        self.quality
    }
}

/// Map a bitrate to a JPEG quality through the per-pixel bit budget.
///
/// One bit per pixel lands at quality 50; the result is clamped to 10..=95.
pub fn quality_for_bitrate(params: CodecParams) -> u8 {
    let px_per_sec = params.canvas.pixel_count() as f64 * params.fps.as_f64();
    if px_per_sec <= 0.0 {
        return MIN_QUALITY;
    }
    let bpp = f64::from(params.bitrate) / px_per_sec;
    (10.0 + 40.0 * bpp)
        .round()
        .clamp(f64::from(MIN_QUALITY), f64::from(MAX_QUALITY)) as u8
}

impl VideoCodec for MjpegCodec {
    fn descriptor(&self) -> CodecDescriptor {
        CodecDescriptor {
            fourcc: *b"jpeg",
            compressor: "reelmux mjpeg".to_string(),
            depth: 24,
            config_box: None,
        }
    }

    fn encode(&self, frame: &RasterImage, ctx: EncodeContext) -> Result<EncodedPacket, CodecFault> {
        check_canvas(frame, self.canvas)?;
        let rgb = to_rgb8(frame);

        let mut data = Vec::with_capacity(rgb.len() / 8);
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut data, self.quality)
            .write_image(
                &rgb,
                frame.width(),
                frame.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| CodecFault::new(format!("jpeg encode of frame {} failed: {e}", ctx.seq)))?;

        Ok(EncodedPacket {
            data,
            key_frame: true,
            decoder_config: None,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/mjpeg.rs"]
mod tests;
