use crate::encode::codec::{
    CodecDescriptor, CodecFault, EncodeContext, EncodedPacket, VideoCodec, check_canvas, to_rgb8,
};
use crate::foundation::core::Canvas;
use crate::render::frame::RasterImage;

/// Uncompressed RGB24 "codec": every packet is the frame's RGB rows, every packet is a key frame.
#[derive(Clone, Debug)]
pub struct RawCodec {
    canvas: Canvas,
}

impl RawCodec {
    /// Codec for frames of `canvas` size.
    pub fn new(canvas: Canvas) -> Self {
        Self { canvas }
    }
}

impl VideoCodec for RawCodec {
    fn descriptor(&self) -> CodecDescriptor {
        CodecDescriptor {
            fourcc: *b"raw ",
            compressor: "reelmux raw rgb24".to_string(),
            depth: 24,
            config_box: None,
        }
    }

    fn encode(&self, frame: &RasterImage, _ctx: EncodeContext) -> Result<EncodedPacket, CodecFault> {
        check_canvas(frame, self.canvas)?;
        Ok(EncodedPacket {
            data: to_rgb8(frame),
            key_frame: true,
            decoder_config: None,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/raw.rs"]
mod tests;
