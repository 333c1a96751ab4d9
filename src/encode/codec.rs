use std::sync::Arc;

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::math::flatten_rgba_to_rgb8;
use crate::render::frame::{PixelFormat, RasterImage};

/// Codec-specific configuration record written inside the sample description
/// (`avcC`-style child box).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigBox {
    /// Box type.
    pub kind: [u8; 4],
    /// Opaque payload.
    pub payload: Vec<u8>,
}

/// What the muxer needs to describe a codec's bitstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecDescriptor {
    /// Sample entry fourcc, e.g. `jpeg`.
    pub fourcc: [u8; 4],
    /// Human-readable compressor name (at most 31 bytes are stored).
    pub compressor: String,
    /// Bits per pixel advertised in the sample entry.
    pub depth: u16,
    /// Optional decoder configuration box.
    pub config_box: Option<ConfigBox>,
}

/// Per-call context for [`VideoCodec::encode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeContext {
    /// Submission sequence number (0-based).
    pub seq: u64,
    /// Presentation timestamp in microseconds.
    pub timestamp_us: u64,
}

/// One compressed frame as returned by a codec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPacket {
    /// Opaque bitstream bytes.
    pub data: Vec<u8>,
    /// Whether the packet decodes without reference to earlier packets.
    pub key_frame: bool,
    /// Decoder configuration emitted alongside this packet, if it changed.
    pub decoder_config: Option<Vec<u8>>,
}

/// Fault reported by a codec. Codec state may be corrupt afterwards, so it is never retried.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CodecFault(pub String);

impl CodecFault {
    /// Build a fault from any message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Compresses rasters into opaque packets.
///
/// `encode` may be called concurrently from several encoder workers.
pub trait VideoCodec: Send + Sync {
    /// Describe the bitstream for the container.
    fn descriptor(&self) -> CodecDescriptor;

    /// Compress one frame. The raster is borrowed; the encoder releases it when this returns.
    fn encode(&self, frame: &RasterImage, ctx: EncodeContext) -> Result<EncodedPacket, CodecFault>;
}

/// Built-in codec selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecId {
    /// Motion-JPEG ([`crate::encode::mjpeg::MjpegCodec`]).
    #[default]
    Mjpeg,
    /// Uncompressed RGB24 ([`crate::encode::raw::RawCodec`]).
    Raw,
}

/// Parameters shared by the built-in codecs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecParams {
    /// Frame dimensions every submitted raster must match.
    pub canvas: Canvas,
    /// Stream frame rate.
    pub fps: Fps,
    /// Target bitrate in bits per second.
    pub bitrate: u32,
}

impl CodecId {
    /// Instantiate the codec.
    pub fn build(self, params: CodecParams) -> Arc<dyn VideoCodec> {
        match self {
            Self::Mjpeg => Arc::new(crate::encode::mjpeg::MjpegCodec::new(params)),
            Self::Raw => Arc::new(crate::encode::raw::RawCodec::new(params.canvas)),
        }
    }
}

impl std::fmt::Display for CodecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mjpeg => f.write_str("mjpeg"),
            Self::Raw => f.write_str("raw"),
        }
    }
}

/// Background used when dropping alpha.
pub(crate) const FLATTEN_BG: [u8; 3] = [0, 0, 0];

pub(crate) fn check_canvas(frame: &RasterImage, canvas: Canvas) -> Result<(), CodecFault> {
    if frame.canvas() != canvas {
        return Err(CodecFault::new(format!(
            "frame size mismatch: got {}x{}, expected {}x{}",
            frame.width(),
            frame.height(),
            canvas.width,
            canvas.height
        )));
    }
    Ok(())
}

/// Convert any supported raster layout to tightly packed RGB8.
pub(crate) fn to_rgb8(frame: &RasterImage) -> Vec<u8> {
    match frame.format() {
        PixelFormat::Rgb8 => frame.data().to_vec(),
        PixelFormat::Rgba8 | PixelFormat::Rgba8Premul => {
            let px = frame.data().len() / 4;
            let mut out = vec![0u8; px * 3];
            flatten_rgba_to_rgb8(
                &mut out,
                frame.data(),
                frame.format() == PixelFormat::Rgba8Premul,
                FLATTEN_BG,
            );
            out
        }
    }
}

/// Instantiate the codec a pipeline config selects.
pub fn build_codec(config: &crate::session::config::PipelineConfig) -> Arc<dyn VideoCodec> {
    config.codec.build(config.codec_params())
}
