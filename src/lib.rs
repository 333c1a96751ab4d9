//! reelmux renders a deterministic sequence of raster frames, compresses each one, and muxes
//! the compressed chunks into a seekable MP4 buffer with exact microsecond timing.
//!
//! The public API is pipeline-oriented:
//!
//! - Describe a run with a [`PipelineConfig`]
//! - Provide frames through a [`FrameSource`]
//! - Run a [`Pipeline`] and hand the finished buffer to an [`OutputSink`]
//!
//! The stages are usable on their own: [`Encoder`] compresses on a worker pool with bounded
//! backpressure and delivers chunks in submission order to any [`ChunkSink`], [`Muxer`] turns
//! ordered chunks into an MP4 buffer, and [`Mp4Track`] reads one back.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Frame indices, timing, and the crate error type.
pub mod foundation;

/// Codecs and the asynchronous ordered encoder.
pub mod encode;
/// MP4 muxing and read-back.
pub mod mux;
/// Destinations for the finished buffer.
pub mod output;
/// Raster frames and frame sources.
pub mod render;
/// Pipeline configuration and driver.
pub mod session;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRange, MICROS_PER_SEC};
pub use crate::foundation::error::{ReelError, ReelResult};

pub use crate::encode::codec::{
    CodecDescriptor, CodecFault, CodecId, CodecParams, ConfigBox, EncodeContext, EncodedPacket,
    VideoCodec, build_codec,
};
pub use crate::encode::encoder::{ChunkMetadata, ChunkSink, EncodedChunk, Encoder, EncoderOpts};
pub use crate::encode::mjpeg::MjpegCodec;
pub use crate::encode::raw::RawCodec;
pub use crate::mux::demux::{Mp4Sample, Mp4Track};
pub use crate::mux::muxer::{Muxer, MuxerConfig, MuxerState};
pub use crate::output::sink::{FileSink, InMemorySink, OutputSink};
pub use crate::render::frame::{PixelFormat, RasterImage};
pub use crate::render::source::{FrameSource, MovingBoxSource};
pub use crate::session::config::PipelineConfig;
pub use crate::session::pipeline::{CancelToken, Pipeline, RenderOutput, RenderStats, run};
