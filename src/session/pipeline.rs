use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

use crate::encode::codec::{VideoCodec, build_codec};
use crate::encode::encoder::Encoder;
use crate::foundation::core::FrameRange;
use crate::foundation::error::{ReelError, ReelResult};
use crate::mux::muxer::{Muxer, MuxerConfig};
use crate::output::sink::OutputSink;
use crate::render::source::FrameSource;
use crate::session::config::PipelineConfig;

/// Shared flag that stops a running pipeline.
///
/// Checked before every frame and before finalize. A cancelled run produces no output.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Run statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Frames requested from the source.
    pub frames_total: u64,
    /// Chunks written into the container.
    pub chunks_muxed: u64,
    /// Size of the finished container in bytes.
    pub bytes: u64,
}

/// Result of a successful run.
#[derive(Clone, Debug)]
pub struct RenderOutput {
    /// Finished container.
    pub buffer: Bytes,
    /// Run statistics.
    pub stats: RenderStats,
}

/// Render→encode→mux driver for one config.
///
/// Each [`Pipeline::run`] creates its own encoder and muxer, so one pipeline can be run
/// repeatedly and independent pipelines can run concurrently.
pub struct Pipeline {
    config: PipelineConfig,
    codec: Arc<dyn VideoCodec>,
    cancel: Option<CancelToken>,
}

impl Pipeline {
    /// Validate `config` and select its codec.
    pub fn new(config: PipelineConfig) -> ReelResult<Self> {
        config.validate()?;
        let codec = build_codec(&config);
        Ok(Self {
            config,
            codec,
            cancel: None,
        })
    }

    /// Replace the configured codec.
    pub fn with_codec(mut self, codec: Arc<dyn VideoCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The validated config.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Pull every frame from `source`, encode, and mux into one container buffer.
    ///
    /// Nothing is finalized unless every frame was produced, encoded, and delivered.
    #[tracing::instrument(skip(self, source), fields(frames = self.config.frame_count))]
    pub fn run(&self, source: &mut dyn FrameSource) -> ReelResult<RenderOutput> {
        let cfg = &self.config;
        tracing::info!(
            width = cfg.width,
            height = cfg.height,
            fps = cfg.fps.as_f64(),
            codec = %cfg.codec,
            "pipeline start"
        );

        let muxer = Muxer::new(MuxerConfig {
            width: cfg.width,
            height: cfg.height,
            fps: cfg.fps,
            codec: self.codec.descriptor(),
            fast_start: cfg.fast_start,
        })?;

        let mut muxer = if cfg.frame_count == 0 {
            muxer
        } else {
            let mut encoder = Encoder::new(self.codec.clone(), muxer, cfg.encoder.clone())?;
            if let Err(e) = self.submit_all(source, &mut encoder) {
                // A halted encoder reports the fault that halted it, not the rejected submit.
                if matches!(e, ReelError::Encoder { .. }) {
                    return Err(encoder.flush().err().unwrap_or(e));
                }
                encoder.abort();
                return Err(e);
            }
            encoder.flush()?
        };

        self.check_cancel(cfg.frame_count)?;
        let buffer = muxer.finalize()?;
        let stats = RenderStats {
            frames_total: cfg.frame_count,
            chunks_muxed: muxer.chunk_count(),
            bytes: buffer.len() as u64,
        };
        tracing::info!(
            frames = stats.frames_total,
            bytes = stats.bytes,
            "pipeline finished"
        );
        Ok(RenderOutput { buffer, stats })
    }

    /// [`Pipeline::run`], then hand the buffer to `sink`.
    pub fn render_to(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn OutputSink,
    ) -> ReelResult<RenderStats> {
        let out = self.run(source)?;
        sink.accept(out.buffer)?;
        Ok(out.stats)
    }

    fn submit_all(
        &self,
        source: &mut dyn FrameSource,
        encoder: &mut Encoder<Muxer>,
    ) -> ReelResult<()> {
        let canvas = self.config.canvas();
        for index in FrameRange::first(self.config.frame_count).iter() {
            self.check_cancel(index.0)?;
            let frame = source.frame(index).map_err(|e| match e {
                ReelError::FrameSource { .. } => e,
                other => ReelError::frame_source(index.0, other.to_string()),
            })?;
            if frame.canvas() != canvas {
                return Err(ReelError::frame_source(
                    index.0,
                    format!(
                        "frame is {}x{}, expected {}x{}",
                        frame.width(),
                        frame.height(),
                        canvas.width,
                        canvas.height
                    ),
                ));
            }
            encoder.submit(frame, self.config.fps.timestamp_us(index))?;
        }
        Ok(())
    }

    fn check_cancel(&self, frame: u64) -> ReelResult<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => {
                tracing::warn!(frame, "pipeline cancelled");
                Err(ReelError::Cancelled { frame })
            }
            _ => Ok(()),
        }
    }
}

/// Run one pipeline for `config` and return the finished container.
pub fn run(config: &PipelineConfig, source: &mut dyn FrameSource) -> ReelResult<Bytes> {
    Ok(Pipeline::new(config.clone())?.run(source)?.buffer)
}

#[cfg(test)]
#[path = "../../tests/unit/session/pipeline.rs"]
mod tests;
