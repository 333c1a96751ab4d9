use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::encode::codec::{CodecId, CodecParams};
use crate::encode::encoder::EncoderOpts;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{ReelError, ReelResult};

/// Default target bitrate in bits per second.
pub const DEFAULT_BITRATE: u32 = 500_000;

/// Immutable description of one pipeline run.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Frames to render. Zero produces an empty stream.
    pub frame_count: u64,
    /// Frame rate.
    pub fps: Fps,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Target bitrate in bits per second.
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
    /// Codec used for every frame.
    #[serde(default)]
    pub codec: CodecId,
    /// Write the index before the sample data.
    #[serde(default = "default_fast_start")]
    pub fast_start: bool,
    /// Encoder queue and worker settings.
    #[serde(default)]
    pub encoder: EncoderOpts,
}

fn default_bitrate() -> u32 {
    DEFAULT_BITRATE
}

fn default_fast_start() -> bool {
    true
}

impl PipelineConfig {
    /// Config with defaults for everything but the stream shape.
    pub fn new(width: u32, height: u32, fps: Fps, frame_count: u64) -> Self {
        Self {
            frame_count,
            fps,
            width,
            height,
            bitrate: DEFAULT_BITRATE,
            codec: CodecId::default(),
            fast_start: true,
            encoder: EncoderOpts::default(),
        }
    }

    /// Config covering `secs` seconds: `floor(secs * fps)` frames.
    pub fn for_duration(width: u32, height: u32, fps: Fps, secs: f64) -> ReelResult<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(ReelError::config(format!(
                "duration must be a non-negative number of seconds, got {secs}"
            )));
        }
        Ok(Self::new(width, height, fps, fps.secs_to_frames_floor(secs)))
    }

    /// Parse a config from JSON.
    pub fn from_reader(r: impl Read) -> ReelResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| ReelError::config(format!("parse pipeline config JSON: {e}")))
    }

    /// Parse a config from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> ReelResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            ReelError::config(format!("open pipeline config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Check the config before any work starts.
    pub fn validate(&self) -> ReelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::config(format!(
                "width/height must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width > u32::from(u16::MAX) || self.height > u32::from(u16::MAX) {
            return Err(ReelError::config(format!(
                "width/height must be at most 65535, got {}x{}",
                self.width, self.height
            )));
        }
        Fps::new(self.fps.num, self.fps.den)?;
        if self.bitrate == 0 {
            return Err(ReelError::config("bitrate must be > 0"));
        }
        self.encoder.validate()
    }

    /// Output canvas.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Parameters for [`CodecId::build`].
    pub fn codec_params(&self) -> CodecParams {
        CodecParams {
            canvas: self.canvas(),
            fps: self.fps,
            bitrate: self.bitrate,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/config.rs"]
mod tests;
