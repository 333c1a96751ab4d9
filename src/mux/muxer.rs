use bytes::Bytes;

use crate::encode::codec::CodecDescriptor;
use crate::encode::encoder::{ChunkMetadata, ChunkSink, EncodedChunk};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::mux::mp4::{self, SampleRecord, TrackTables};

/// Stream description fixed at muxer creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MuxerConfig {
    /// Frame width in pixels (at most 65535).
    pub width: u32,
    /// Frame height in pixels (at most 65535).
    pub height: u32,
    /// Nominal frame rate, used for the duration of the last sample.
    pub fps: Fps,
    /// Sample description for the track.
    pub codec: CodecDescriptor,
    /// Place the index (`moov`) before the sample data.
    pub fast_start: bool,
}

impl MuxerConfig {
    /// Reject dimensions the container cannot express.
    pub fn validate(&self) -> ReelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::config("muxer width/height must be non-zero"));
        }
        if self.width > u32::from(u16::MAX) || self.height > u32::from(u16::MAX) {
            return Err(ReelError::config(format!(
                "muxer dimensions {}x{} exceed 65535",
                self.width, self.height
            )));
        }
        Fps::new(self.fps.num, self.fps.den)?;
        Ok(())
    }
}

/// Muxer lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MuxerState {
    /// Accepting chunks.
    Open,
    /// `finalize` ran; the buffer is immutable.
    Finalized,
}

#[derive(Clone, Copy, Debug)]
struct PendingSample {
    mdat_offset: u64,
    size: u32,
    timestamp_us: u64,
    key_frame: bool,
}

/// Single-track MP4 writer.
///
/// Chunk payloads are appended to an in-memory `mdat` body as they arrive; the index is built
/// once in [`Muxer::finalize`].
#[derive(Debug)]
pub struct Muxer {
    cfg: MuxerConfig,
    samples: Vec<PendingSample>,
    mdat: Vec<u8>,
    config_replaced: bool,
    state: MuxerState,
    output: Option<Bytes>,
}

impl Muxer {
    /// Create an empty, open muxer.
    pub fn new(cfg: MuxerConfig) -> ReelResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            samples: Vec::new(),
            mdat: Vec::new(),
            config_replaced: false,
            state: MuxerState::Open,
            output: None,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MuxerState {
        self.state
    }

    /// Chunks accepted so far.
    pub fn chunk_count(&self) -> u64 {
        self.samples.len() as u64
    }

    /// The finished container, once finalized.
    pub fn buffer(&self) -> Option<&Bytes> {
        self.output.as_ref()
    }

    /// Sample description as it will be written (reflects any decoder config received).
    pub fn codec(&self) -> &CodecDescriptor {
        &self.cfg.codec
    }

    /// Append one chunk. Chunks must arrive in presentation order.
    pub fn add_chunk(&mut self, chunk: EncodedChunk, meta: ChunkMetadata) -> ReelResult<()> {
        self.append(chunk, meta)
    }

    fn append(&mut self, chunk: EncodedChunk, meta: ChunkMetadata) -> ReelResult<()> {
        let index = self.chunk_count();
        if self.state == MuxerState::Finalized {
            return Err(ReelError::muxer_state(index, "chunk added after finalize"));
        }
        if chunk.data.is_empty() {
            return Err(ReelError::muxer_state(index, "chunk payload is empty"));
        }
        let size = u32::try_from(chunk.data.len()).map_err(|_| {
            ReelError::muxer_state(index, format!("chunk of {} bytes is too large", chunk.data.len()))
        })?;
        match self.samples.last() {
            None if !chunk.key_frame => {
                return Err(ReelError::muxer_state(index, "first chunk must be a key frame"));
            }
            Some(prev) if chunk.timestamp_us <= prev.timestamp_us => {
                return Err(ReelError::muxer_state(
                    index,
                    format!(
                        "chunk timestamp {}us is not after previous {}us",
                        chunk.timestamp_us, prev.timestamp_us
                    ),
                ));
            }
            Some(prev) if chunk.timestamp_us - prev.timestamp_us > u64::from(u32::MAX) => {
                return Err(ReelError::muxer_state(
                    index,
                    "gap between chunks exceeds the sample duration range",
                ));
            }
            _ => {}
        }

        if let Some(description) = meta.decoder_config
            && !self.config_replaced
        {
            match &mut self.cfg.codec.config_box {
                Some(cfg_box) => {
                    cfg_box.payload = description;
                    self.config_replaced = true;
                }
                None => {
                    tracing::debug!(chunk = index, "decoder config ignored: codec has no config box");
                }
            }
        }

        self.samples.push(PendingSample {
            mdat_offset: self.mdat.len() as u64,
            size,
            timestamp_us: chunk.timestamp_us,
            key_frame: chunk.key_frame,
        });
        self.mdat.extend_from_slice(&chunk.data);
        tracing::trace!(chunk = index, size, timestamp_us = chunk.timestamp_us, "chunk muxed");
        Ok(())
    }

    /// Write the container. Valid exactly once.
    #[tracing::instrument(skip(self), fields(chunks = self.samples.len()))]
    pub fn finalize(&mut self) -> ReelResult<Bytes> {
        if self.state == MuxerState::Finalized {
            return Err(ReelError::muxer_state(
                self.chunk_count(),
                "finalize called twice",
            ));
        }

        let records = self.sample_records()?;
        let tables = TrackTables {
            width: self.cfg.width as u16,
            height: self.cfg.height as u16,
            codec: &self.cfg.codec,
            samples: &records,
        };

        let mdat = std::mem::take(&mut self.mdat);
        let ftyp = mp4::build_ftyp();
        let mdat_header = mp4::mdat_header(mdat.len() as u64);

        // The moov size does not depend on offset values, only on the offset width.
        let moov_len = mp4::build_moov(&tables, 0, true).len() as u64;
        let file_len = (ftyp.len() + mdat_header.len()) as u64 + mdat.len() as u64 + moov_len;
        let use_co64 = file_len > u64::from(u32::MAX);

        let mut out = Vec::with_capacity(file_len as usize);
        out.extend_from_slice(&ftyp);
        if self.cfg.fast_start {
            let moov_len = mp4::build_moov(&tables, 0, use_co64).len() as u64;
            let body_start = (ftyp.len() + mdat_header.len()) as u64 + moov_len;
            out.extend_from_slice(&mp4::build_moov(&tables, body_start, use_co64));
            out.extend_from_slice(&mdat_header);
            out.extend_from_slice(&mdat);
        } else {
            let body_start = (ftyp.len() + mdat_header.len()) as u64;
            out.extend_from_slice(&mdat_header);
            out.extend_from_slice(&mdat);
            out.extend_from_slice(&mp4::build_moov(&tables, body_start, use_co64));
        }

        let buffer = Bytes::from(out);
        self.state = MuxerState::Finalized;
        self.output = Some(buffer.clone());
        tracing::debug!(bytes = buffer.len(), fast_start = self.cfg.fast_start, "muxer finalized");
        Ok(buffer)
    }

    fn sample_records(&self) -> ReelResult<Vec<SampleRecord>> {
        let n = self.samples.len();
        let mut records = Vec::with_capacity(n);
        for (i, s) in self.samples.iter().enumerate() {
            let duration = match self.samples.get(i + 1) {
                Some(next) => next.timestamp_us - s.timestamp_us,
                None => self.last_duration(),
            };
            let duration = u32::try_from(duration).map_err(|_| {
                ReelError::muxer_state(i as u64, "sample duration exceeds the container range")
            })?;
            records.push(SampleRecord {
                mdat_offset: s.mdat_offset,
                size: s.size,
                timestamp: s.timestamp_us,
                duration,
                key_frame: s.key_frame,
            });
        }
        Ok(records)
    }

    /// Until the nominal end of the stream, else the previous delta, else one nominal frame.
    fn last_duration(&self) -> u64 {
        let n = self.samples.len();
        let Some(last) = self.samples.last() else {
            return 0;
        };
        let nominal_end = self.cfg.fps.timestamp_us(FrameIndex(n as u64));
        if nominal_end > last.timestamp_us {
            return nominal_end - last.timestamp_us;
        }
        if n >= 2 {
            return last.timestamp_us - self.samples[n - 2].timestamp_us;
        }
        self.cfg.fps.frame_duration_us(FrameIndex(0)).max(1)
    }
}

impl ChunkSink for Muxer {
    fn add_chunk(&mut self, chunk: EncodedChunk, meta: ChunkMetadata) -> ReelResult<()> {
        self.append(chunk, meta)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mux/muxer.rs"]
mod tests;
