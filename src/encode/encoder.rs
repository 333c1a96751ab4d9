use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;

use crate::encode::codec::{CodecFault, EncodeContext, EncodedPacket, VideoCodec};
use crate::encode::reorder::ReorderBuffer;
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::frame::RasterImage;

/// One compressed frame in submission order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedChunk {
    /// Submission sequence number (0-based).
    pub seq: u64,
    /// Presentation timestamp in microseconds.
    pub timestamp_us: u64,
    /// Whether the chunk decodes on its own.
    pub key_frame: bool,
    /// Opaque bitstream bytes.
    pub data: Vec<u8>,
}

/// Side information delivered with a chunk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// New decoder configuration, when the codec emitted one with this chunk.
    pub decoder_config: Option<Vec<u8>>,
}

/// Receiver of encoded chunks.
///
/// Called from a single delivery thread, strictly in submission order.
pub trait ChunkSink: Send {
    /// Accept the next chunk.
    fn add_chunk(&mut self, chunk: EncodedChunk, meta: ChunkMetadata) -> ReelResult<()>;
}

/// Encoder tuning.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EncoderOpts {
    /// Maximum rasters held by the encoder at once (queued or being compressed).
    /// `submit` blocks while this many are outstanding.
    pub queue_depth: usize,
    /// Codec worker threads. `None` uses rayon defaults.
    pub workers: Option<usize>,
}

impl Default for EncoderOpts {
    fn default() -> Self {
        Self {
            queue_depth: 4,
            workers: None,
        }
    }
}

impl EncoderOpts {
    /// Reject values the encoder cannot run with.
    pub fn validate(&self) -> ReelResult<()> {
        if self.queue_depth == 0 {
            return Err(ReelError::config("encoder queue_depth must be >= 1"));
        }
        if self.workers == Some(0) {
            return Err(ReelError::config(
                "encoder 'workers' must be >= 1 when set",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Shared {
    faulted: AtomicBool,
    aborted: AtomicBool,
}

impl Shared {
    fn faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    fn aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    fn halted(&self) -> bool {
        self.faulted() || self.aborted()
    }
}

#[derive(Debug)]
enum JobOutcome {
    Encoded(EncodedPacket),
    Faulted(CodecFault),
    Skipped,
}

#[derive(Debug)]
struct Completion {
    seq: u64,
    timestamp_us: u64,
    outcome: JobOutcome,
}

struct Delivered<S> {
    sink: S,
    delivered: u64,
    fault: Option<ReelError>,
}

/// Asynchronous, bounded, order-preserving encoder.
///
/// Frames are compressed on a worker pool and may finish in any order; chunks are forwarded to
/// the sink in submission order from a single delivery thread that owns the sink until
/// [`Encoder::flush`] hands it back.
pub struct Encoder<S: ChunkSink + 'static> {
    codec: Arc<dyn VideoCodec>,
    pool: rayon::ThreadPool,
    permits_rx: mpsc::Receiver<()>,
    permits_tx: mpsc::SyncSender<()>,
    done_tx: Option<mpsc::Sender<Completion>>,
    delivery: Option<JoinHandle<Delivered<S>>>,
    shared: Arc<Shared>,
    next_seq: u64,
    last_timestamp: Option<u64>,
}

impl<S: ChunkSink + 'static> Encoder<S> {
    /// Start an encoder that compresses with `codec` and delivers into `sink`.
    pub fn new(codec: Arc<dyn VideoCodec>, sink: S, opts: EncoderOpts) -> ReelResult<Self> {
        opts.validate()?;
        let pool = build_thread_pool(opts.workers)?;

        let (permits_tx, permits_rx) = mpsc::sync_channel::<()>(opts.queue_depth);
        for _ in 0..opts.queue_depth {
            permits_tx
                .send(())
                .map_err(|_| ReelError::config("failed to seed encoder permits"))?;
        }

        let shared = Arc::new(Shared::default());
        let (done_tx, done_rx) = mpsc::channel::<Completion>();
        let shared_delivery = shared.clone();
        let delivery = std::thread::Builder::new()
            .name("reelmux-deliver".to_string())
            .spawn(move || deliver_in_order(sink, done_rx, &shared_delivery))
            .map_err(|e| {
                ReelError::Other(anyhow::anyhow!("failed to spawn delivery thread: {e}"))
            })?;

        Ok(Self {
            codec,
            pool,
            permits_rx,
            permits_tx,
            done_tx: Some(done_tx),
            delivery: Some(delivery),
            shared,
            next_seq: 0,
            last_timestamp: None,
        })
    }

    /// Number of frames accepted so far.
    pub fn submitted(&self) -> u64 {
        self.next_seq
    }

    /// Hand `frame` to the encoder.
    ///
    /// Ownership moves to the encoder, which drops the raster as soon as the codec is done with
    /// it. Blocks while `queue_depth` frames are outstanding. Fails if `timestamp_us` does not
    /// exceed the previous submission, or if an earlier frame already faulted.
    pub fn submit(&mut self, frame: RasterImage, timestamp_us: u64) -> ReelResult<()> {
        let seq = self.next_seq;
        if self.shared.faulted() {
            return Err(ReelError::encoder(
                seq,
                "encoder halted after an earlier codec fault",
            ));
        }
        if let Some(previous_us) = self.last_timestamp
            && timestamp_us <= previous_us
        {
            return Err(ReelError::InvalidTimestamp {
                frame: seq,
                timestamp_us,
                previous_us,
            });
        }
        let done = self
            .done_tx
            .as_ref()
            .ok_or_else(|| ReelError::encoder(seq, "encoder is already closed"))?
            .clone();

        // Backpressure: one permit per raster held by the encoder.
        self.permits_rx
            .recv()
            .map_err(|_| ReelError::encoder(seq, "encoder permit channel closed"))?;

        let codec = self.codec.clone();
        let permits = self.permits_tx.clone();
        let shared = self.shared.clone();
        self.pool.spawn(move || {
            let ctx = EncodeContext { seq, timestamp_us };
            let outcome = if shared.halted() {
                JobOutcome::Skipped
            } else {
                match catch_unwind(AssertUnwindSafe(|| codec.encode(&frame, ctx))) {
                    Ok(Ok(packet)) => JobOutcome::Encoded(packet),
                    Ok(Err(fault)) => JobOutcome::Faulted(fault),
                    Err(_) => JobOutcome::Faulted(CodecFault::new("codec panicked")),
                }
            };
            drop(frame);
            let _ = permits.send(());
            let _ = done.send(Completion {
                seq,
                timestamp_us,
                outcome,
            });
        });

        tracing::trace!(seq, timestamp_us, "frame submitted");
        self.next_seq += 1;
        self.last_timestamp = Some(timestamp_us);
        Ok(())
    }

    /// Wait until every submitted frame is encoded and delivered, then return the sink.
    ///
    /// Fails with the first codec fault (lowest frame) or sink error. No retry is attempted.
    #[tracing::instrument(skip(self), fields(submitted = self.next_seq))]
    pub fn flush(mut self) -> ReelResult<S> {
        let submitted = self.next_seq;
        let out = self.close()?;
        if let Some(fault) = out.fault {
            tracing::warn!(error = %fault, "encoder flush failed");
            return Err(fault);
        }
        if out.delivered != submitted {
            return Err(ReelError::encoder(
                out.delivered,
                format!(
                    "only {} of {submitted} submitted frames were delivered",
                    out.delivered
                ),
            ));
        }
        tracing::debug!(delivered = out.delivered, "encoder flushed");
        Ok(out.sink)
    }

    /// Discard all pending work and the sink. Waits for in-flight codec calls to return so every
    /// raster is released before this returns.
    pub fn abort(mut self) {
        self.shared.aborted.store(true, Ordering::Release);
        match self.close() {
            Ok(out) => {
                tracing::warn!(
                    submitted = self.next_seq,
                    delivered = out.delivered,
                    "encoder aborted"
                )
            }
            Err(e) => tracing::warn!(error = %e, "encoder abort failed to join delivery"),
        }
    }

    fn close(&mut self) -> ReelResult<Delivered<S>> {
        drop(self.done_tx.take());
        let handle = self
            .delivery
            .take()
            .ok_or_else(|| ReelError::encoder(self.next_seq, "encoder is already closed"))?;
        handle
            .join()
            .map_err(|_| ReelError::encoder(self.next_seq, "delivery thread panicked"))
    }
}

impl<S: ChunkSink + 'static> Drop for Encoder<S> {
    fn drop(&mut self) {
        if self.delivery.is_some() {
            self.shared.aborted.store(true, Ordering::Release);
            let _ = self.close();
        }
    }
}

fn deliver_in_order<S: ChunkSink>(
    mut sink: S,
    done: mpsc::Receiver<Completion>,
    shared: &Shared,
) -> Delivered<S> {
    let mut reorder = ReorderBuffer::<Completion>::new();
    let mut delivered = 0u64;
    let mut fault: Option<ReelError> = None;
    let mut fault_seq = u64::MAX;

    // Runs until every job and the encoder itself dropped their senders.
    for msg in done {
        if let JobOutcome::Faulted(f) = &msg.outcome {
            shared.faulted.store(true, Ordering::Release);
            if msg.seq < fault_seq {
                tracing::warn!(frame = msg.seq, error = %f, "codec fault");
                fault_seq = msg.seq;
                fault = Some(ReelError::encoder(msg.seq, f.0.clone()));
            }
            continue;
        }
        if shared.halted() {
            continue;
        }

        let ready = match reorder.push(msg.seq, msg) {
            Ok(ready) => ready,
            Err(dup) => {
                shared.faulted.store(true, Ordering::Release);
                fault = Some(ReelError::encoder(dup.seq, "duplicate completion"));
                fault_seq = dup.seq;
                continue;
            }
        };
        for c in ready {
            let JobOutcome::Encoded(packet) = c.outcome else {
                continue;
            };
            let chunk = EncodedChunk {
                seq: c.seq,
                timestamp_us: c.timestamp_us,
                key_frame: packet.key_frame,
                data: packet.data,
            };
            let meta = ChunkMetadata {
                decoder_config: packet.decoder_config,
            };
            if let Err(e) = sink.add_chunk(chunk, meta) {
                shared.faulted.store(true, Ordering::Release);
                if c.seq < fault_seq {
                    fault_seq = c.seq;
                    fault = Some(e);
                }
                break;
            }
            tracing::trace!(seq = c.seq, "chunk delivered");
            delivered += 1;
        }
    }

    let parked = reorder.clear();
    if parked > 0 && fault.is_none() && !shared.aborted() {
        fault = Some(ReelError::encoder(
            reorder.next_seq(),
            format!("{parked} chunks never became deliverable"),
        ));
    }

    Delivered {
        sink,
        delivered,
        fault,
    }
}

fn build_thread_pool(threads: Option<usize>) -> ReelResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(ReelError::config(
            "encoder 'workers' must be >= 1 when set",
        ));
    }

    let mut builder =
        rayon::ThreadPoolBuilder::new().thread_name(|i| format!("reelmux-encode-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| ReelError::config(format!("failed to build encoder thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/encode/encoder.rs"]
mod tests;
