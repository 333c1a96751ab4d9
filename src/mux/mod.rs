/// Read-back of finished MP4 buffers.
pub mod demux;
pub(crate) mod mp4;
/// Chunk buffering and container finalization.
pub mod muxer;
