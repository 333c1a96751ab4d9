//! Encoding: codec boundary, built-in codecs, and the asynchronous ordered encoder.
//!
//! Frames enter through [`encoder::Encoder::submit`] in timestamp order; compressed chunks leave
//! through a [`encoder::ChunkSink`] in the same order.

/// Codec trait, descriptors, and codec selection.
pub mod codec;
/// Bounded, parallel, order-preserving encoder.
pub mod encoder;
/// Motion-JPEG codec.
pub mod mjpeg;
/// Uncompressed RGB24 codec.
pub mod raw;
/// Sequence-keyed reorder buffer.
pub mod reorder;
