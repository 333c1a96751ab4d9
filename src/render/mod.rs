//! Raster frames and the frame-source boundary.
//!
//! The pipeline pulls one [`frame::RasterImage`] per frame index from a [`source::FrameSource`].

/// Raster image type handed from the frame source to the encoder.
pub mod frame;
/// Frame source trait and built-in sources.
pub mod source;
