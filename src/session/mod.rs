//! Pipeline configuration and the driver that ties source, encoder, and muxer together.

/// Serializable run configuration.
pub mod config;
/// Pipeline driver and cancellation.
pub mod pipeline;
