//! Destinations for the finished container buffer.

/// Output sink trait and built-in sinks.
pub mod sink;
