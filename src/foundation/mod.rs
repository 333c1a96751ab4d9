/// Frame indices, frame rates, and canvas dimensions.
pub mod core;
/// Crate error type.
pub mod error;
pub(crate) mod math;
