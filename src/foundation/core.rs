use crate::foundation::error::{ReelError, ReelResult};

/// Microseconds per second; every timestamp in the pipeline uses this resolution.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Absolute 0-based frame index in stream order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Half-open frame range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    /// Inclusive range start.
    pub start: FrameIndex,
    /// Exclusive range end.
    pub end: FrameIndex, // exclusive
}

impl FrameRange {
    /// Create a validated range with `start <= end`.
    pub fn new(start: FrameIndex, end: FrameIndex) -> ReelResult<Self> {
        if start.0 > end.0 {
            return Err(ReelError::config("FrameRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Range `[0, count)`.
    pub fn first(count: u64) -> Self {
        Self {
            start: FrameIndex(0),
            end: FrameIndex(count),
        }
    }

    /// Return `true` when the range has no frames.
    pub fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    /// Return `true` when `f` is inside `[start, end)`.
    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 < self.end.0
    }

    /// Iterate the indices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = FrameIndex> {
        (self.start.0..self.end.0).map(FrameIndex)
    }
}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32, // must be > 0
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> ReelResult<Self> {
        if den == 0 {
            return Err(ReelError::config("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(ReelError::config("Fps num must be > 0"));
        }
        // Consecutive frames must land on distinct microsecond timestamps.
        if u64::from(num) > u64::from(den) * MICROS_PER_SEC {
            return Err(ReelError::config(format!(
                "Fps {num}/{den} is finer than one frame per microsecond"
            )));
        }
        Ok(Self { num, den })
    }

    /// Integer frame rate `n/1`.
    pub fn integer(num: u32) -> ReelResult<Self> {
        Self::new(num, 1)
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Presentation timestamp of `frame` in microseconds.
    ///
    /// Computed as `frame * 1_000_000 * den / num` with the multiplication done first in
    /// 128-bit arithmetic, so the value for frame `n` never depends on earlier frames and
    /// rounding cannot accumulate. Saturates at `u64::MAX`.
    pub fn timestamp_us(self, frame: FrameIndex) -> u64 {
        if self.num == 0 {
            return 0;
        }
        let scaled = u128::from(frame.0) * u128::from(MICROS_PER_SEC) * u128::from(self.den);
        u64::try_from(scaled / u128::from(self.num)).unwrap_or(u64::MAX)
    }

    /// Duration of frame `frame` in microseconds (distance to the next frame's timestamp).
    pub fn frame_duration_us(self, frame: FrameIndex) -> u64 {
        self.timestamp_us(FrameIndex(frame.0.saturating_add(1)))
            .saturating_sub(self.timestamp_us(frame))
    }

    /// Convert seconds to frame count using floor semantics.
    pub fn secs_to_frames_floor(self, secs: f64) -> u64 {
        (secs * self.as_f64()).floor().max(0.0) as u64
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Number of pixels covered by the canvas.
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
