/// Crate result alias.
pub type ReelResult<T> = Result<T, ReelError>;

/// Every failure aborts the whole run; variants carry where it happened.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// Invalid pipeline configuration, reported before any work starts.
    #[error("config error: {0}")]
    Config(String),

    /// The frame source failed to produce a frame.
    #[error("frame source error at frame {frame}: {message}")]
    FrameSource {
        /// Frame index that failed.
        frame: u64,
        /// Source-provided detail.
        message: String,
    },

    /// A frame was submitted with a timestamp not after the previous one.
    #[error(
        "invalid timestamp at frame {frame}: {timestamp_us}us is not after previous {previous_us}us"
    )]
    InvalidTimestamp {
        /// Submission sequence number of the offending frame.
        frame: u64,
        /// Rejected timestamp.
        timestamp_us: u64,
        /// Last accepted timestamp.
        previous_us: u64,
    },

    /// The codec reported a fault. Never retried.
    #[error("encoder error at frame {frame}: {message}")]
    Encoder {
        /// Submission sequence number of the frame that faulted.
        frame: u64,
        /// Codec-provided detail.
        message: String,
    },

    /// Muxer protocol violation (chunk after finalize, double finalize, bad chunk).
    #[error("muxer state error at chunk {chunk}: {message}")]
    MuxerState {
        /// Index of the chunk (or chunk count) at which the violation happened.
        chunk: u64,
        /// What went wrong.
        message: String,
    },

    /// The run was cancelled; nothing was finalized.
    #[error("cancelled at frame {frame}")]
    Cancelled {
        /// First frame that was not submitted.
        frame: u64,
    },

    /// A container buffer could not be parsed.
    #[error("container error: {0}")]
    Container(String),

    /// Anything else (I/O and friends).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    /// Build a [`ReelError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`ReelError::FrameSource`].
    pub fn frame_source(frame: u64, msg: impl Into<String>) -> Self {
        Self::FrameSource {
            frame,
            message: msg.into(),
        }
    }

    /// Build a [`ReelError::Encoder`].
    pub fn encoder(frame: u64, msg: impl Into<String>) -> Self {
        Self::Encoder {
            frame,
            message: msg.into(),
        }
    }

    /// Build a [`ReelError::MuxerState`].
    pub fn muxer_state(chunk: u64, msg: impl Into<String>) -> Self {
        Self::MuxerState {
            chunk,
            message: msg.into(),
        }
    }

    /// Build a [`ReelError::Container`].
    pub fn container(msg: impl Into<String>) -> Self {
        Self::Container(msg.into())
    }

    /// Frame or chunk position carried by the error, if any.
    pub fn position(&self) -> Option<u64> {
        match self {
            Self::FrameSource { frame, .. }
            | Self::InvalidTimestamp { frame, .. }
            | Self::Encoder { frame, .. }
            | Self::Cancelled { frame } => Some(*frame),
            Self::MuxerState { chunk, .. } => Some(*chunk),
            Self::Config(_) | Self::Container(_) | Self::Other(_) => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
