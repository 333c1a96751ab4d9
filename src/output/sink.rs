use std::path::{Path, PathBuf};

use anyhow::Context as _;
use bytes::Bytes;

use crate::foundation::error::{ReelError, ReelResult};

/// Consumer of the finished container.
///
/// Receives exactly one buffer per successful run and never sees partial output.
pub trait OutputSink {
    /// Take ownership of the finished buffer.
    fn accept(&mut self, buffer: Bytes) -> ReelResult<()>;
}

/// Keeps the buffer in memory. Useful for tests and callers that post-process the bytes.
#[derive(Debug, Default)]
pub struct InMemorySink {
    buffer: Option<Bytes>,
}

impl InMemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The accepted buffer, if any.
    pub fn buffer(&self) -> Option<&Bytes> {
        self.buffer.as_ref()
    }

    /// Take the accepted buffer out of the sink.
    pub fn take(&mut self) -> Option<Bytes> {
        self.buffer.take()
    }
}

impl OutputSink for InMemorySink {
    fn accept(&mut self, buffer: Bytes) -> ReelResult<()> {
        if self.buffer.is_some() {
            return Err(ReelError::config("in-memory sink already holds a buffer"));
        }
        self.buffer = Some(buffer);
        Ok(())
    }
}

/// Writes the buffer to a file, creating parent directories.
#[derive(Clone, Debug)]
pub struct FileSink {
    path: PathBuf,
    overwrite: bool,
}

impl FileSink {
    /// Sink writing to `path`, replacing an existing file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            overwrite: true,
        }
    }

    /// Refuse to replace an existing file when `overwrite` is false.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for FileSink {
    fn accept(&mut self, buffer: Bytes) -> ReelResult<()> {
        if !self.overwrite && self.path.exists() {
            return Err(ReelError::config(format!(
                "output file '{}' already exists",
                self.path.display()
            )));
        }
        ensure_parent_dir(&self.path)?;
        std::fs::write(&self.path, &buffer)
            .with_context(|| format!("failed to write '{}'", self.path.display()))?;
        tracing::info!(path = %self.path.display(), bytes = buffer.len(), "output written");
        Ok(())
    }
}

/// Create the parent directory of `path` if it does not exist yet.
pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("failed to create output directory '{}'", parent.display())
        })?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/output/sink.rs"]
mod tests;
