//! Script output: an in-memory buffer, a file, or both.
//!
//! The file is truncated when the sink is opened and appended to after
//! that. Growing the in-memory buffer is fallible; when it cannot grow the
//! error is reported once and the text gathered so far is kept.

use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::core::RunContext;
use crate::error::Result;

/// Destination for generated statements.
#[derive(Debug, Default)]
pub struct ScriptSink {
    buffer: Option<String>,
    file: Option<File>,
    path: Option<PathBuf>,
    overflowed: bool,
    statements: usize,
}

impl ScriptSink {
    /// A sink that discards everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep statements in memory.
    pub fn with_string(mut self) -> Self {
        self.buffer = Some(String::new());
        self
    }

    /// Write statements to `path`, creating parent folders and truncating
    /// any existing file.
    pub async fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        self.file = Some(File::create(path).await?);
        self.path = Some(path.to_path_buf());
        info!("Writing script to {}", path.display());
        Ok(self)
    }

    /// True when written text goes anywhere.
    pub fn is_active(&self) -> bool {
        self.buffer.is_some() || self.file.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of statements written.
    pub fn statements(&self) -> usize {
        self.statements
    }

    /// True once the in-memory buffer stopped growing.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Append one statement followed by a line break.
    pub async fn write(&mut self, ctx: &RunContext, statement: &str) -> Result<()> {
        if let (Some(buffer), false) = (self.buffer.as_mut(), self.overflowed) {
            if buffer.try_reserve(statement.len() + 1).is_ok() {
                buffer.push_str(statement);
                buffer.push('\n');
            } else {
                self.overflowed = true;
                ctx.feedback_error(format!(
                    "Script is too large to keep in memory; kept the first {} bytes.",
                    buffer.len()
                ));
            }
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(statement.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        self.statements += 1;
        Ok(())
    }

    /// Flush the file, if any.
    pub async fn flush(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush().await?;
            debug!("Flushed script after {} statement(s)", self.statements);
        }
        Ok(())
    }

    /// Flush and return the in-memory text, if kept.
    pub async fn finish(mut self) -> Result<Option<String>> {
        self.flush().await?;
        Ok(self.buffer.take())
    }
}
