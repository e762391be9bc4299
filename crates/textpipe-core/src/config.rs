//! Pipe configuration. Plain data with serde derives; overridable from env.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default maximum number of pending chunks in a pipe.
pub const DEFAULT_BUFFER_SIZE: usize = 10;

/// Environment variable read by [`PipeConfig::from_env`].
pub const BUFFER_SIZE_ENV: &str = "TEXTPIPE_BUFFER_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Maximum chunks the queue may hold before a writer blocks.
    pub buffer_size: usize,
    /// Name given to the producer thread.
    pub thread_name: String,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            thread_name: "textpipe-producer".into(),
        }
    }
}

impl PipeConfig {
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            ..Self::default()
        }
    }

    /// Defaults, overridden by `TEXTPIPE_BUFFER_SIZE` when set and parseable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(n) = std::env::var(BUFFER_SIZE_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            cfg.buffer_size = n;
        }
        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::Config(
                "buffer_size must be at least 1 (got 0)".into(),
            ));
        }
        if self.thread_name.contains('\0') {
            return Err(Error::Config("thread_name must not contain NUL".into()));
        }
        Ok(())
    }
}
