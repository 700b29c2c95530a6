//! Configuration for worldsave
//!
//! Centralized writer/reader configuration with sensible defaults.

use crate::error::{PersistError, Result};

/// Default buffer size of the synchronous writer (32 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Default rotation threshold of the asynchronous writer (1 MiB)
pub const DEFAULT_ASYNC_BUFFER_SIZE: usize = 1024 * 1024;

/// Configuration shared by writers and readers of one stream
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Encoding Configuration
    // -------------------------------------------------------------------------
    /// Prepend a presence byte (0 = null, 1 = present) to every string.
    ///
    /// Writer and reader of a stream must agree on this.
    pub prefix_strings: bool,

    // -------------------------------------------------------------------------
    // Buffering Configuration
    // -------------------------------------------------------------------------
    /// Size of the synchronous writer's fixed buffer (in bytes)
    pub buffer_size: usize,

    /// Length at which the async writer rotates its current buffer (in bytes)
    pub async_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix_strings: true,
            buffer_size: DEFAULT_BUFFER_SIZE,
            async_buffer_size: DEFAULT_ASYNC_BUFFER_SIZE,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject configurations no writer can operate with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(PersistError::Config(
                "buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.async_buffer_size == 0 {
            return Err(PersistError::Config(
                "async_buffer_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Enable or disable string presence bytes
    pub fn prefix_strings(mut self, prefix: bool) -> Self {
        self.config.prefix_strings = prefix;
        self
    }

    /// Set the synchronous writer's buffer size (in bytes)
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Set the async writer's rotation threshold (in bytes)
    pub fn async_buffer_size(mut self, size: usize) -> Self {
        self.config.async_buffer_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
