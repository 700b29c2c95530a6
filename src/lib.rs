//! # worldsave
//!
//! A versioned binary persistence engine for long-lived world objects:
//! - Bit-exact little-endian wire format with varints and delta timestamps
//! - Buffered synchronous writer and background-batched async writer
//! - Cross-references persisted as serials, resolved through an injected
//!   entity resolver
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │               Persisted objects (save / load)                │
//! │          version first, then version-keyed fields            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐        ┌────────────┐
//!   │GenericWriter│          │GenericReader│ ─────▶ │  Entity    │
//!   │ sync/async  │ ───────▶ │  buffered   │        │  Resolver  │
//!   └──────┬──────┘          └─────────────┘        └────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │Primitive    │
//!   │Codec        │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod types;
pub mod resolver;
pub mod writer;
pub mod reader;
pub mod record;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{PersistError, Result};
pub use config::Config;
pub use record::Persist;
pub use reader::{BinaryFileReader, GenericReader};
pub use resolver::{EntityResolver, MemoryResolver, SerialResolver};
pub use types::{Serial, TimeSpan, Timestamp};
pub use writer::{AsyncWriter, BinaryFileWriter, GenericWriter};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of worldsave
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
