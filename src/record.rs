//! Versioned Records
//!
//! The convention persisted objects follow: the layout version is written
//! first as an encoded int, then the fields that version defines, in order.
//!
//! ```text
//! ┌────────────────┬─────────────────────────────────────────┐
//! │ version (var)  │ fields, layout keyed by version         │
//! └────────────────┴─────────────────────────────────────────┘
//! ```
//!
//! `load` receives the decoded version and must read exactly what `save`
//! wrote for that version; nothing in the stream describes the fields.

use crate::error::{PersistError, Result};
use crate::reader::GenericReader;
use crate::resolver::EntityResolver;
use crate::writer::GenericWriter;

/// An object that can be saved to and loaded from a stream
pub trait Persist<R: EntityResolver> {
    /// Layout version written by `save`
    const VERSION: i32;

    /// Write the fields of layout `VERSION`
    fn save<W: GenericWriter<Resolver = R>>(&self, writer: &mut W) -> Result<()>;

    /// Read the fields of layout `version`
    fn load<Rd: GenericReader<Resolver = R>>(&mut self, reader: &mut Rd, version: i32) -> Result<()>;

    /// Write the version, then the fields
    fn serialize<W: GenericWriter<Resolver = R>>(&self, writer: &mut W) -> Result<()> {
        writer.write_encoded_int(Self::VERSION)?;
        self.save(writer)
    }

    /// Read the version, then the fields of that version
    ///
    /// Returns the version found in the stream. Versions newer than
    /// `VERSION` were written by a layout this code does not know.
    fn deserialize<Rd: GenericReader<Resolver = R>>(&mut self, reader: &mut Rd) -> Result<i32> {
        let at = reader.position();
        let version = reader.read_encoded_int()?;
        if !(0..=Self::VERSION).contains(&version) {
            return Err(PersistError::Malformed(format!(
                "record at {} has version {}, expected 0..={}",
                at,
                version,
                Self::VERSION
            )));
        }

        self.load(reader, version)?;
        Ok(version)
    }
}
