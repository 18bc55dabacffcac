use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Defines the interface for reading and writing per-domain source files.
///
/// Implementors handle format-specific encoding of a single record type. Path-based
/// helpers are provided on top of the reader/writer methods.
pub trait SourceFile {
    /// The record stored in one file.
    type Record;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a record from a reader.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails or the reader reports an I/O error.
    fn read_from(reader: &mut impl Read) -> Result<Self::Record, Self::Error>;

    /// Writes a record to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the writer reports an I/O error.
    fn write_to(record: &Self::Record, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads a record from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or decoding fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self::Record, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes a record to a file path, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or encoding fails.
    fn write_to_path<P: AsRef<Path>>(record: &Self::Record, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(record, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
