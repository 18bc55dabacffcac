use crate::core::io::traits::SourceFile;
use crate::core::models::domain::DomainRecord;
use bincode::{Decode, Encode};
use std::io::{self, Read, Write};
use thiserror::Error;

/// Layout tag written at the start of every container.
pub const LAYOUT: &str = "cath-dataset-only-protein";
/// Current container format version.
pub const FORMAT_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to decode domain record: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("Failed to encode domain record: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("Unsupported container layout '{layout}' (version {version})")]
    UnsupportedLayout { layout: String, version: u32 },
}

#[derive(Debug, Encode, Decode)]
struct Header {
    layout: String,
    version: u32,
}

/// The compressed per-domain container: a zstd stream holding a bincode header and one
/// [`DomainRecord`].
pub struct DomainContainer;

impl DomainContainer {
    /// The file name under which a domain is stored locally and remotely.
    pub fn file_name(domain: &str) -> String {
        format!("mdcath_dataset_{domain}.bin.zst")
    }
}

impl SourceFile for DomainContainer {
    type Record = DomainRecord;
    type Error = ContainerError;

    fn read_from(reader: &mut impl Read) -> Result<Self::Record, Self::Error> {
        let config = bincode::config::standard();
        let mut decoder = zstd::stream::read::Decoder::new(reader)?;

        let header: Header = bincode::decode_from_std_read(&mut decoder, config)?;
        if header.layout != LAYOUT || header.version != FORMAT_VERSION {
            return Err(ContainerError::UnsupportedLayout {
                layout: header.layout,
                version: header.version,
            });
        }

        let record: DomainRecord = bincode::decode_from_std_read(&mut decoder, config)?;
        Ok(record)
    }

    fn write_to(record: &Self::Record, writer: &mut impl Write) -> Result<(), Self::Error> {
        let config = bincode::config::standard();
        let mut encoder = zstd::stream::write::Encoder::new(writer, ZSTD_LEVEL)?;

        let header = Header {
            layout: LAYOUT.to_string(),
            version: FORMAT_VERSION,
        };
        bincode::encode_into_std_write(&header, &mut encoder, config)?;
        bincode::encode_into_std_write(record, &mut encoder, config)?;
        encoder.finish()?;
        Ok(())
    }
}
