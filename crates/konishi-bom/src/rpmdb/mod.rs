//! Native reader for the rpm `Packages` database.
//!
//! The database is a Berkeley DB hash file whose values are RPM header
//! blobs. [`read_packages`] walks every value and extracts the fields the
//! rpm probe needs.

mod bdb;
mod header;

use std::io::{Read, Seek};

pub use bdb::HashDb;
pub use header::Header;

use crate::dependency::HashType;

/// Errors from reading an rpm database.
#[derive(Debug, thiserror::Error)]
pub enum RpmDbError {
    /// The file is not a Berkeley DB hash database.
    #[error("not a Berkeley DB hash database (magic {magic:#x})")]
    NotHashDb {
        /// Magic number found at the metadata offset.
        magic: u32,
    },

    /// Encrypted databases cannot be read.
    #[error("encrypted database is not supported")]
    Encrypted,

    /// The metadata page declares an unusable page size.
    #[error("invalid page size {0}")]
    PageSize(usize),

    /// A page reference points past the last page.
    #[error("page {pgno} out of range")]
    PageOutOfRange {
        /// Referenced page number.
        pgno: u32,
    },

    /// A page has a type that is not valid at that position.
    #[error("unexpected page type {page_type} at page {pgno}")]
    UnexpectedPage {
        /// Page number.
        pgno: u32,
        /// Page type byte.
        page_type: u8,
    },

    /// An overflow chain loops back on itself.
    #[error("overflow chain starting at page {pgno} does not terminate")]
    OverflowCycle {
        /// First page of the chain.
        pgno: u32,
    },

    /// The data ended before a structure was complete.
    #[error("truncated {what}")]
    Truncated {
        /// What was being read.
        what: &'static str,
    },

    /// An RPM header blob is malformed.
    #[error("malformed package header: {0}")]
    Header(String),

    /// I/O error reading the database file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One installed package as recorded in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpmPackage {
    /// Package name.
    pub name: String,
    /// Upstream version.
    pub version: String,
    /// Distribution release.
    pub release: String,
    /// License tag, when set.
    pub license: Option<String>,
    /// Hex digest per file; empty for files without content.
    pub file_digests: Vec<String>,
    /// Algorithm of `file_digests`.
    pub digest_algorithm: HashType,
}

/// Maps an rpm `FILEDIGESTALGO` value to a [`HashType`].
#[must_use]
pub const fn digest_algorithm(id: i32) -> HashType {
    match id {
        1 => HashType::Md5,
        2 => HashType::Sha1,
        5 => HashType::Md2,
        8 => HashType::Sha256,
        9 => HashType::Sha384,
        10 => HashType::Sha512,
        11 => HashType::Sha224,
        _ => HashType::Invalid,
    }
}

impl RpmPackage {
    /// Extract a package from one header blob.
    pub fn from_blob(blob: &[u8]) -> Result<Self, RpmDbError> {
        let h = Header::parse(blob)?;
        let name = h
            .string(header::TAG_NAME)?
            .ok_or_else(|| RpmDbError::Header("package without NAME".to_owned()))?;
        let algo = h.int32(header::TAG_FILEDIGESTALGO)?.unwrap_or(1);
        Ok(Self {
            name,
            version: h.string(header::TAG_VERSION)?.unwrap_or_default(),
            release: h.string(header::TAG_RELEASE)?.unwrap_or_default(),
            license: h.string(header::TAG_LICENSE)?,
            file_digests: h.string_array(header::TAG_FILEDIGESTS)?,
            digest_algorithm: digest_algorithm(algo),
        })
    }
}

/// Every package in an rpm `Packages` database.
pub fn read_packages<R: Read + Seek>(reader: R) -> Result<Vec<RpmPackage>, RpmDbError> {
    let mut db = HashDb::open(reader)?;
    db.values()?
        .iter()
        .map(|blob| RpmPackage::from_blob(blob))
        .collect()
}
