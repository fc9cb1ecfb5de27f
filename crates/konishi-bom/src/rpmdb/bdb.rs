//! Read-only access to Berkeley DB *hash* databases.
//!
//! Only what `/var/lib/rpm/Packages` needs is supported: an unencrypted
//! hash database whose values are stored off-page in overflow chains.
//! Keys are ignored.

use std::io::{Read, Seek, SeekFrom};

use super::RpmDbError;

const HASH_MAGIC: u32 = 0x0006_1561;
const PAGE_HEADER_LEN: usize = 26;
const META_LEN: usize = 72;

const PAGE_HASH_UNSORTED: u8 = 2;
const PAGE_OVERFLOW: u8 = 7;
const PAGE_HASH_META: u8 = 8;
const PAGE_HASH: u8 = 13;

const ITEM_OFFPAGE: u8 = 3;
const OFFPAGE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u32(self, b: &[u8], at: usize) -> Result<u32, RpmDbError> {
        let raw: [u8; 4] = b
            .get(at..at + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or(RpmDbError::Truncated { what: "u32 field" })?;
        Ok(match self {
            Self::Little => u32::from_le_bytes(raw),
            Self::Big => u32::from_be_bytes(raw),
        })
    }

    fn u16(self, b: &[u8], at: usize) -> Result<u16, RpmDbError> {
        let raw: [u8; 2] = b
            .get(at..at + 2)
            .and_then(|s| s.try_into().ok())
            .ok_or(RpmDbError::Truncated { what: "u16 field" })?;
        Ok(match self {
            Self::Little => u16::from_le_bytes(raw),
            Self::Big => u16::from_be_bytes(raw),
        })
    }
}

/// Page header fields used by the scanner.
#[derive(Debug)]
struct PageHeader {
    next_pgno: u32,
    entries: u16,
    hf_offset: u16,
    page_type: u8,
}

/// An open hash database.
#[derive(Debug)]
pub struct HashDb<R> {
    reader: R,
    endian: Endian,
    page_size: usize,
    last_pgno: u32,
}

impl<R: Read + Seek> HashDb<R> {
    /// Validate the metadata page and prepare for scanning.
    pub fn open(mut reader: R) -> Result<Self, RpmDbError> {
        let mut meta = [0u8; META_LEN];
        reader.seek(SeekFrom::Start(0))?;
        reader
            .read_exact(&mut meta)
            .map_err(|_| RpmDbError::Truncated { what: "metadata page" })?;

        let endian = match Endian::Little.u32(&meta, 12)? {
            HASH_MAGIC => Endian::Little,
            m if m.swap_bytes() == HASH_MAGIC => Endian::Big,
            magic => return Err(RpmDbError::NotHashDb { magic }),
        };
        if meta[24] != 0 {
            return Err(RpmDbError::Encrypted);
        }
        if meta[25] != PAGE_HASH_META {
            return Err(RpmDbError::UnexpectedPage {
                pgno: 0,
                page_type: meta[25],
            });
        }
        let page_size = endian.u32(&meta, 20)? as usize;
        if page_size < PAGE_HEADER_LEN + OFFPAGE_LEN || page_size > 64 * 1024 {
            return Err(RpmDbError::PageSize(page_size));
        }
        let last_pgno = endian.u32(&meta, 32)?;

        Ok(Self {
            reader,
            endian,
            page_size,
            last_pgno,
        })
    }

    /// Every value stored off-page, in page order.
    pub fn values(&mut self) -> Result<Vec<Vec<u8>>, RpmDbError> {
        let mut out = Vec::new();
        for pgno in 1..=self.last_pgno {
            let page = self.page(pgno)?;
            let header = self.header(&page)?;
            if header.page_type != PAGE_HASH && header.page_type != PAGE_HASH_UNSORTED {
                continue;
            }
            // entries alternate key, value
            for i in (1..usize::from(header.entries)).step_by(2) {
                let offset = usize::from(self.endian.u16(&page, PAGE_HEADER_LEN + i * 2)?);
                let item = page
                    .get(offset..offset + OFFPAGE_LEN)
                    .ok_or(RpmDbError::Truncated { what: "hash item" })?;
                if item[0] != ITEM_OFFPAGE {
                    continue;
                }
                let start = self.endian.u32(item, 4)?;
                let total = self.endian.u32(item, 8)? as usize;
                out.push(self.overflow(start, total)?);
            }
        }
        Ok(out)
    }

    fn page(&mut self, pgno: u32) -> Result<Vec<u8>, RpmDbError> {
        if pgno > self.last_pgno {
            return Err(RpmDbError::PageOutOfRange { pgno });
        }
        let mut buf = vec![0u8; self.page_size];
        self.reader
            .seek(SeekFrom::Start(u64::from(pgno) * self.page_size as u64))?;
        self.reader
            .read_exact(&mut buf)
            .map_err(|_| RpmDbError::Truncated { what: "page" })?;
        Ok(buf)
    }

    fn header(&self, page: &[u8]) -> Result<PageHeader, RpmDbError> {
        Ok(PageHeader {
            next_pgno: self.endian.u32(page, 16)?,
            entries: self.endian.u16(page, 20)?,
            hf_offset: self.endian.u16(page, 22)?,
            page_type: page[25],
        })
    }

    fn overflow(&mut self, start: u32, total: usize) -> Result<Vec<u8>, RpmDbError> {
        let mut data = Vec::with_capacity(total);
        let mut pgno = start;
        let mut hops = 0u32;
        while pgno != 0 && data.len() < total {
            hops += 1;
            if hops > self.last_pgno {
                return Err(RpmDbError::OverflowCycle { pgno: start });
            }
            let page = self.page(pgno)?;
            let header = self.header(&page)?;
            if header.page_type != PAGE_OVERFLOW {
                return Err(RpmDbError::UnexpectedPage {
                    pgno,
                    page_type: header.page_type,
                });
            }
            let len = usize::from(header.hf_offset).min(total - data.len());
            let chunk = page
                .get(PAGE_HEADER_LEN..PAGE_HEADER_LEN + len)
                .ok_or(RpmDbError::Truncated { what: "overflow page" })?;
            data.extend_from_slice(chunk);
            pgno = header.next_pgno;
        }
        if data.len() < total {
            return Err(RpmDbError::Truncated {
                what: "overflow chain",
            });
        }
        Ok(data)
    }
}
