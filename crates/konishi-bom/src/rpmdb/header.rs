//! RPM header blobs as stored in the package database.
//!
//! A blob is a big-endian index of `(tag, type, offset, count)` entries
//! followed by a data store the offsets point into.

use std::collections::HashMap;

use super::RpmDbError;

pub(crate) const TAG_NAME: i32 = 1000;
pub(crate) const TAG_VERSION: i32 = 1001;
pub(crate) const TAG_RELEASE: i32 = 1002;
pub(crate) const TAG_LICENSE: i32 = 1014;
pub(crate) const TAG_FILEDIGESTS: i32 = 1035;
pub(crate) const TAG_FILEDIGESTALGO: i32 = 5011;

const TYPE_INT32: u32 = 4;
const TYPE_STRING: u32 = 6;
const TYPE_STRING_ARRAY: u32 = 8;
const TYPE_I18NSTRING: u32 = 9;

const REGION_TAGS: std::ops::RangeInclusive<i32> = 61..=63;
const ENTRY_LEN: usize = 16;
const MAX_ENTRIES: usize = 0x0001_0000;

#[derive(Debug, Clone, Copy)]
struct Entry {
    kind: u32,
    offset: usize,
    count: usize,
}

/// Parsed index over one header blob.
#[derive(Debug)]
pub struct Header<'a> {
    entries: HashMap<i32, Entry>,
    store: &'a [u8],
}

fn be_bytes(b: &[u8], at: usize) -> Result<[u8; 4], RpmDbError> {
    b.get(at..at + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or(RpmDbError::Truncated { what: "header" })
}

fn be_u32(b: &[u8], at: usize) -> Result<u32, RpmDbError> {
    be_bytes(b, at).map(u32::from_be_bytes)
}

fn be_i32(b: &[u8], at: usize) -> Result<i32, RpmDbError> {
    be_bytes(b, at).map(i32::from_be_bytes)
}

impl<'a> Header<'a> {
    /// Index a header blob.
    pub fn parse(blob: &'a [u8]) -> Result<Self, RpmDbError> {
        let il = be_u32(blob, 0)? as usize;
        let dl = be_u32(blob, 4)? as usize;
        if il == 0 || il > MAX_ENTRIES {
            return Err(RpmDbError::Header(format!("implausible index length {il}")));
        }
        let store_start = 8 + il * ENTRY_LEN;
        let store = blob
            .get(store_start..store_start + dl)
            .ok_or(RpmDbError::Truncated { what: "header data" })?;

        let mut entries = HashMap::with_capacity(il);
        for i in 0..il {
            let at = 8 + i * ENTRY_LEN;
            let tag = be_i32(blob, at)?;
            if REGION_TAGS.contains(&tag) {
                continue;
            }
            let kind = be_u32(blob, at + 4)?;
            let offset = be_i32(blob, at + 8)?;
            let count = be_u32(blob, at + 12)? as usize;
            let Ok(offset) = usize::try_from(offset) else {
                continue;
            };
            if offset > store.len() {
                return Err(RpmDbError::Header(format!(
                    "tag {tag} offset {offset} outside data store"
                )));
            }
            entries.entry(tag).or_insert(Entry {
                kind,
                offset,
                count,
            });
        }
        Ok(Self { entries, store })
    }

    /// First string value of `tag`.
    pub fn string(&self, tag: i32) -> Result<Option<String>, RpmDbError> {
        let Some(entry) = self.entries.get(&tag) else {
            return Ok(None);
        };
        match entry.kind {
            TYPE_STRING | TYPE_I18NSTRING | TYPE_STRING_ARRAY => {
                Ok(self.strings_from(entry.offset, 1)?.into_iter().next())
            }
            other => Err(type_mismatch(tag, other)),
        }
    }

    /// All string values of `tag`.
    pub fn string_array(&self, tag: i32) -> Result<Vec<String>, RpmDbError> {
        let Some(entry) = self.entries.get(&tag) else {
            return Ok(Vec::new());
        };
        match entry.kind {
            TYPE_STRING_ARRAY | TYPE_I18NSTRING => self.strings_from(entry.offset, entry.count),
            TYPE_STRING => self.strings_from(entry.offset, 1),
            other => Err(type_mismatch(tag, other)),
        }
    }

    /// First integer value of `tag`.
    pub fn int32(&self, tag: i32) -> Result<Option<i32>, RpmDbError> {
        let Some(entry) = self.entries.get(&tag) else {
            return Ok(None);
        };
        if entry.kind != TYPE_INT32 {
            return Err(type_mismatch(tag, entry.kind));
        }
        if entry.count == 0 {
            return Ok(None);
        }
        Ok(Some(be_i32(self.store, entry.offset)?))
    }

    fn strings_from(&self, offset: usize, count: usize) -> Result<Vec<String>, RpmDbError> {
        let mut out = Vec::with_capacity(count.min(4096));
        let mut rest = self
            .store
            .get(offset..)
            .ok_or(RpmDbError::Truncated { what: "string" })?;
        for _ in 0..count {
            let end = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or(RpmDbError::Truncated { what: "string" })?;
            out.push(String::from_utf8_lossy(&rest[..end]).into_owned());
            rest = &rest[end + 1..];
        }
        Ok(out)
    }
}

fn type_mismatch(tag: i32, kind: u32) -> RpmDbError {
    RpmDbError::Header(format!("tag {tag} has unexpected type {kind}"))
}


#[cfg(test)]
mod tests {
    use super::testing::{Value, blob};
    use super::*;

    #[test]
    fn reads_strings_arrays_and_ints() {
        let data = blob(&[
            (TAG_NAME, Value::Str("bash")),
            (TAG_VERSION, Value::Str("5.1.8")),
            (TAG_FILEDIGESTS, Value::Strs(&["ab", "", "cd"])),
            (TAG_FILEDIGESTALGO, Value::Int(8)),
        ]);
        let h = Header::parse(&data).expect("parse");
        assert_eq!(h.string(TAG_NAME).expect("name").as_deref(), Some("bash"));
        assert_eq!(
            h.string_array(TAG_FILEDIGESTS).expect("digests"),
            vec!["ab", "", "cd"]
        );
        assert_eq!(h.int32(TAG_FILEDIGESTALGO).expect("algo"), Some(8));
        assert_eq!(h.string(TAG_LICENSE).expect("absent"), None);
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let data = blob(&[(TAG_NAME, Value::Int(3))]);
        let h = Header::parse(&data).expect("parse");
        assert!(h.string(TAG_NAME).is_err());
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let data = blob(&[(TAG_NAME, Value::Str("bash"))]);
        assert!(Header::parse(&data[..data.len() - 2]).is_err());
        assert!(Header::parse(&[0, 0]).is_err());
    }

    #[test]
    fn region_tags_are_skipped() {
        let data = blob(&[(63, Value::Int(0)), (TAG_NAME, Value::Str("zlib"))]);
        let h = Header::parse(&data).expect("parse");
        assert_eq!(h.string(TAG_NAME).expect("name").as_deref(), Some("zlib"));
    }
}
