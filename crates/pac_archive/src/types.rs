//! Base types for the structure of a PAC file.

use binrw::{BinRead, BinResult, BinWrite};
use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use crate::error::{LookupError, Result};
use crate::source::AssetSource;
use crate::tpuid::Tpuid;

/// The 4-byte magic constant at the start of every PAC file ("PPAC")
pub const MAGIC: u32 = 0x5050_4143;

/// Header flag selecting 64-bit section and entry offsets
pub const FLAG_USE_LONG_OFFSETS: u32 = 1;

/// Guard constant terminating the index section ("INDX")
pub const INDEX_GUARD: u32 = 0x494E_4458;

/// Guard constant terminating the metadata section ("META")
pub const METADATA_GUARD: u32 = 0x4D45_5441;

/// Byte length of the per-entry content hash
pub const SHA256_LEN: usize = 32;

#[binrw::parser(reader, endian)]
fn parse_offset(wide: bool) -> BinResult<u64> {
    if wide {
        u64::read_options(reader, endian, ())
    } else {
        u32::read_options(reader, endian, ()).map(u64::from)
    }
}

#[binrw::writer(writer, endian)]
fn write_offset(value: &u64, wide: bool) -> BinResult<()> {
    if wide {
        value.write_options(writer, endian, ())
    } else {
        (*value as u32).write_options(writer, endian, ())
    }
}

/// PAC file header
///
/// The fixed block following the magic constant. All data is stored in big endian format;
/// the three section offsets are 32 or 64 bits wide depending on
/// [`FLAG_USE_LONG_OFFSETS`]. An offset of 0 marks the section as absent, any other value
/// points strictly past the header.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct PacHeader {
    /// Major format version, fixed at 4
    pub major_version: u16,

    /// Minor format version, fixed at 0
    pub minor_version: u16,

    /// Reserved, zero on write and preserved on read
    pub reserved_a: u64,

    /// Reserved, zero on write and preserved on read
    pub reserved_b: u64,

    /// Flags bitmask, bit 0 selects wide offsets
    pub flags: u32,

    /// Offset from the start of the file to the index section
    #[br(parse_with = parse_offset, args(flags & FLAG_USE_LONG_OFFSETS != 0))]
    #[bw(write_with = write_offset, args(*flags & FLAG_USE_LONG_OFFSETS != 0))]
    pub index_offset: u64,

    /// Offset to the metadata section, 0 when absent
    #[br(parse_with = parse_offset, args(flags & FLAG_USE_LONG_OFFSETS != 0))]
    #[bw(write_with = write_offset, args(*flags & FLAG_USE_LONG_OFFSETS != 0))]
    pub metadata_offset: u64,

    /// Offset to the trash section, 0 when absent
    #[br(parse_with = parse_offset, args(flags & FLAG_USE_LONG_OFFSETS != 0))]
    #[bw(write_with = write_offset, args(*flags & FLAG_USE_LONG_OFFSETS != 0))]
    pub trash_offset: u64,
}

impl PacHeader {
    /// The current format version
    pub const MAJOR_VERSION: u16 = 4;
    pub const MINOR_VERSION: u16 = 0;

    /// Serialized header length including the magic constant.
    pub const fn size_of(wide: bool) -> u64 {
        if wide {
            52
        } else {
            40
        }
    }

    pub const fn flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub const fn wide(&self) -> bool {
        self.flag(FLAG_USE_LONG_OFFSETS)
    }
}

impl Default for PacHeader {
    fn default() -> Self {
        Self {
            major_version: Self::MAJOR_VERSION,
            minor_version: Self::MINOR_VERSION,
            reserved_a: 0,
            reserved_b: 0,
            flags: 0,
            index_offset: 0,
            metadata_offset: 0,
            trash_offset: 0,
        }
    }
}

/// PAC index entry
///
/// Describes one blob stored in the archive. The compression id occupies the top byte of
/// its on-disk u32; the hash is the SHA-256 of the blob's uncompressed content.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(big, import(wide: bool))]
pub struct IndexEntry {
    /// The identifier addressing this blob
    pub tpuid: Tpuid,

    /// Offset to the blob data from the start of the file
    #[br(parse_with = parse_offset, args(wide))]
    #[bw(write_with = write_offset, args(wide))]
    pub offset: u64,

    /// Byte length actually stored on disk, after compression if compressed
    pub disk_size: u32,

    /// Byte length of the original, decompressed content
    pub memory_size: u32,

    /// Compression scheme applied to the stored bytes, 0 = none
    #[br(map = |raw: u32| raw >> 24)]
    #[bw(map = |id: &u32| (id & 0xFF) << 24)]
    pub compression_id: u32,

    /// SHA-256 of the uncompressed content, all zero when ignored
    pub sha256: [u8; SHA256_LEN],
}

/// Computes the SHA-256 digest stored in an [`IndexEntry`].
pub fn compute_sha256(input: &[u8]) -> [u8; SHA256_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// The archive index: an ordered map from identifier to [`IndexEntry`]
///
/// Keys are unique and insertion order is preserved, so serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    entries: IndexMap<Tpuid, IndexEntry>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts an entry keyed by its own identifier, replacing any previous entry.
    pub fn insert(&mut self, entry: IndexEntry) -> Option<IndexEntry> {
        self.entries.insert(entry.tpuid, entry)
    }

    pub fn get(&self, tpuid: Tpuid) -> Option<&IndexEntry> {
        self.entries.get(&tpuid)
    }

    pub fn contains(&self, tpuid: Tpuid) -> bool {
        self.entries.contains_key(&tpuid)
    }

    pub fn tpuids(&self) -> impl Iterator<Item = Tpuid> + '_ {
        self.entries.keys().copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut IndexEntry> {
        self.entries.values_mut()
    }
}

/// Longest prefix of `s` no larger than `max` bytes that ends on a code-point boundary.
pub(crate) fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Maximum encoded length of a metadata key or value
pub const METADATA_STRING_MAX: usize = 255;

/// String annotations attached to one blob
///
/// An ordered map of UTF-8 key/value pairs. Both sides are capped at
/// [`METADATA_STRING_MAX`] encoded bytes; anything longer is truncated at a code-point
/// boundary on insertion. The serialized entry count and block byte size are derived from
/// the entries, never set directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataBlock {
    entries: IndexMap<String, String>,
}

impl MetadataBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or replaces an entry, truncating both strings to the format cap.
    pub fn insert(&mut self, key: &str, val: &str) {
        let key = truncate_utf8(key, METADATA_STRING_MAX);
        let val = truncate_utf8(val, METADATA_STRING_MAX);
        self.entries.insert(key.to_owned(), val.to_owned());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialized payload length of this block's entries.
    pub(crate) fn byte_size(&self) -> u16 {
        self.entries
            .iter()
            .map(|(k, v)| 2 + k.len() as u16 + v.len() as u16)
            .sum()
    }
}

/// Per-blob metadata for the whole archive, keyed by identifier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    blocks: IndexMap<Tpuid, MetadataBlock>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, tpuid: Tpuid) -> Option<&MetadataBlock> {
        self.blocks.get(&tpuid)
    }

    /// The block for `tpuid`, created empty when missing.
    pub fn block_mut(&mut self, tpuid: Tpuid) -> &mut MetadataBlock {
        self.blocks.entry(tpuid).or_default()
    }

    pub fn insert_block(&mut self, tpuid: Tpuid, block: MetadataBlock) {
        self.blocks.insert(tpuid, block);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tpuid, &MetadataBlock)> {
        self.blocks.iter().map(|(t, b)| (*t, b))
    }

    /// Serialized length of all blocks, headers included.
    pub(crate) fn total_size(&self) -> u32 {
        self.blocks
            .values()
            .map(|b| 12 + u32::from(b.byte_size()))
            .sum()
    }
}

/// One reclaimed-space record in the trash section
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[brw(big, import(wide: bool))]
pub struct TrashEntry {
    /// Offset of the reclaimed region from the start of the file
    #[br(parse_with = parse_offset, args(wide))]
    #[bw(write_with = write_offset, args(wide))]
    pub offset: u64,

    /// Byte length of the reclaimed region
    pub size: u32,
}

/// The reclaimed-space index, ordered by unsigned offset
///
/// Parsed when present in a file; the writer leaves the section absent. Reserved for a
/// future incremental-write feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrashIndex {
    entries: Vec<TrashEntry>,
}

impl TrashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a record, keeping the set ordered by offset and free of duplicates.
    pub fn insert(&mut self, entry: TrashEntry) {
        match self
            .entries
            .binary_search_by(|e| e.offset.cmp(&entry.offset))
        {
            Ok(pos) => {
                if self.entries[pos] != entry {
                    self.entries.insert(pos, entry);
                }
            }
            Err(pos) => self.entries.insert(pos, entry),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &TrashEntry> {
        self.entries.iter()
    }
}

/// The in-memory representation of a whole PAC archive
///
/// Both construction paths converge here: [`crate::builder::PacBuilder`] assembles one
/// from caller-supplied sources, [`crate::read::PacArchive::pac_file`] reconstructs one
/// from a parsed file with file-backed sources. The writer consumes either without caring
/// about provenance, cloning the parts it mutates so the caller's copy stays intact.
#[derive(Debug, Clone, Default)]
pub struct PacFile {
    pub header: PacHeader,
    pub index: Index,
    pub metadata: Metadata,
    pub trash: TrashIndex,
    pub(crate) sources: IndexMap<Tpuid, AssetSource>,
}

impl PacFile {
    /// The source supplying the stored bytes for `tpuid`.
    pub fn source(&self, tpuid: Tpuid) -> Result<&AssetSource> {
        self.sources
            .get(&tpuid)
            .ok_or_else(|| LookupError::Source(tpuid).into())
    }

    /// Attaches (or replaces) the byte source for an entry.
    pub fn attach_source(&mut self, tpuid: Tpuid, source: AssetSource) {
        self.sources.insert(tpuid, source);
    }

    pub fn sources(&self) -> impl Iterator<Item = (Tpuid, &AssetSource)> {
        self.sources.iter().map(|(t, s)| (*t, s))
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::{BinRead, BinWrite};
    use pretty_assertions::assert_eq;

    use super::{truncate_utf8, IndexEntry, PacHeader, FLAG_USE_LONG_OFFSETS};
    use crate::error::Result;
    use crate::tpuid::Tpuid;

    #[test]
    fn read_narrow_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x00, 0x04, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x28,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ]);

        let expected = PacHeader {
            index_offset: 40,
            ..Default::default()
        };

        assert_eq!(PacHeader::read(&mut input)?, expected);

        Ok(())
    }

    #[test]
    fn read_wide_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x00, 0x04, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x34,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]);

        let expected = PacHeader {
            flags: FLAG_USE_LONG_OFFSETS,
            index_offset: 0x1_0000_0034,
            ..Default::default()
        };

        assert_eq!(PacHeader::read(&mut input)?, expected);

        Ok(())
    }

    #[test]
    fn write_narrow_header() -> Result<()> {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x00, 0x04, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x28,
            0x00, 0x00, 0x00, 0x2C,
            0x00, 0x00, 0x00, 0x00,
        ];

        let header = PacHeader {
            index_offset: 40,
            metadata_offset: 44,
            ..Default::default()
        };

        let mut actual = Vec::new();
        header.write(&mut Cursor::new(&mut actual))?;

        assert_eq!(actual, expected);

        Ok(())
    }

    #[test]
    fn write_wide_header() -> Result<()> {
        let header = PacHeader {
            flags: FLAG_USE_LONG_OFFSETS,
            index_offset: 0x1_0000_0034,
            ..Default::default()
        };

        let mut actual = Vec::new();
        header.write(&mut Cursor::new(&mut actual))?;

        // wide mode widens each offset to 8 bytes and keeps the high half
        assert_eq!(actual.len() as u64, PacHeader::size_of(true) - 4);
        assert_eq!(&actual[24..32], &[0, 0, 0, 1, 0, 0, 0, 0x34]);

        Ok(())
    }

    #[test]
    fn index_entry_round_trips_both_widths() -> Result<()> {
        let entry = IndexEntry {
            tpuid: Tpuid::new(0xAABB, 0xCCDD, 0xDEAD_BEEF),
            offset: 0x1_0000_0028,
            disk_size: 11,
            memory_size: 36,
            compression_id: 1,
            sha256: [0xAB; 32],
        };

        let mut wide = Vec::new();
        entry.write_args(&mut Cursor::new(&mut wide), (true,))?;
        assert_eq!(wide.len(), 60);
        assert_eq!(IndexEntry::read_args(&mut Cursor::new(&wide), (true,))?, entry);

        let mut narrow = Vec::new();
        entry.write_args(&mut Cursor::new(&mut narrow), (false,))?;
        assert_eq!(narrow.len(), 56);
        let reread = IndexEntry::read_args(&mut Cursor::new(&narrow), (false,))?;
        // narrow mode truncates offsets above 2^32, a documented boundary
        assert_eq!(reread.offset, 0x28);

        Ok(())
    }

    #[test]
    fn index_entry_compression_id_lives_in_top_byte() -> Result<()> {
        let entry = IndexEntry {
            tpuid: Tpuid::new(1, 2, 3),
            offset: 40,
            disk_size: 5,
            memory_size: 5,
            compression_id: 1,
            sha256: [0; 32],
        };

        let mut bytes = Vec::new();
        entry.write_args(&mut Cursor::new(&mut bytes), (false,))?;
        assert_eq!(&bytes[20..24], &[0x01, 0x00, 0x00, 0x00]);

        Ok(())
    }

    #[test]
    fn truncation_respects_code_point_boundaries() {
        assert_eq!(truncate_utf8("hello", 255), "hello");
        assert_eq!(truncate_utf8("hello", 4), "hell");
        // 'é' is two bytes; a cut through it backs up to the previous boundary
        assert_eq!(truncate_utf8("hé", 2), "h");
        assert_eq!(truncate_utf8("hé", 3), "hé");
        assert_eq!(truncate_utf8("▲▲", 4), "▲");
    }
}
