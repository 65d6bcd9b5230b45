//! Types for reading PAC archives
//!

use std::fmt::{self, Debug};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use binrw::BinRead;
use byteorder::{BigEndian, ReadBytesExt};
use tracing::instrument;

use crate::compression::{CompressionMethod, PacBlockReader};
use crate::error::{FormatError, LookupError, Result};
use crate::source::AssetSource;
use crate::tpuid::Tpuid;
use crate::types::{
    Index, IndexEntry, Metadata, MetadataBlock, PacFile, PacHeader, TrashEntry, TrashIndex,
    INDEX_GUARD, MAGIC, METADATA_GUARD,
};

/// A handle for reading one blob out of a PAC file
///
/// Implements [`Read`] over the blob's *decoded* content: reads are bounded by the
/// entry's recorded disk size and inflated on the fly when the blob is stored compressed.
pub struct PacBlob<'a, R: Read + Seek> {
    entry: IndexEntry,
    reader: PacBlockReader<'a, R>,
}

impl<R: Read + Seek> Debug for PacBlob<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PacBlob({:#?})", self.entry)
    }
}

impl<R: Read + Seek> PacBlob<'_, R> {
    pub fn tpuid(&self) -> Tpuid {
        self.entry.tpuid
    }

    /// Offset of the stored bytes from the start of the file.
    pub fn offset(&self) -> u64 {
        self.entry.offset
    }

    /// Size of the blob, in bytes, as stored in the archive.
    pub fn disk_size(&self) -> u32 {
        self.entry.disk_size
    }

    /// Size of the blob, in bytes, once decompressed.
    pub fn memory_size(&self) -> u32 {
        self.entry.memory_size
    }

    pub fn compression_id(&self) -> u32 {
        self.entry.compression_id
    }

    /// SHA-256 of the uncompressed content recorded at write time, all zero when the
    /// producer chose not to hash.
    pub fn sha256(&self) -> &[u8; 32] {
        &self.entry.sha256
    }
}

impl<R: Read + Seek> Read for PacBlob<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    header: PacHeader,
    index: Index,
    metadata: Metadata,
    trash: TrashIndex,
}

/// PAC archive reader
///
/// Parses the header, index, metadata and trash sections up front, strictly sequentially,
/// failing hard on any structural problem. Blob bytes stay on disk until asked for.
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_pac_contents(reader: impl Read + Seek) -> pac_archive::error::Result<()> {
///     let mut pac = pac_archive::PacArchive::new(reader)?;
///
///     for tpuid in pac.tpuids().collect::<Vec<_>>() {
///         let mut blob = pac.by_tpuid(tpuid)?;
///         println!("{tpuid}: {} bytes", blob.memory_size());
///         std::io::copy(&mut blob, &mut std::io::stdout())?;
///     }
///
///     Ok(())
/// }
/// ```
pub struct PacArchive<R> {
    reader: R,
    path: Option<PathBuf>,
    shared: Arc<Shared>,
}

impl PacArchive<File> {
    /// Opens and parses the archive at `path`.
    ///
    /// Remembering the path lets [`PacArchive::source`] hand out file-backed sources that
    /// open their own handles, so prefer this over [`PacArchive::new`] when a path is
    /// available.
    #[instrument(skip(path), fields(path = %path.as_ref().display()), err)]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut archive = Self::new(file)?;
        archive.path = Some(path.to_path_buf());
        Ok(archive)
    }
}

impl<R: Read + Seek> PacArchive<R> {
    /// Read a PAC archive, collecting the entries it contains.
    pub fn new(mut reader: R) -> Result<PacArchive<R>> {
        let shared = Self::get_metadata(&mut reader)?;
        Ok(PacArchive {
            reader,
            path: None,
            shared: shared.into(),
        })
    }

    /// Number of blobs contained in this archive.
    pub fn len(&self) -> usize {
        self.shared.index.len()
    }

    /// Whether this archive contains no blobs
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn header(&self) -> &PacHeader {
        &self.shared.header
    }

    pub fn index(&self) -> &Index {
        &self.shared.index
    }

    pub fn metadata(&self) -> &Metadata {
        &self.shared.metadata
    }

    pub fn trash(&self) -> &TrashIndex {
        &self.shared.trash
    }

    pub fn contains(&self, tpuid: Tpuid) -> bool {
        self.shared.index.contains(tpuid)
    }

    /// Returns an iterator over the identifiers in this archive, in index order.
    pub fn tpuids(&self) -> impl Iterator<Item = Tpuid> + '_ {
        self.shared.index.tpuids()
    }

    /// The index entry for `tpuid`, if present.
    pub fn entry(&self, tpuid: Tpuid) -> Option<&IndexEntry> {
        self.shared.index.get(tpuid)
    }

    /// The metadata block for `tpuid`, if one was stored.
    pub fn metadata_block(&self, tpuid: Tpuid) -> Option<&MetadataBlock> {
        self.shared.metadata.block(tpuid)
    }

    /// Get a contained blob by identifier, decoded.
    pub fn by_tpuid(&mut self, tpuid: Tpuid) -> Result<PacBlob<'_, R>> {
        let entry = self
            .shared
            .index
            .get(tpuid)
            .ok_or(LookupError::Entry(tpuid))?
            .clone();
        let compression = CompressionMethod::from_id(entry.compression_id)?;
        let reader = PacBlockReader::new(
            &mut self.reader,
            entry.offset,
            entry.disk_size as u64,
            compression,
        )?;
        Ok(PacBlob { entry, reader })
    }

    /// An [`AssetSource`] yielding the blob's raw stored bytes.
    ///
    /// File-backed when the archive was opened from a path; otherwise the stored bytes
    /// are copied out of the reader into memory.
    pub fn source(&mut self, tpuid: Tpuid) -> Result<AssetSource> {
        let entry = self
            .shared
            .index
            .get(tpuid)
            .ok_or(LookupError::Entry(tpuid))?
            .clone();
        match &self.path {
            Some(path) => Ok(AssetSource::archive_region(
                path.clone(),
                entry.offset,
                entry.disk_size as u64,
                entry.compression_id,
            )),
            None => {
                self.reader.seek(SeekFrom::Start(entry.offset))?;
                let mut data = vec![0u8; entry.disk_size as usize];
                self.reader.read_exact(&mut data)?;
                Ok(AssetSource::from_bytes_compressed(
                    data,
                    entry.compression_id,
                ))
            }
        }
    }

    /// Reconstructs the full in-memory container, sources attached.
    ///
    /// The result is the same [`PacFile`] a builder produces, so a parsed archive can be
    /// amended and handed back to a writer.
    pub fn pac_file(&mut self) -> Result<PacFile> {
        let mut pac = PacFile {
            header: self.shared.header,
            index: self.shared.index.clone(),
            metadata: self.shared.metadata.clone(),
            trash: self.shared.trash.clone(),
            ..Default::default()
        };
        for tpuid in self.shared.index.tpuids().collect::<Vec<_>>() {
            let source = self.source(tpuid)?;
            pac.attach_source(tpuid, source);
        }
        Ok(pac)
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn get_header(reader: &mut R) -> Result<PacHeader> {
        let found = reader.read_u32::<BigEndian>()?;
        if found != MAGIC {
            return Err(FormatError::BadMagic {
                expected: MAGIC,
                found,
            }
            .into());
        }

        let header = PacHeader::read(reader)?;
        if header.major_version != PacHeader::MAJOR_VERSION
            || header.minor_version != PacHeader::MINOR_VERSION
        {
            return Err(FormatError::UnsupportedVersion {
                major: header.major_version,
                minor: header.minor_version,
            }
            .into());
        }

        let header_len = PacHeader::size_of(header.wide());
        if header.index_offset == 0 {
            return Err(FormatError::MissingIndex.into());
        }
        for (section, offset) in [
            ("index", header.index_offset),
            ("metadata", header.metadata_offset),
            ("trash", header.trash_offset),
        ] {
            if offset != 0 && offset < header_len {
                return Err(FormatError::BadSectionOffset {
                    section,
                    offset,
                    header_len,
                }
                .into());
            }
        }

        Ok(header)
    }

    fn get_index(reader: &mut R, header: &PacHeader) -> Result<Index> {
        reader.seek(SeekFrom::Start(header.index_offset))?;

        let count = reader.read_i32::<BigEndian>()?;
        if count < 0 {
            return Err(FormatError::NegativeCount {
                section: "index",
                found: count,
            }
            .into());
        }

        let wide = header.wide();
        let mut index = Index::new();
        for _ in 0..count {
            index.insert(IndexEntry::read_args(reader, (wide,))?);
        }

        let guard = reader.read_u32::<BigEndian>()?;
        if guard != INDEX_GUARD {
            return Err(FormatError::BadGuard {
                section: "index",
                expected: INDEX_GUARD,
                found: guard,
            }
            .into());
        }

        Ok(index)
    }

    fn get_pac_metadata(reader: &mut R, header: &PacHeader) -> Result<Metadata> {
        let mut metadata = Metadata::new();
        if header.metadata_offset == 0 {
            return Ok(metadata);
        }

        reader.seek(SeekFrom::Start(header.metadata_offset))?;

        let total_size = reader.read_i32::<BigEndian>()?;
        let block_count = reader.read_i32::<BigEndian>()?;
        for found in [total_size, block_count] {
            if found < 0 {
                return Err(FormatError::NegativeCount {
                    section: "metadata",
                    found,
                }
                .into());
            }
        }

        for _ in 0..block_count {
            let tpuid = Tpuid::read(reader)?;
            let entry_count = reader.read_u16::<BigEndian>()?;
            let _block_size = reader.read_u16::<BigEndian>()?;

            let mut block = MetadataBlock::new();
            for _ in 0..entry_count {
                let key_len = reader.read_u8()? as usize;
                let val_len = reader.read_u8()? as usize;
                let mut key = vec![0u8; key_len];
                let mut val = vec![0u8; val_len];
                reader.read_exact(&mut key)?;
                reader.read_exact(&mut val)?;
                block.insert(
                    &String::from_utf8_lossy(&key),
                    &String::from_utf8_lossy(&val),
                );
            }
            metadata.insert_block(tpuid, block);
        }

        let guard = reader.read_u32::<BigEndian>()?;
        if guard != METADATA_GUARD {
            return Err(FormatError::BadGuard {
                section: "metadata",
                expected: METADATA_GUARD,
                found: guard,
            }
            .into());
        }

        Ok(metadata)
    }

    fn get_trash(reader: &mut R, header: &PacHeader) -> Result<TrashIndex> {
        let mut trash = TrashIndex::new();
        if header.trash_offset == 0 {
            return Ok(trash);
        }

        reader.seek(SeekFrom::Start(header.trash_offset))?;

        let count = reader.read_i32::<BigEndian>()?;
        if count < 0 {
            return Err(FormatError::NegativeCount {
                section: "trash",
                found: count,
            }
            .into());
        }

        let wide = header.wide();
        for _ in 0..count {
            trash.insert(TrashEntry::read_args(reader, (wide,))?);
        }

        Ok(trash)
    }

    #[instrument(skip_all, err)]
    fn get_metadata(reader: &mut R) -> Result<Shared> {
        let header = Self::get_header(reader)?;
        let index = Self::get_index(reader, &header)?;
        let metadata = Self::get_pac_metadata(reader, &header)?;
        let trash = Self::get_trash(reader, &header)?;

        Ok(Shared {
            header,
            index,
            metadata,
            trash,
        })
    }
}
