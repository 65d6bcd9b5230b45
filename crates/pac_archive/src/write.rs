//! Types for writing PAC archives
//!

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use binrw::BinWrite;
use bon::Builder;
use byteorder::{BigEndian, WriteBytesExt};
use tracing::instrument;

use crate::compression::{deflate_copy, CompressionMethod};
use crate::error::Result;
use crate::types::{
    Index, Metadata, PacFile, PacHeader, INDEX_GUARD, MAGIC, METADATA_GUARD,
};

/// Options for how the PAC file should be written
#[derive(Debug, Clone, Copy, Builder)]
pub struct PacWriterOptions {
    /// Deflate raw blobs while streaming them out
    ///
    /// Sources that already carry a non-zero compression id are copied verbatim either
    /// way.
    #[builder(default)]
    pub compress: bool,
}

/// PAC archive writer
///
/// Serializes a [`PacFile`] in two passes: a placeholder header goes out first, blobs are
/// streamed while their final offsets and disk sizes are recorded, the index and metadata
/// sections follow, and the header is rewritten with the real offsets. The caller's
/// [`PacFile`] is never mutated; the writer works on its own copy of everything it
/// patches.
///
/// ```
/// # fn doit() -> pac_archive::error::Result<()>
/// # {
/// use pac_archive::{AssetSource, EntryBuilder, HeaderOptions, PacBuilder, PacWriter};
/// use pac_archive::write::PacWriterOptions;
/// use pac_archive::Tpuid;
///
/// let mut builder = PacBuilder::new();
/// builder.header(HeaderOptions::builder().build());
/// builder.add(
///     EntryBuilder::new()
///         .tpuid(Tpuid::new(1, 2, 3))
///         .source(AssetSource::from_bytes(b"Hello, World!".as_slice()))
///         .no_compression()
///         .computed_sha256()?,
/// )?;
/// let pac = builder.finish()?;
///
/// // We use a buffer here, though you'd normally use a `File`
/// let writer = PacWriter::new(
///     std::io::Cursor::new(Vec::new()),
///     PacWriterOptions::builder().build(),
/// );
/// let bytes = writer.write_new(&pac)?.into_inner();
/// # let _ = bytes;
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct PacWriter<W: Write + Seek> {
    inner: W,
    options: PacWriterOptions,
}

impl<W: Write + Seek> PacWriter<W> {
    pub fn new(inner: W, options: PacWriterOptions) -> PacWriter<W> {
        PacWriter { inner, options }
    }

    /// Serializes `pac` from the start of the output, returning the inner writer.
    ///
    /// The target is assumed to be empty or about to be truncated by the caller; use
    /// [`write_to_path`] to get truncate-and-clean-up-on-failure behavior for files.
    #[instrument(skip_all, err)]
    pub fn write_new(mut self, pac: &PacFile) -> Result<W> {
        // working copies so an in-progress write cannot disturb the caller's archive
        let mut header = pac.header;
        header.reserved_a = 0;
        header.reserved_b = 0;
        header.index_offset = 0;
        header.metadata_offset = 0;
        header.trash_offset = 0;
        let mut index = pac.index.clone();

        let wide = header.wide();

        // placeholder header; real offsets are unknown until the blobs are on disk
        self.inner.seek(SeekFrom::Start(0))?;
        self.write_header(&header)?;

        self.write_blobs(pac, &mut index)?;

        header.index_offset = self.write_index(&index, wide)?;
        header.metadata_offset = self.write_pac_metadata(&pac.metadata)?;
        // the trash section is reserved and never populated

        self.inner.seek(SeekFrom::Start(0))?;
        self.write_header(&header)?;
        self.inner.flush()?;

        Ok(self.inner)
    }

    fn write_header(&mut self, header: &PacHeader) -> Result<()> {
        self.inner.write_u32::<BigEndian>(MAGIC)?;
        header.write(&mut self.inner)?;
        Ok(())
    }

    #[instrument(skip_all, err)]
    fn write_blobs(&mut self, pac: &PacFile, index: &mut Index) -> Result<()> {
        for entry in index.entries_mut() {
            let source = pac.source(entry.tpuid)?;
            let mut blob = source.reader()?;

            entry.offset = self.inner.stream_position()?;
            let source_id = source.compression_id();
            if source_id == 0 && self.options.compress {
                deflate_copy(&mut blob, &mut self.inner)?;
                entry.compression_id = CompressionMethod::Deflate.id();
            } else {
                // already compressed at the source (or compression is off): copy
                // verbatim and carry the id over
                io::copy(&mut blob, &mut self.inner)?;
                entry.compression_id = source_id;
            }
            entry.disk_size = (self.inner.stream_position()? - entry.offset) as u32;
        }
        Ok(())
    }

    fn write_index(&mut self, index: &Index, wide: bool) -> Result<u64> {
        let start = self.inner.stream_position()?;
        self.inner.write_i32::<BigEndian>(index.len() as i32)?;
        for entry in index.entries() {
            entry.write_args(&mut self.inner, (wide,))?;
        }
        self.inner.write_u32::<BigEndian>(INDEX_GUARD)?;
        Ok(start)
    }

    fn write_pac_metadata(&mut self, metadata: &Metadata) -> Result<u64> {
        if metadata.is_empty() {
            return Ok(0);
        }

        let start = self.inner.stream_position()?;
        self.inner
            .write_i32::<BigEndian>(metadata.total_size() as i32)?;
        self.inner.write_i32::<BigEndian>(metadata.len() as i32)?;
        for (tpuid, block) in metadata.iter() {
            tpuid.write(&mut self.inner)?;
            self.inner.write_u16::<BigEndian>(block.len() as u16)?;
            self.inner.write_u16::<BigEndian>(block.byte_size())?;
            for (key, val) in block.entries() {
                self.inner.write_u8(key.len() as u8)?;
                self.inner.write_u8(val.len() as u8)?;
                self.inner.write_all(key.as_bytes())?;
                self.inner.write_all(val.as_bytes())?;
            }
        }
        self.inner.write_u32::<BigEndian>(METADATA_GUARD)?;
        Ok(start)
    }
}

/// Writes `pac` to a fresh file at `path`.
///
/// The target is created (or truncated) first. If any step fails the file is removed
/// again, so a failed write never leaves a half-written archive whose header claims
/// sections that were never stored.
#[instrument(skip(pac, options), fields(path = %path.as_ref().display()), err)]
pub fn write_to_path(
    path: impl AsRef<Path>,
    pac: &PacFile,
    options: PacWriterOptions,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let result = PacWriter::new(file, options)
        .write_new(pac)
        .and_then(|file| file.sync_all().map_err(Into::into));
    if let Err(err) = result {
        let _ = std::fs::remove_file(path);
        return Err(err);
    }
    Ok(())
}
