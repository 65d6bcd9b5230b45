//! Sources that supply a blob's stored bytes, wherever they live.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::compression::{self, CompressionMethod};
use crate::error::Result;

/// Where a blob's stored bytes come from
///
/// The builder and writer treat every variant the same way: a source yields the raw bytes
/// that end up on disk (possibly already compressed, see
/// [`compression_id`](AssetSource::compression_id)), either as an owned buffer, a shared
/// zero-copy view, or a bounded stream.
///
/// The file-backed variants open their own handle on every access, so two blobs can be
/// read concurrently from the same archive without one corrupting the other's seek
/// position. That is a contract of this type, not an implementation detail.
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// Bytes held in memory
    Memory {
        data: Arc<[u8]>,
        compression_id: u32,
    },

    /// A whole file, opened fresh from its path on demand
    FilePath { path: PathBuf, compression_id: u32 },

    /// A bounded region of an archive file, opened fresh on demand
    ArchiveRegion {
        path: PathBuf,
        offset: u64,
        len: u64,
        compression_id: u32,
    },
}

impl AssetSource {
    /// A raw (uncompressed) in-memory source.
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Self {
        Self::from_bytes_compressed(data, 0)
    }

    /// An in-memory source whose bytes already carry the given compression.
    pub fn from_bytes_compressed(data: impl Into<Arc<[u8]>>, compression_id: u32) -> Self {
        AssetSource::Memory {
            data: data.into(),
            compression_id,
        }
    }

    /// A raw source backed by a file on disk.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        AssetSource::FilePath {
            path: path.into(),
            compression_id: 0,
        }
    }

    /// A source backed by a `len` byte region of the archive at `path`.
    pub fn archive_region(
        path: impl Into<PathBuf>,
        offset: u64,
        len: u64,
        compression_id: u32,
    ) -> Self {
        AssetSource::ArchiveRegion {
            path: path.into(),
            offset,
            len,
            compression_id,
        }
    }

    /// The compression already applied to the bytes this source yields, 0 = none.
    ///
    /// The writer copies a non-zero source verbatim instead of re-compressing it.
    pub fn compression_id(&self) -> u32 {
        match self {
            AssetSource::Memory { compression_id, .. }
            | AssetSource::FilePath { compression_id, .. }
            | AssetSource::ArchiveRegion { compression_id, .. } => *compression_id,
        }
    }

    /// The stored byte length this source will yield.
    pub fn len(&self) -> Result<u64> {
        match self {
            AssetSource::Memory { data, .. } => Ok(data.len() as u64),
            AssetSource::FilePath { path, .. } => Ok(std::fs::metadata(path)?.len()),
            AssetSource::ArchiveRegion { len, .. } => Ok(*len),
        }
    }

    /// The full stored content as an owned buffer.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        match self {
            AssetSource::Memory { data, .. } => Ok(data.to_vec()),
            _ => {
                let mut out = Vec::new();
                self.reader()?.read_to_end(&mut out)?;
                Ok(out)
            }
        }
    }

    /// A read-only, position-independent view of the stored content.
    ///
    /// Zero-copy for in-memory sources; file-backed sources are read once into a fresh
    /// buffer.
    pub fn shared_bytes(&self) -> Result<Arc<[u8]>> {
        match self {
            AssetSource::Memory { data, .. } => Ok(Arc::clone(data)),
            _ => Ok(self.bytes()?.into()),
        }
    }

    /// The stored content decoded: inflated when this source carries a compressed blob.
    pub fn decoded_bytes(&self) -> Result<Vec<u8>> {
        let raw = self.bytes()?;
        match CompressionMethod::from_id(self.compression_id())? {
            CompressionMethod::None => Ok(raw),
            CompressionMethod::Deflate => Ok(compression::inflate_bytes(&raw)?),
        }
    }

    /// A bounded, single-pass reader over the stored content.
    ///
    /// Yields exactly [`len`](AssetSource::len) bytes and reports end-of-data there, even
    /// when the underlying file continues further. File-backed variants open a new handle
    /// per call; dropping the reader closes it.
    pub fn reader(&self) -> Result<AssetReader> {
        Ok(match self {
            AssetSource::Memory { data, .. } => AssetReader::Memory(Cursor::new(Arc::clone(data))),
            AssetSource::FilePath { path, .. } => {
                let file = File::open(path)?;
                let len = file.metadata()?.len();
                AssetReader::File(file.take(len))
            }
            AssetSource::ArchiveRegion {
                path, offset, len, ..
            } => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(*offset))?;
                AssetReader::File(file.take(*len))
            }
        })
    }
}

/// Bounded reader handed out by [`AssetSource::reader`]
///
/// Owns its underlying handle; dropping it releases the file.
pub enum AssetReader {
    Memory(Cursor<Arc<[u8]>>),
    File(io::Take<File>),
}

impl Read for AssetReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            AssetReader::Memory(r) => r.read(buf),
            AssetReader::File(r) => r.read(buf),
        }
    }

    fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        match self {
            AssetReader::Memory(r) => r.read_to_end(buf),
            AssetReader::File(r) => r.read_to_end(buf),
        }
    }
}

/// Convenience for callers resolving manifest paths relative to some root.
pub fn resolve_relative(root: &Path, candidate: &Path) -> PathBuf {
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    }
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::AssetSource;
    use crate::error::Result;

    #[test]
    fn memory_source_is_zero_copy() -> Result<()> {
        let source = AssetSource::from_bytes(b"hello".as_slice());
        let first = source.shared_bytes()?;
        let second = source.shared_bytes()?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.bytes()?, b"hello");
        assert_eq!(source.len()?, 5);
        assert_eq!(source.compression_id(), 0);
        Ok(())
    }

    #[test]
    fn file_source_reads_whole_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"on disk payload")?;
        file.flush()?;

        let source = AssetSource::from_path(file.path());
        assert_eq!(source.bytes()?, b"on disk payload");
        assert_eq!(source.len()?, 15);
        Ok(())
    }

    #[test]
    fn region_source_is_bounded_and_independent() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"prefix-PAYLOAD-suffix")?;
        file.flush()?;

        let source = AssetSource::archive_region(file.path(), 7, 7, 0);

        // two concurrent readers each own an independently positioned handle
        let mut first = source.reader()?;
        let mut second = source.reader()?;

        let mut buf = [0u8; 3];
        first.read_exact(&mut buf)?;
        assert_eq!(&buf, b"PAY");

        let mut all = Vec::new();
        second.read_to_end(&mut all)?;
        assert_eq!(all, b"PAYLOAD");

        let mut rest = Vec::new();
        first.read_to_end(&mut rest)?;
        assert_eq!(rest, b"LOAD");
        Ok(())
    }

    #[test]
    fn decoded_bytes_inflates_compressed_sources() -> Result<()> {
        let payload = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890".repeat(4);
        let mut compressed = Vec::new();
        crate::compression::deflate_copy(&mut payload.as_slice(), &mut compressed)?;

        let source = AssetSource::from_bytes_compressed(compressed.clone(), 1);
        assert_eq!(source.bytes()?, compressed);
        assert_eq!(source.decoded_bytes()?, payload);
        Ok(())
    }
}
