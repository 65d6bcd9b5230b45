//! Blob compression and decompression handling.

use std::io::{self, Read, Seek, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::instrument;

use crate::error::{Error, Result};

/// Identifies the storage format of a blob inside the PAC file
///
/// The id occupies the top byte of the index entry's compression field. A blob whose
/// source already reports a non-zero id is written verbatim; the writer only ever applies
/// [`CompressionMethod::Deflate`] to raw sources, and only when configured to via
/// [`crate::write::PacWriterOptions`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Stores the data as it is
    #[default]
    None,

    /// Compress the data as one contiguous zlib-framed deflate stream
    Deflate,
}

impl CompressionMethod {
    /// Resolves a compression id from an index entry or asset source.
    ///
    /// Unknown ids are a hard error; the format has no notion of a skippable codec.
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(CompressionMethod::None),
            1 => Ok(CompressionMethod::Deflate),
            other => Err(Error::UnsupportedCompression(other)),
        }
    }

    /// The id stored on disk for this method.
    pub const fn id(self) -> u32 {
        match self {
            CompressionMethod::None => 0,
            CompressionMethod::Deflate => 1,
        }
    }
}

/// Bounded reader over one blob's stored bytes, decoding as it goes
///
/// Seeks to the blob, limits reads to its disk size, and inflates when the blob is
/// stored compressed. The limit keeps a decoder from running past the entry's recorded
/// size even though the underlying file continues.
pub(crate) enum PacBlockReader<'a, R: Read + Seek> {
    Raw(io::Take<&'a mut R>),
    Deflate(Box<ZlibDecoder<io::Take<&'a mut R>>>),
}

impl<'a, R: Read + Seek> PacBlockReader<'a, R> {
    #[instrument(skip(reader))]
    pub fn new(
        reader: &'a mut R,
        start: u64,
        limit: u64,
        compression: CompressionMethod,
    ) -> Result<Self> {
        reader.seek(io::SeekFrom::Start(start))?;

        let limit_reader = reader.by_ref().take(limit);
        Ok(match compression {
            CompressionMethod::None => PacBlockReader::Raw(limit_reader),
            CompressionMethod::Deflate => {
                PacBlockReader::Deflate(Box::new(ZlibDecoder::new(limit_reader)))
            }
        })
    }
}

impl<R: Read + Seek> Read for PacBlockReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PacBlockReader::Raw(r) => r.read(buf),
            PacBlockReader::Deflate(r) => r.read(buf),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        match self {
            PacBlockReader::Raw(r) => r.read_exact(buf),
            PacBlockReader::Deflate(r) => r.read_exact(buf),
        }
    }

    fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        match self {
            PacBlockReader::Raw(r) => r.read_to_end(buf),
            PacBlockReader::Deflate(r) => r.read_to_end(buf),
        }
    }
}

/// Deflates everything from `src` into `dst` as one contiguous zlib stream.
pub(crate) fn deflate_copy<R: Read + ?Sized, W: Write>(src: &mut R, dst: W) -> io::Result<()> {
    let mut encoder = ZlibEncoder::new(dst, Compression::best());
    io::copy(src, &mut encoder)?;
    encoder.try_finish()
}

/// Inflates one contiguous zlib stream into an owned buffer.
pub(crate) fn inflate_bytes(input: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(input).read_to_end(&mut out)?;
    Ok(out)
}
