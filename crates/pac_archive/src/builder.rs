//! Staged construction of a [`PacFile`] ready for writing.

use bon::Builder;
use indexmap::IndexMap;

use crate::error::{BuilderStateError, Result};
use crate::source::AssetSource;
use crate::tpuid::Tpuid;
use crate::types::{
    compute_sha256, Index, IndexEntry, Metadata, MetadataBlock, PacFile, PacHeader, TrashIndex,
    FLAG_USE_LONG_OFFSETS, SHA256_LEN,
};

/// Options for the archive header
///
/// The version defaults to the current 4.0; wide offsets are off unless asked for.
#[derive(Debug, Clone, Copy, Builder)]
pub struct HeaderOptions {
    /// Major format version to stamp into the header
    #[builder(default = PacHeader::MAJOR_VERSION)]
    pub major_version: u16,

    /// Minor format version to stamp into the header
    #[builder(default = PacHeader::MINOR_VERSION)]
    pub minor_version: u16,

    /// Store section and entry offsets as 64-bit values
    #[builder(default)]
    pub wide_offsets: bool,
}

/// One staged archive entry
///
/// Collects the identifier, byte source, declared sizes and hash decision for a single
/// blob. Committing via [`PacBuilder::add`] validates that everything required is present,
/// so format mistakes surface at build time instead of write time.
///
/// ```
/// use pac_archive::{AssetSource, EntryBuilder, Tpuid};
///
/// let entry = EntryBuilder::new()
///     .tpuid(Tpuid::new(0xAABB, 0xCCDD, 0xDEAD_BEEF))
///     .source(AssetSource::from_bytes(b"payload".as_slice()))
///     .no_compression()
///     .computed_sha256()?;
/// # let _ = entry;
/// # Ok::<(), pac_archive::error::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct EntryBuilder {
    tpuid: Option<Tpuid>,
    source: Option<AssetSource>,
    memory_size: Option<u32>,
    compression_id: Option<u32>,
    sha256: Option<[u8; SHA256_LEN]>,
}

impl EntryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tpuid(mut self, tpuid: Tpuid) -> Self {
        self.tpuid = Some(tpuid);
        self
    }

    pub fn source(mut self, source: AssetSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Declares the blob's decompressed size.
    ///
    /// Defaults to the source's stored length, which is only right for raw sources.
    pub fn memory_size(mut self, memory_size: u32) -> Self {
        self.memory_size = Some(memory_size);
        self
    }

    /// Declares the compression already applied to the source's bytes.
    pub fn compression(mut self, compression_id: u32) -> Self {
        self.compression_id = Some(compression_id);
        self
    }

    pub fn no_compression(self) -> Self {
        self.compression(0)
    }

    /// Hashes the source's full stored bytes now and records the digest.
    pub fn computed_sha256(mut self) -> Result<Self> {
        let source = self
            .source
            .as_ref()
            .ok_or(BuilderStateError::MissingSource)?;
        self.sha256 = Some(compute_sha256(&source.bytes()?));
        Ok(self)
    }

    /// Records the all-zero placeholder instead of a real digest.
    pub fn ignored_sha256(mut self) -> Self {
        self.sha256 = Some([0; SHA256_LEN]);
        self
    }

    fn build(self) -> Result<(IndexEntry, AssetSource)> {
        let tpuid = self.tpuid.ok_or(BuilderStateError::MissingTpuid)?;
        let source = self.source.ok_or(BuilderStateError::MissingSource)?;
        let sha256 = self.sha256.ok_or(BuilderStateError::MissingHashDecision)?;

        let memory_size = match self.memory_size {
            Some(size) => size,
            None => source.len()? as u32,
        };
        let compression_id = self
            .compression_id
            .unwrap_or_else(|| source.compression_id());

        // offset and disk size are the writer's to fill in
        let entry = IndexEntry {
            tpuid,
            offset: 0,
            disk_size: 0,
            memory_size,
            compression_id,
            sha256,
        };
        Ok((entry, source))
    }
}

/// Edits one blob's metadata block in place
///
/// Obtained from [`PacBuilder::edit_metadata`]; insertions are additive by key and
/// strings are truncated to the format's 255-byte cap on the way in.
pub struct MetadataBlockEditor<'a> {
    block: &'a mut MetadataBlock,
}

impl MetadataBlockEditor<'_> {
    pub fn entry(self, key: &str, val: &str) -> Self {
        self.block.insert(key, val);
        self
    }
}

/// Staged PAC archive builder
///
/// Accumulates header settings, committed entries and metadata blocks, then produces the
/// [`PacFile`] a [`crate::write::PacWriter`] consumes. [`finish`](PacBuilder::finish)
/// refuses to run before the header stage has completed.
///
/// ```
/// use pac_archive::{AssetSource, EntryBuilder, HeaderOptions, PacBuilder, Tpuid};
///
/// let mut builder = PacBuilder::new();
/// builder.header(HeaderOptions::builder().wide_offsets(true).build());
/// builder.add(
///     EntryBuilder::new()
///         .tpuid(Tpuid::new(1, 2, 3))
///         .source(AssetSource::from_bytes(b"payload".as_slice()))
///         .memory_size(7)
///         .no_compression()
///         .computed_sha256()?,
/// )?;
/// builder.edit_metadata(Tpuid::new(1, 2, 3)).entry("filename", "payload.bin");
/// let pac = builder.finish()?;
/// # let _ = pac;
/// # Ok::<(), pac_archive::error::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct PacBuilder {
    header: Option<PacHeader>,
    index: Index,
    metadata: Metadata,
    sources: IndexMap<Tpuid, AssetSource>,
}

impl PacBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completes the header stage.
    pub fn header(&mut self, options: HeaderOptions) -> &mut Self {
        self.header = Some(PacHeader {
            major_version: options.major_version,
            minor_version: options.minor_version,
            flags: if options.wide_offsets {
                FLAG_USE_LONG_OFFSETS
            } else {
                0
            },
            ..Default::default()
        });
        self
    }

    /// Commits a staged entry.
    ///
    /// Fails without touching previously committed entries when the stage is missing its
    /// identifier, source or hash decision.
    pub fn add(&mut self, entry: EntryBuilder) -> Result<&mut Self> {
        let (entry, source) = entry.build()?;
        self.sources.insert(entry.tpuid, source);
        self.index.insert(entry);
        Ok(self)
    }

    /// Opens the metadata block for `tpuid` for editing, creating it when missing.
    ///
    /// The blob entry itself does not have to exist yet.
    pub fn edit_metadata(&mut self, tpuid: Tpuid) -> MetadataBlockEditor<'_> {
        MetadataBlockEditor {
            block: self.metadata.block_mut(tpuid),
        }
    }

    /// Assembles the archive representation.
    pub fn finish(self) -> Result<PacFile> {
        let header = self.header.ok_or(BuilderStateError::HeaderNotSet)?;
        let mut pac = PacFile {
            header,
            index: self.index,
            metadata: self.metadata,
            trash: TrashIndex::new(),
            ..Default::default()
        };
        for (tpuid, source) in self.sources {
            pac.attach_source(tpuid, source);
        }
        Ok(pac)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{EntryBuilder, HeaderOptions, PacBuilder};
    use crate::error::{BuilderStateError, Error, Result};
    use crate::source::AssetSource;
    use crate::tpuid::Tpuid;
    use crate::types::{compute_sha256, FLAG_USE_LONG_OFFSETS};

    fn staged_entry() -> Result<EntryBuilder> {
        EntryBuilder::new()
            .tpuid(Tpuid::new(1, 2, 3))
            .source(AssetSource::from_bytes(b"payload".as_slice()))
            .no_compression()
            .computed_sha256()
    }

    #[test]
    fn finish_without_header_fails() -> Result<()> {
        let mut builder = PacBuilder::new();
        builder.add(staged_entry()?)?;
        assert!(matches!(
            builder.finish(),
            Err(Error::Builder(BuilderStateError::HeaderNotSet))
        ));
        Ok(())
    }

    #[test]
    fn add_without_tpuid_fails() -> Result<()> {
        let mut builder = PacBuilder::new();
        builder.header(HeaderOptions::builder().build());

        let entry = EntryBuilder::new()
            .source(AssetSource::from_bytes(b"payload".as_slice()))
            .ignored_sha256();
        assert!(matches!(
            builder.add(entry),
            Err(Error::Builder(BuilderStateError::MissingTpuid))
        ));
        Ok(())
    }

    #[test]
    fn add_without_source_fails() {
        let mut builder = PacBuilder::new();
        builder.header(HeaderOptions::builder().build());

        let entry = EntryBuilder::new().tpuid(Tpuid::new(1, 2, 3)).ignored_sha256();
        assert!(matches!(
            builder.add(entry),
            Err(Error::Builder(BuilderStateError::MissingSource))
        ));
    }

    #[test]
    fn add_without_hash_decision_fails() {
        let mut builder = PacBuilder::new();
        builder.header(HeaderOptions::builder().build());

        let entry = EntryBuilder::new()
            .tpuid(Tpuid::new(1, 2, 3))
            .source(AssetSource::from_bytes(b"payload".as_slice()));
        assert!(matches!(
            builder.add(entry),
            Err(Error::Builder(BuilderStateError::MissingHashDecision))
        ));
    }

    #[test]
    fn computed_sha256_without_source_fails() {
        let staged = EntryBuilder::new().tpuid(Tpuid::new(1, 2, 3)).computed_sha256();
        assert!(matches!(
            staged,
            Err(Error::Builder(BuilderStateError::MissingSource))
        ));
    }

    #[test]
    fn failed_add_leaves_committed_entries_intact() -> Result<()> {
        let mut builder = PacBuilder::new();
        builder.header(HeaderOptions::builder().build());
        builder.add(staged_entry()?)?;

        let bad = EntryBuilder::new().ignored_sha256();
        assert!(builder.add(bad).is_err());

        let pac = builder.finish()?;
        assert_eq!(pac.index.len(), 1);
        assert!(pac.index.contains(Tpuid::new(1, 2, 3)));
        Ok(())
    }

    #[test]
    fn committed_entry_carries_hash_and_sizes() -> Result<()> {
        let mut builder = PacBuilder::new();
        builder.header(HeaderOptions::builder().wide_offsets(true).build());
        builder.add(staged_entry()?)?;

        let pac = builder.finish()?;
        assert_eq!(pac.header.flags, FLAG_USE_LONG_OFFSETS);

        let entry = pac.index.get(Tpuid::new(1, 2, 3)).unwrap();
        assert_eq!(entry.memory_size, 7);
        assert_eq!(entry.compression_id, 0);
        assert_eq!(entry.sha256, compute_sha256(b"payload"));
        assert_eq!(pac.source(Tpuid::new(1, 2, 3))?.bytes()?, b"payload");
        Ok(())
    }

    #[test]
    fn ignored_hash_is_all_zero() -> Result<()> {
        let mut builder = PacBuilder::new();
        builder.header(HeaderOptions::builder().build());
        builder.add(
            EntryBuilder::new()
                .tpuid(Tpuid::new(4, 5, 6))
                .source(AssetSource::from_bytes(b"data".as_slice()))
                .no_compression()
                .ignored_sha256(),
        )?;

        let pac = builder.finish()?;
        assert_eq!(pac.index.get(Tpuid::new(4, 5, 6)).unwrap().sha256, [0u8; 32]);
        Ok(())
    }

    #[test]
    fn metadata_edits_are_additive() -> Result<()> {
        let tpuid = Tpuid::new(1, 2, 3);
        let mut builder = PacBuilder::new();
        builder.header(HeaderOptions::builder().build());

        // editing does not require the blob entry to exist yet
        builder
            .edit_metadata(tpuid)
            .entry("filename", "a.bin")
            .entry("author", "someone");
        builder.edit_metadata(tpuid).entry("filename", "b.bin");

        let pac = builder.finish()?;
        let block = pac.metadata.block(tpuid).unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(block.get("filename"), Some("b.bin"));
        assert_eq!(block.get("author"), Some("someone"));
        Ok(())
    }

    #[test]
    fn metadata_values_are_truncated_at_boundaries() -> Result<()> {
        let tpuid = Tpuid::new(1, 2, 3);
        // 254 'a's then a two-byte 'é' straddling the 255 byte cap
        let long = format!("{}é", "a".repeat(254));
        assert_eq!(long.len(), 256);

        let mut builder = PacBuilder::new();
        builder.header(HeaderOptions::builder().build());
        builder.edit_metadata(tpuid).entry("name", &long);

        let pac = builder.finish()?;
        let stored = pac.metadata.block(tpuid).unwrap().get("name").unwrap();
        assert_eq!(stored.len(), 254);
        assert_eq!(stored, "a".repeat(254));
        Ok(())
    }
}
