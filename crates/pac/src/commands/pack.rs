use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use pac_archive::source::resolve_relative;
use pac_archive::write::{write_to_path, PacWriterOptions};
use pac_archive::{AssetSource, EntryBuilder, HeaderOptions, PacBuilder, Tpuid};
use tracing::{info, warn};

#[derive(Args)]
pub struct PackArgs {
    /// A manifest of `TPUID=path` lines; `output=<path>` names the target archive
    #[arg(short, long, value_name = "FILE")]
    manifest: PathBuf,

    /// Deflate raw assets while packing
    #[arg(long, default_value_t = false)]
    compress: bool,

    /// Store offsets as 64-bit values
    #[arg(long, default_value_t = false)]
    wide: bool,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        let text = fs::read_to_string(&self.manifest)
            .into_diagnostic()
            .context(format!("reading {}", &self.manifest.display()))?;
        let manifest_dir = self
            .manifest
            .parent()
            .ok_or(miette!("manifest has no parent directory"))?;

        let mut output = manifest_dir.join("out.pac");
        let mut assets: Vec<(Tpuid, PathBuf)> = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else {
                warn!("skipping invalid line {line:?}");
                continue;
            };
            let (key, val) = (key.trim(), val.trim());
            if key.eq_ignore_ascii_case("output") {
                output = resolve_relative(manifest_dir, Path::new(val));
                continue;
            }
            match key.parse::<Tpuid>() {
                Ok(tpuid) => {
                    let path = resolve_relative(manifest_dir, Path::new(val));
                    info!("indexed {} as {tpuid}", path.display());
                    assets.push((tpuid, path));
                }
                Err(err) => warn!("skipping invalid line {line:?}: {err}"),
            }
        }

        let mut builder = PacBuilder::new();
        builder.header(HeaderOptions::builder().wide_offsets(self.wide).build());

        let mut packed = 0usize;
        for (tpuid, path) in assets {
            match stage(tpuid, &path) {
                Ok(entry) => {
                    builder.add(entry)?;
                    let filename = path
                        .strip_prefix(manifest_dir)
                        .unwrap_or(&path)
                        .to_string_lossy()
                        .into_owned();
                    builder.edit_metadata(tpuid).entry("filename", &filename);
                    info!("packing {} as {tpuid}", path.display());
                    packed += 1;
                }
                Err(err) => warn!("skipping {tpuid} ({}): {err}", path.display()),
            }
        }

        let pac = builder.finish()?;
        write_to_path(
            &output,
            &pac,
            PacWriterOptions::builder().compress(self.compress).build(),
        )
        .context(format!("writing {}", output.display()))?;

        info!("packed {packed} assets into {}", output.display());
        Ok(())
    }
}

fn stage(tpuid: Tpuid, path: &Path) -> pac_archive::error::Result<EntryBuilder> {
    let size = fs::metadata(path)?.len();
    EntryBuilder::new()
        .tpuid(tpuid)
        .source(AssetSource::from_path(path))
        .memory_size(size as u32)
        .no_compression()
        .computed_sha256()
}
