use std::fs::File;
use std::path::PathBuf;

use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use pac_archive::{PacArchive, Tpuid};
use tracing::{info, warn};

#[derive(Args)]
pub struct UnpackArgs {
    /// An input PAC file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl UnpackArgs {
    pub fn handle(&self) -> Result<()> {
        let mut archive = PacArchive::open(&self.file)
            .context(format!("path: {}", &self.file.display()))?;

        let mut unpacked = 0usize;
        for tpuid in archive.tpuids().collect::<Vec<_>>() {
            match self.extract(&mut archive, tpuid) {
                Ok(path) => {
                    info!("wrote {}", path.display());
                    unpacked += 1;
                }
                Err(err) => warn!("skipping {tpuid}: {err}"),
            }
        }

        info!("unpacked {unpacked} of {} assets", archive.len());
        Ok(())
    }

    fn extract(&self, archive: &mut PacArchive<File>, tpuid: Tpuid) -> Result<PathBuf> {
        let name = archive
            .metadata_block(tpuid)
            .and_then(|block| block.get("filename"))
            .map(str::to_owned)
            .unwrap_or_else(|| {
                format!(
                    "{:04x}_{:04x}_{:08x}.bin",
                    tpuid.type_id(),
                    tpuid.purpose_id(),
                    tpuid.unique_id()
                )
            });

        let target = self.directory.join(name);
        if let Some(parent) = target.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let mut out = if !self.overwrite {
            File::create_new(&target)
                .into_diagnostic()
                .context(format!("creating {}", &target.display()))?
        } else {
            File::create(&target)
                .into_diagnostic()
                .context(format!("creating {}", &target.display()))?
        };

        let mut blob = archive.by_tpuid(tpuid)?;
        std::io::copy(&mut blob, &mut out).into_diagnostic()?;
        Ok(target)
    }
}
