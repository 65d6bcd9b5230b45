use std::path::PathBuf;

use clap::Args;
use itertools::Itertools;
use miette::Result;
use owo_colors::OwoColorize;
use pac_archive::PacArchive;

#[derive(Args)]
pub struct ListArgs {
    /// An input PAC file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = PacArchive::open(&self.file)?;

        let header = archive.header();
        println!(
            "{} version {}.{}, {} offsets, {} entries",
            self.file.display().bold(),
            header.major_version,
            header.minor_version,
            if header.wide() { "wide" } else { "narrow" },
            archive.len(),
        );

        for entry in archive.index().entries() {
            let hash: String = entry.sha256[..8].iter().map(|b| format!("{b:02x}")).collect();
            let annotations = archive
                .metadata_block(entry.tpuid)
                .map(|block| block.entries().map(|(k, v)| format!("{k}={v}")).join(", "))
                .unwrap_or_default();

            println!(
                "{}  {:>10} -> {:>10} bytes  codec {}  {}..  {}",
                entry.tpuid.to_string().green(),
                entry.disk_size,
                entry.memory_size,
                entry.compression_id,
                hash.dimmed(),
                annotations,
            );
        }

        Ok(())
    }
}
