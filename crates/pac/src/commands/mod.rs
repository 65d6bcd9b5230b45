pub mod list;
pub mod pack;
pub mod unpack;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Pack assets listed in a manifest into a PAC file
    Pack(pack::PackArgs),
    /// List the contents of a PAC file
    List(list::ListArgs),
    /// Unpack a PAC file into a directory
    Unpack(unpack::UnpackArgs),
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Pack(pack) => pack.handle(),
            Commands::List(list) => list.handle(),
            Commands::Unpack(unpack) => unpack.handle(),
        }
    }
}
