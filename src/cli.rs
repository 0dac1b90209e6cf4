use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Serve(ServeArgs),
    Build(BuildArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: SocketAddr,

    /// Directory holding the cached episode archives.
    #[arg(long, default_value = "bookshelf")]
    pub cache_dir: PathBuf,

    /// Static reader UI directory (mounted at /reader when it contains an
    /// index.html).
    #[arg(long)]
    pub reader_dir: Option<PathBuf>,

    /// Upstream site base URL.
    #[arg(long, default_value = "https://ncode.syosetu.com")]
    pub base_url: String,

    /// Timeout for each upstream request.
    #[arg(long, default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// Skip downloading illustrations.
    #[arg(long)]
    pub no_images: bool,

    /// Keep digit runs vertical instead of converting them to
    /// tate-chu-yoko.
    #[arg(long)]
    pub no_tcy: bool,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Novel id, e.g. n4830bu.
    #[arg(long)]
    pub novel_id: String,

    /// Episode number (1-based).
    #[arg(long)]
    pub episode: u32,

    /// Output file path for the archive.
    #[arg(long)]
    pub out: PathBuf,

    /// Upstream site base URL.
    #[arg(long, default_value = "https://ncode.syosetu.com")]
    pub base_url: String,

    /// Timeout for each upstream request.
    #[arg(long, default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    /// Skip downloading illustrations.
    #[arg(long)]
    pub no_images: bool,

    /// Keep digit runs vertical instead of converting them to
    /// tate-chu-yoko.
    #[arg(long)]
    pub no_tcy: bool,
}
