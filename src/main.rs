use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    novelshelf::logging::init().context("init logging")?;

    let cli = novelshelf::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        novelshelf::cli::Command::Serve(args) => {
            novelshelf::server::run(args).await.context("serve")?;
        }
        novelshelf::cli::Command::Build(args) => {
            novelshelf::build::run(args).await.context("build")?;
        }
    }

    Ok(())
}
