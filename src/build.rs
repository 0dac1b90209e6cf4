use std::time::Duration;

use anyhow::Context as _;

use crate::cli::BuildArgs;
use crate::epub::{BuildOptions, build_episode_epub};
use crate::narou::{self, EpisodeFetcher as _, NarouClient};

/// One-shot fetch + build to a file, bypassing the cache.
pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
    if !narou::is_valid_novel_id(&args.novel_id) {
        anyhow::bail!("invalid novel id: {}", args.novel_id);
    }

    let client = NarouClient::new(
        &args.base_url,
        Duration::from_secs(args.fetch_timeout_secs),
        !args.no_images,
        !args.no_tcy,
    )
    .context("build upstream client")?;

    let fetched = client
        .fetch_episode(&args.novel_id, args.episode)
        .await
        .context("fetch episode")?;

    let timestamp = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);
    let options = BuildOptions {
        illustration: !args.no_images,
        tcy: !args.no_tcy,
    };
    let bytes = build_episode_epub(
        &args.novel_id,
        &fetched.novel_title,
        &fetched.episode,
        &timestamp,
        options,
    )
    .context("build archive")?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }
    std::fs::write(&args.out, &bytes)
        .with_context(|| format!("write archive: {}", args.out.display()))?;

    tracing::info!(out = %args.out.display(), bytes = bytes.len(), "wrote episode archive");
    Ok(())
}
