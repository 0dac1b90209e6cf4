use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, Redirect, Response};
use axum::routing::get;
use serde::Deserialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::cache::Bookshelf;
use crate::cli::ServeArgs;
use crate::epub::{BuildOptions, build_episode_epub};
use crate::error::Error;
use crate::narou::{self, EpisodeFetcher, NarouClient};

#[derive(Clone)]
pub struct AppState {
    pub shelf: Bookshelf,
    pub fetcher: Arc<dyn EpisodeFetcher>,
    pub build_options: BuildOptions,
    pub reader_mounted: bool,
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let fetcher = NarouClient::new(
        &args.base_url,
        Duration::from_secs(args.fetch_timeout_secs),
        !args.no_images,
        !args.no_tcy,
    )
    .context("build upstream client")?;

    let shelf = Bookshelf::new(&args.cache_dir);
    tokio::fs::create_dir_all(shelf.root())
        .await
        .with_context(|| format!("create cache dir: {}", args.cache_dir.display()))?;

    let reader_dir = match &args.reader_dir {
        Some(dir) if dir.join("index.html").exists() => Some(dir.clone()),
        Some(dir) => {
            tracing::warn!(dir = %dir.display(), "reader dir has no index.html; not mounting");
            None
        }
        None => None,
    };

    let state = AppState {
        shelf,
        fetcher: Arc::new(fetcher),
        build_options: BuildOptions {
            illustration: !args.no_images,
            tcy: !args.no_tcy,
        },
        reader_mounted: reader_dir.is_some(),
    };
    let app = router(state, reader_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: AppState, reader_dir: Option<&std::path::Path>) -> Router {
    let mut app = Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/", get(index))
        .route("/go", get(go))
        .route("/go-id", get(go_id))
        .route("/read/:novel_id/:episode", get(read_episode))
        .route("/shelf/*path", get(serve_shelf));

    if let Some(dir) = reader_dir {
        app = app.nest_service("/reader", ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>novelshelf</title></head>
  <body>
    <h1>novelshelf</h1>
    <p>Paste an episode URL: <code>/go?url=https://ncode.syosetu.com/{novel}/{episode}/</code></p>
    <p>Or go by id: <code>/go-id?novel_id={novel}&amp;episode={episode}</code></p>
    <p>Cached archives are served under <code>/shelf/</code>.</p>
  </body>
</html>
"#,
    )
}

#[derive(Debug, Deserialize)]
struct GoQuery {
    #[serde(default)]
    url: String,
}

async fn go(Query(query): Query<GoQuery>) -> Result<Redirect, (StatusCode, String)> {
    let raw = query.url.trim();
    if raw.is_empty() {
        return Ok(Redirect::to("/"));
    }
    let Some((novel_id, episode)) = narou::parse_narou_url(raw) else {
        return Err((
            StatusCode::BAD_REQUEST,
            "invalid url: expected an ncode.syosetu.com episode url".to_string(),
        ));
    };
    let episode = episode.unwrap_or(1);
    Ok(Redirect::to(&format!("/read/{novel_id}/{episode}")))
}

#[derive(Debug, Deserialize)]
struct GoIdQuery {
    #[serde(default)]
    novel_id: String,
    #[serde(default)]
    episode: String,
}

async fn go_id(Query(query): Query<GoIdQuery>) -> Redirect {
    let novel_id = query.novel_id.trim();
    if novel_id.is_empty() {
        return Redirect::to("/");
    }
    let episode = query.episode.trim();
    let episode = if episode.is_empty() { "1" } else { episode };
    Redirect::to(&format!("/read/{novel_id}/{episode}"))
}

async fn read_episode(
    State(state): State<AppState>,
    Path((novel_id, episode)): Path<(String, u32)>,
) -> Result<Redirect, (StatusCode, String)> {
    if !narou::is_valid_novel_id(&novel_id) {
        return Err((StatusCode::BAD_REQUEST, "invalid novel id".to_string()));
    }
    if !(1..=10_000).contains(&episode) {
        return Err((
            StatusCode::BAD_REQUEST,
            "episode must be between 1 and 10000".to_string(),
        ));
    }

    let fetcher = Arc::clone(&state.fetcher);
    let options = state.build_options;
    let id = novel_id.clone();
    state
        .shelf
        .get_or_create(&novel_id, episode, || async move {
            let fetched = fetcher.fetch_episode(&id, episode).await?;
            let timestamp =
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);
            build_episode_epub(
                &id,
                &fetched.novel_title,
                &fetched.episode,
                &timestamp,
                options,
            )
        })
        .await
        .map_err(|err| {
            tracing::error!(novel_id, episode, %err, "episode build failed");
            build_failure_status(&err)
        })?;

    let file = Bookshelf::file_name(&novel_id, episode);
    let target = if state.reader_mounted {
        format!("/reader/index.html?book={file}")
    } else {
        format!("/shelf/{file}")
    };
    Ok(Redirect::to(&target))
}

/// Build-time errors abort the whole request; nothing partial is ever
/// exposed, so the mapping here is purely status-code selection.
fn build_failure_status(err: &Error) -> (StatusCode, String) {
    let status = match err {
        Error::Fetch { .. } | Error::Parse(_) => StatusCode::BAD_GATEWAY,
        Error::Format(_) | Error::Archive { .. } | Error::CacheIo { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, format!("failed to build episode archive: {err}"))
}

async fn serve_shelf(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());
    crate::serve::serve_file(state.shelf.root(), &path, range).await
}
