use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::episode::{Episode, Fragment, ImageAsset, ParagraphRun};
use crate::error::{Error, Result};

static NAROU_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://ncode\.syosetu\.com/([A-Za-z0-9]+)(?:/(\d+))?/?$")
        .expect("narou url pattern")
});

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector"));
static EPISODE_TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1.p-novel__title, p.novel_subtitle").expect("episode title selector")
});
static BODY_PARAGRAPH_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.js-novel-text p, div#novel_honbun p").expect("body selector")
});

/// Extract `(novel_id, episode)` from a pasted ncode.syosetu.com URL.
pub fn parse_narou_url(input: &str) -> Option<(String, Option<u32>)> {
    let captures = NAROU_URL_RE.captures(input.trim())?;
    let novel_id = captures.get(1)?.as_str().to_string();
    let episode = captures.get(2).and_then(|m| m.as_str().parse().ok());
    Some((novel_id, episode))
}

/// Novel ids are short alphanumeric codes like `n4830bu`.
pub fn is_valid_novel_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 20 && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// An episode page after fetch + parse, ready for the archive builder.
#[derive(Debug)]
pub struct FetchedEpisode {
    pub novel_title: String,
    pub episode: Episode,
}

/// Boundary to the upstream site: one call per episode, blocking on
/// network I/O for its own duration. No retries happen behind this seam.
#[async_trait]
pub trait EpisodeFetcher: Send + Sync {
    async fn fetch_episode(&self, novel_id: &str, episode: u32) -> Result<FetchedEpisode>;
}

pub struct NarouClient {
    base_url: Url,
    client: reqwest::Client,
    include_images: bool,
    convert_tcy: bool,
}

impl NarouClient {
    /// `timeout` bounds every upstream request; a hung fetch becomes a
    /// build failure instead of blocking the request forever.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        include_images: bool,
        convert_tcy: bool,
    ) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url).context("parse upstream base url")?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("novelshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url,
            client,
            include_images,
            convert_tcy,
        })
    }

    fn episode_url(&self, novel_id: &str, episode: u32) -> Result<Url> {
        self.base_url
            .join(&format!("{novel_id}/{episode}/"))
            .map_err(|err| {
                Error::fetch(
                    self.base_url.as_str(),
                    format!("build episode url: {err}"),
                )
            })
    }

    async fn get_text(&self, url: &Url) -> Result<String> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| Error::fetch(url.as_str(), err.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::fetch(
                url.as_str(),
                format!("status {}", resp.status()),
            ));
        }
        resp.text()
            .await
            .map_err(|err| Error::fetch(url.as_str(), err.to_string()))
    }

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| Error::fetch(url.as_str(), err.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::fetch(
                url.as_str(),
                format!("status {}", resp.status()),
            ));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| Error::fetch(url.as_str(), err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl EpisodeFetcher for NarouClient {
    async fn fetch_episode(&self, novel_id: &str, episode: u32) -> Result<FetchedEpisode> {
        let url = self.episode_url(novel_id, episode)?;
        tracing::info!(%url, "fetching episode page");
        let html = self.get_text(&url).await?;

        let page = parse_episode_page(&html, &url, self.convert_tcy)?;

        let mut images = Vec::new();
        if self.include_images {
            for parsed in &page.images {
                let data = self.get_bytes(&parsed.url).await?;
                images.push(ImageAsset {
                    id: parsed.id.clone(),
                    name: parsed.name.clone(),
                    media_type: parsed.media_type.clone(),
                    data,
                });
            }
        }

        Ok(FetchedEpisode {
            novel_title: page.novel_title,
            episode: Episode {
                id: episode.to_string(),
                title: page.episode_title,
                paragraphs: page.paragraphs,
                images,
            },
        })
    }
}

#[derive(Debug)]
struct ParsedImage {
    id: String,
    name: String,
    media_type: String,
    url: Url,
}

#[derive(Debug)]
struct ParsedPage {
    novel_title: String,
    episode_title: String,
    paragraphs: Vec<ParagraphRun>,
    images: Vec<ParsedImage>,
}

fn parse_episode_page(html: &str, page_url: &Url, convert_tcy: bool) -> Result<ParsedPage> {
    let doc = Html::parse_document(html);

    let novel_title = doc
        .select(&TITLE_SEL)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
        .ok_or_else(|| Error::Parse("missing <title>".to_string()))?;

    let episode_title = doc
        .select(&EPISODE_TITLE_SEL)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
        .ok_or_else(|| Error::Parse("missing episode title".to_string()))?;

    let mut paragraphs = Vec::new();
    let mut images = Vec::new();
    for p in doc.select(&BODY_PARAGRAPH_SEL) {
        let images_before = images.len();
        let fragments = paragraph_fragments(p, convert_tcy, &mut images, page_url);
        if fragments.is_empty() {
            // An illustration-only paragraph has no text run; a genuinely
            // empty <p> is a blank line.
            if images.len() == images_before {
                paragraphs.push(ParagraphRun::plain(""));
            }
            continue;
        }
        paragraphs.push(ParagraphRun::new(fragments));
    }
    if paragraphs.is_empty() && images.is_empty() {
        return Err(Error::Parse("no episode body found".to_string()));
    }

    Ok(ParsedPage {
        novel_title,
        episode_title,
        paragraphs,
        images,
    })
}

fn paragraph_fragments(
    p: ElementRef<'_>,
    convert_tcy: bool,
    images: &mut Vec<ParsedImage>,
    page_url: &Url,
) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    for child in p.children() {
        match child.value() {
            scraper::Node::Text(text) => append_text(&mut fragments, text, convert_tcy),
            scraper::Node::Element(_) => {
                let Some(el) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = el.value().name();
                if name == "img" {
                    if let Some(image) = image_from_element(el, page_url) {
                        images.push(image);
                    }
                } else if name == "span" && el.value().classes().any(|class| class == "tcy") {
                    fragments.push(Fragment::tcy(el.text().collect::<String>()));
                } else if name == "br" {
                    // Narou emits one <p> per line; stray breaks add nothing.
                } else {
                    append_text(&mut fragments, &el.text().collect::<String>(), convert_tcy);
                }
            }
            _ => {}
        }
    }
    fragments
}

/// Append text, optionally splitting out exactly-two-digit runs as
/// tate-chu-yoko fragments. Longer digit runs stay in the vertical flow.
fn append_text(fragments: &mut Vec<Fragment>, text: &str, convert_tcy: bool) {
    if text.is_empty() {
        return;
    }
    if !convert_tcy {
        fragments.push(Fragment::plain(text));
        return;
    }

    let mut plain = String::new();
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        flush_digit_run(fragments, &mut plain, &mut digits);
        plain.push(ch);
    }
    flush_digit_run(fragments, &mut plain, &mut digits);
    if !plain.is_empty() {
        fragments.push(Fragment::plain(plain));
    }
}

fn flush_digit_run(fragments: &mut Vec<Fragment>, plain: &mut String, digits: &mut String) {
    if digits.is_empty() {
        return;
    }
    if digits.chars().count() == 2 {
        if !plain.is_empty() {
            fragments.push(Fragment::plain(std::mem::take(plain)));
        }
        fragments.push(Fragment::tcy(std::mem::take(digits)));
    } else {
        plain.push_str(digits);
        digits.clear();
    }
}

fn image_from_element(el: ElementRef<'_>, page_url: &Url) -> Option<ParsedImage> {
    let src = el.value().attr("src")?.trim();
    if src.is_empty() {
        return None;
    }
    // Narou serves illustrations from a protocol-relative host.
    let resolved = if let Some(rest) = src.strip_prefix("//") {
        Url::parse(&format!("https://{rest}")).ok()?
    } else {
        page_url.join(src).ok()?
    };

    let name = resolved
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())?
        .to_string();
    let id = name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(name.as_str())
        .to_string();
    let media_type = match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };

    Some(ParsedImage {
        id,
        name,
        media_type: media_type.to_string(),
        url: resolved,
    })
}
