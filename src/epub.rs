use std::io::{Cursor, Write as _};

use zip::write::SimpleFileOptions;

use crate::episode::{Episode, ImageAsset, ParagraphRun, dedup_images};
use crate::error::{Error, Result};
use crate::metadata::BookMetadata;

/// Options carried through from the parser into the metadata sidecar.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub illustration: bool,
    pub tcy: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            illustration: true,
            tcy: true,
        }
    }
}

/// A navigation group. Single-episode archives use one `default` chapter;
/// the entry rules below do not change when more chapters appear.
#[derive(Debug)]
struct Chapter<'a> {
    name: &'a str,
    episodes: &'a [Episode],
}

/// Assemble one episode into an EPUB, returned as the raw archive bytes.
///
/// Deterministic given identical inputs modulo the caller-supplied
/// `timestamp` (RFC 3339, written into the package document).
pub fn build_episode_epub(
    novel_id: &str,
    novel_title: &str,
    episode: &Episode,
    timestamp: &str,
    options: BuildOptions,
) -> Result<Vec<u8>> {
    episode.validate()?;

    let episodes = std::slice::from_ref(episode);
    let chapters = [Chapter {
        name: "default",
        episodes,
    }];
    let unique_images = dedup_images(&episode.images);

    let metadata = BookMetadata::for_single_episode(
        novel_id,
        episode,
        &unique_images,
        options.illustration,
        options.tcy,
    );
    let metadata_json = serde_json::to_string(&metadata)
        .map_err(|err| Error::Format(format!("serialize metadata sidecar: {err}")))?;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

    // Per EPUB spec, `mimetype` MUST be the first entry and MUST be stored
    // (no compression).
    let stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    write_entry(&mut zip, "mimetype", b"application/epub+zip", stored)?;

    // Everything else deflates at the maximum level; a fixed level keeps
    // rebuilds byte-identical.
    let deflated = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(9))
        .unix_permissions(0o644);

    write_entry(
        &mut zip,
        "META-INF/container.xml",
        render_container_xml().as_bytes(),
        deflated,
    )?;
    write_entry(&mut zip, "src/style.css", style_css().as_bytes(), deflated)?;
    write_entry(
        &mut zip,
        "src/content.opf",
        render_content_opf(novel_title, "", timestamp, episodes, &unique_images).as_bytes(),
        deflated,
    )?;
    write_entry(
        &mut zip,
        "src/navigation.xhtml",
        render_navigation_xhtml(&chapters).as_bytes(),
        deflated,
    )?;
    write_entry(&mut zip, "src/metadata.json", metadata_json.as_bytes(), deflated)?;

    for episode in episodes {
        write_entry(
            &mut zip,
            &format!("src/text/{}.xhtml", episode.id),
            render_text_xhtml(&episode.title, &episode.paragraphs).as_bytes(),
            deflated,
        )?;
    }

    // First occurrence per id wins; the same image path is never written
    // twice.
    for image in &unique_images {
        write_entry(
            &mut zip,
            &format!("src/image/{}", image.name),
            &image.data,
            deflated,
        )?;
    }

    let cursor = zip
        .finish()
        .map_err(|err| archive_err("finish", err.into()))?;
    Ok(cursor.into_inner())
}

fn write_entry<W: std::io::Write + std::io::Seek>(
    zip: &mut zip::ZipWriter<W>,
    name: &str,
    bytes: &[u8],
    options: SimpleFileOptions,
) -> Result<()> {
    zip.start_file(name, options)
        .map_err(|err| archive_err(name, err.into()))?;
    zip.write_all(bytes).map_err(|err| archive_err(name, err))?;
    Ok(())
}

fn archive_err(name: &str, source: std::io::Error) -> Error {
    Error::Archive {
        name: name.to_string(),
        source,
    }
}

fn render_container_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="src/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    .to_string()
}

/// Vertical writing mode with zero paragraph margins; `span.tcy` flips
/// short runs back to horizontal.
fn style_css() -> String {
    r#"body {
	writing-mode: vertical-rl;
	-webkit-writing-mode: vertical-rl;
	-epub-writing-mode: vertical-rl;
	line-height: 1.7;
}

p {
	margin: 0;
	padding: 0;
}

span.tcy {
	writing-mode: horizontal-tb;
	-webkit-writing-mode: horizontal-tb;
	-epub-writing-mode: horizontal-tb;
	line-height: 1;
}
"#
    .to_string()
}

fn render_content_opf(
    title: &str,
    identifier: &str,
    timestamp: &str,
    episodes: &[Episode],
    images: &[&ImageAsset],
) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"bookid\" version=\"3.0\" xml:lang=\"ja\">\n",
    );
    out.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
    out.push_str(&format!(
        "    <dc:identifier id=\"bookid\">{}</dc:identifier>\n",
        xml_escape(identifier)
    ));
    out.push_str(&format!("    <dc:title>{}</dc:title>\n", xml_escape(title)));
    out.push_str("    <dc:language>ja</dc:language>\n");
    out.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        xml_escape(timestamp)
    ));
    out.push_str("  </metadata>\n");
    out.push_str("  <manifest>\n");
    out.push_str(
        "    <item id=\"nav\" href=\"navigation.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\" />\n",
    );
    out.push_str("    <item id=\"css\" href=\"style.css\" media-type=\"text/css\" />\n");
    for episode in episodes {
        out.push_str(&format!(
            "    <item id=\"text-{id}\" href=\"text/{id}.xhtml\" media-type=\"application/xhtml+xml\" />\n",
            id = xml_escape(&episode.id)
        ));
    }
    for image in images {
        out.push_str(&format!(
            "    <item id=\"image-{}\" href=\"image/{}\" media-type=\"{}\" />\n",
            xml_escape(&image.id),
            xml_escape(&image.name),
            xml_escape(&image.media_type)
        ));
    }
    out.push_str("  </manifest>\n");
    out.push_str("  <spine page-progression-direction=\"rtl\">\n");
    for episode in episodes {
        out.push_str(&format!(
            "    <itemref idref=\"text-{}\" />\n",
            xml_escape(&episode.id)
        ));
    }
    out.push_str("  </spine>\n");
    out.push_str("</package>\n");
    out
}

fn render_navigation_xhtml(chapters: &[Chapter<'_>]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" lang=\"ja\" xml:lang=\"ja\">\n",
    );
    out.push_str("<head>\n  <title>Navigation</title>\n  <meta charset=\"utf-8\" />\n</head>\n");
    out.push_str("<body>\n");
    out.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n");
    out.push_str("    <ol>\n");
    for chapter in chapters {
        if chapter.name == "default" {
            for episode in chapter.episodes {
                out.push_str(&episode_nav_item(episode, "      "));
            }
            continue;
        }
        out.push_str(&format!(
            "      <li><span>{}</span>\n        <ol>\n",
            xml_escape(chapter.name)
        ));
        for episode in chapter.episodes {
            out.push_str(&episode_nav_item(episode, "          "));
        }
        out.push_str("        </ol>\n      </li>\n");
    }
    out.push_str("    </ol>\n");
    out.push_str("  </nav>\n");
    out.push_str("</body>\n</html>\n");
    out
}

fn episode_nav_item(episode: &Episode, indent: &str) -> String {
    format!(
        "{indent}<li><a href=\"text/{}.xhtml\">{}</a></li>\n",
        xml_escape(&episode.id),
        xml_escape(&episode.title)
    )
}

fn render_text_xhtml(title: &str, paragraphs: &[ParagraphRun]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"ja\" xml:lang=\"ja\">\n");
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(title)));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    out.push_str("  <link rel=\"stylesheet\" type=\"text/css\" href=\"../style.css\" />\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(&format!("  <h1>{}</h1>\n", xml_escape(title)));
    for paragraph in paragraphs {
        out.push_str("  <p>");
        for fragment in &paragraph.fragments {
            if fragment.tcy {
                out.push_str(&format!(
                    "<span class=\"tcy\">{}</span>",
                    xml_escape(&fragment.text)
                ));
            } else {
                out.push_str(&xml_escape(&fragment.text));
            }
        }
        out.push_str("</p>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
