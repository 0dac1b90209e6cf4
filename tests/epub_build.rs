use std::io::Read as _;

use novelshelf::episode::{Episode, Fragment, ImageAsset, ParagraphRun};
use novelshelf::epub::{BuildOptions, build_episode_epub};
use novelshelf::metadata::BookMetadata;

const TIMESTAMP: &str = "2024-01-02T03:04:05+09:00";

fn image(id: &str, data: &[u8]) -> ImageAsset {
    ImageAsset {
        id: id.to_string(),
        name: format!("{id}.png"),
        media_type: "image/png".to_string(),
        data: data.to_vec(),
    }
}

fn fixture_episode() -> Episode {
    Episode {
        id: "1".to_string(),
        title: "Episode 1".to_string(),
        paragraphs: vec![
            ParagraphRun::plain("It was a dark and stormy night."),
            ParagraphRun::new(vec![
                Fragment::plain("Year "),
                Fragment::tcy("25"),
                Fragment::plain(" of the new calendar."),
            ]),
        ],
        images: vec![image("img1", b"\x89PNG fake image bytes")],
    }
}

fn build_fixture() -> Vec<u8> {
    build_episode_epub(
        "n1234ab",
        "Test Novel",
        &fixture_episode(),
        TIMESTAMP,
        BuildOptions::default(),
    )
    .expect("build epub")
}

fn open_archive(bytes: &[u8]) -> zip::ZipArchive<std::io::Cursor<Vec<u8>>> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).expect("open archive")
}

fn read_entry(archive: &mut zip::ZipArchive<std::io::Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
    let mut entry = archive.by_name(name).expect("archive entry");
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf).expect("read entry");
    buf
}

#[test]
fn first_entry_is_an_uncompressed_mimetype_declaration() {
    let bytes = build_fixture();

    // Raw local-file-header checks: the archive must start with a stored
    // (method 0) entry named `mimetype`.
    assert_eq!(&bytes[0..4], b"PK\x03\x04");
    assert_eq!(&bytes[8..10], &[0u8, 0]);
    assert_eq!(&bytes[30..38], b"mimetype");

    let mut archive = open_archive(&bytes);
    let entry = archive.by_index(0).expect("entry 0");
    assert_eq!(entry.name(), "mimetype");
    assert_eq!(entry.compression(), zip::CompressionMethod::Stored);
    drop(entry);

    assert_eq!(
        read_entry(&mut archive, "mimetype"),
        b"application/epub+zip"
    );
}

#[test]
fn structural_entries_are_present_and_compressed() {
    let bytes = build_fixture();
    let mut archive = open_archive(&bytes);

    for name in [
        "META-INF/container.xml",
        "src/style.css",
        "src/content.opf",
        "src/navigation.xhtml",
        "src/metadata.json",
    ] {
        let entry = archive.by_name(name).expect(name);
        assert_eq!(
            entry.compression(),
            zip::CompressionMethod::Deflated,
            "{name} should be deflated"
        );
    }

    let container = String::from_utf8(read_entry(&mut archive, "META-INF/container.xml")).unwrap();
    assert!(container.contains("full-path=\"src/content.opf\""));

    let css = String::from_utf8(read_entry(&mut archive, "src/style.css")).unwrap();
    assert!(css.contains("writing-mode: vertical-rl"));
    assert!(css.contains("span.tcy"));
}

#[test]
fn text_entry_holds_title_and_paragraphs_in_order() {
    let bytes = build_fixture();
    let mut archive = open_archive(&bytes);

    let text = String::from_utf8(read_entry(&mut archive, "src/text/1.xhtml")).unwrap();
    assert!(text.contains("<h1>Episode 1</h1>"));

    let first = text.find("It was a dark and stormy night.").expect("p1");
    let second = text.find("of the new calendar.").expect("p2");
    assert!(first < second);
    assert!(text.contains("<span class=\"tcy\">25</span>"));
}

#[test]
fn image_entry_matches_original_bytes_exactly() {
    let bytes = build_fixture();
    let mut archive = open_archive(&bytes);
    assert_eq!(
        read_entry(&mut archive, "src/image/img1.png"),
        b"\x89PNG fake image bytes"
    );
}

#[test]
fn duplicate_image_ids_collapse_to_the_first_occurrence() {
    let mut episode = fixture_episode();
    episode.images = vec![image("img1", b"first bytes"), image("img1", b"second bytes")];

    let bytes = build_episode_epub(
        "n1234ab",
        "Test Novel",
        &episode,
        TIMESTAMP,
        BuildOptions::default(),
    )
    .expect("build epub");
    let mut archive = open_archive(&bytes);

    let image_entries: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("src/image/"))
        .map(String::from)
        .collect();
    assert_eq!(image_entries, vec!["src/image/img1.png".to_string()]);
    assert_eq!(read_entry(&mut archive, "src/image/img1.png"), b"first bytes");

    let metadata: BookMetadata =
        serde_json::from_slice(&read_entry(&mut archive, "src/metadata.json")).unwrap();
    let entry = metadata.episodes.get("1").expect("episode metadata");
    assert_eq!(entry.images.len(), 1);
    assert_eq!(entry.images[0].id, "img1");
}

#[test]
fn metadata_sidecar_mirrors_the_episode() {
    let bytes = build_fixture();
    let mut archive = open_archive(&bytes);

    let metadata: BookMetadata =
        serde_json::from_slice(&read_entry(&mut archive, "src/metadata.json")).unwrap();
    assert_eq!(metadata.novel_id, "n1234ab");
    assert!(metadata.illustration);
    assert!(metadata.tcy);
    assert!(!metadata.kakuyomu);

    let entry = metadata.episodes.get("1").expect("episode metadata");
    assert_eq!(entry.title, "Episode 1");
    assert_eq!(entry.created_at, "");
}

#[test]
fn content_opf_lists_timestamp_and_items() {
    let bytes = build_fixture();
    let mut archive = open_archive(&bytes);

    let opf = String::from_utf8(read_entry(&mut archive, "src/content.opf")).unwrap();
    assert!(opf.contains("<dc:title>Test Novel</dc:title>"));
    assert!(opf.contains("<dc:identifier id=\"bookid\"></dc:identifier>"));
    assert!(opf.contains(TIMESTAMP));
    assert!(opf.contains("href=\"text/1.xhtml\""));
    assert!(opf.contains("href=\"image/img1.png\""));
}

#[test]
fn rebuilds_are_byte_identical() {
    assert_eq!(build_fixture(), build_fixture());
}

#[test]
fn malformed_content_fails_the_build() {
    let mut empty_run = fixture_episode();
    empty_run.paragraphs.push(ParagraphRun::new(Vec::new()));
    assert!(
        build_episode_epub(
            "n1",
            "T",
            &empty_run,
            TIMESTAMP,
            BuildOptions::default()
        )
        .is_err()
    );

    let mut empty_image = fixture_episode();
    empty_image.images = vec![image("img1", b"")];
    assert!(
        build_episode_epub(
            "n1",
            "T",
            &empty_image,
            TIMESTAMP,
            BuildOptions::default()
        )
        .is_err()
    );
}
