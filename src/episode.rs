use std::collections::HashSet;

use crate::error::{Error, Result};

/// One styled run of text inside a paragraph.
///
/// `tcy` marks tate-chu-yoko text: short character sequences (typically
/// two-digit numbers) rendered horizontally inside an otherwise vertical
/// document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub tcy: bool,
}

impl Fragment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tcy: false,
        }
    }

    pub fn tcy(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tcy: true,
        }
    }
}

/// One paragraph as an ordered sequence of fragments.
///
/// Immutable once produced by the parser; a run with no fragments is
/// malformed (a blank line is a run with a single empty fragment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphRun {
    pub fragments: Vec<Fragment>,
}

impl ParagraphRun {
    pub fn new(fragments: Vec<Fragment>) -> Self {
        Self { fragments }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![Fragment::plain(text)],
        }
    }
}

/// An embedded illustration. Identity is `id`; assets sharing an id are
/// duplicates and collapse to one stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub id: String,
    pub name: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

/// One installment of source content, the unit of packaging.
///
/// Exists only transiently: created from parser output, consumed once by
/// the archive builder, then discarded.
#[derive(Debug, Clone)]
pub struct Episode {
    /// Numeric episode index as text, e.g. `"12"`.
    pub id: String,
    pub title: String,
    pub paragraphs: Vec<ParagraphRun>,
    pub images: Vec<ImageAsset>,
}

impl Episode {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Format("episode id is empty".to_string()));
        }
        for (idx, paragraph) in self.paragraphs.iter().enumerate() {
            if paragraph.fragments.is_empty() {
                return Err(Error::Format(format!("paragraph {idx} has no fragments")));
            }
        }
        for image in &self.images {
            if image.id.trim().is_empty() {
                return Err(Error::Format(format!(
                    "image {:?} has an empty id",
                    image.name
                )));
            }
            if image.data.is_empty() {
                return Err(Error::Format(format!("image {:?} has no bytes", image.id)));
            }
        }
        Ok(())
    }
}

/// Stable-order deduplication: iterate in original order, keep the first
/// occurrence per id. Byte-for-byte deterministic output depends on this.
pub fn dedup_images(images: &[ImageAsset]) -> Vec<&ImageAsset> {
    let mut seen = HashSet::new();
    images
        .iter()
        .filter(|image| seen.insert(image.id.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: &str, data: &[u8]) -> ImageAsset {
        ImageAsset {
            id: id.to_string(),
            name: format!("{id}.png"),
            media_type: "image/png".to_string(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn dedup_keeps_first_occurrence_in_order() {
        let images = vec![image("a", b"one"), image("b", b"two"), image("a", b"three")];
        let unique = dedup_images(&images);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].id, "a");
        assert_eq!(unique[0].data, b"one");
        assert_eq!(unique[1].id, "b");
    }

    #[test]
    fn validate_rejects_empty_paragraph_run() {
        let episode = Episode {
            id: "1".to_string(),
            title: "t".to_string(),
            paragraphs: vec![ParagraphRun::new(Vec::new())],
            images: Vec::new(),
        };
        let err = episode.validate().unwrap_err().to_string();
        assert!(err.contains("no fragments"));
    }

    #[test]
    fn validate_rejects_empty_image_bytes() {
        let episode = Episode {
            id: "1".to_string(),
            title: "t".to_string(),
            paragraphs: vec![ParagraphRun::plain("hello")],
            images: vec![image("img1", b"")],
        };
        let err = episode.validate().unwrap_err().to_string();
        assert!(err.contains("no bytes"));
    }

    #[test]
    fn validate_rejects_empty_episode_id() {
        let episode = Episode {
            id: " ".to_string(),
            title: "t".to_string(),
            paragraphs: Vec::new(),
            images: Vec::new(),
        };
        assert!(episode.validate().is_err());
    }

    #[test]
    fn blank_line_is_a_valid_run() {
        let episode = Episode {
            id: "1".to_string(),
            title: "t".to_string(),
            paragraphs: vec![ParagraphRun::plain("")],
            images: Vec::new(),
        };
        assert!(episode.validate().is_ok());
    }
}
