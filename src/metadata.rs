use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::episode::{Episode, ImageAsset};

/// Reference to a deduplicated image entry inside the archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub images: Vec<ImageRef>,
}

/// The `src/metadata.json` sidecar embedded in each archive.
///
/// Every image id referenced here corresponds to exactly one stored
/// `src/image/` entry; the map is ordered so serialization stays
/// deterministic across builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookMetadata {
    pub novel_id: String,
    pub kakuyomu: bool,
    pub illustration: bool,
    pub tcy: bool,
    pub episodes: BTreeMap<String, EpisodeMetadata>,
}

impl BookMetadata {
    /// Sidecar for a single-episode archive. `unique_images` must already
    /// be deduplicated by [`crate::episode::dedup_images`].
    pub fn for_single_episode(
        novel_id: &str,
        episode: &Episode,
        unique_images: &[&ImageAsset],
        illustration: bool,
        tcy: bool,
    ) -> Self {
        let image_refs = unique_images
            .iter()
            .map(|image| ImageRef {
                id: image.id.clone(),
                name: image.name.clone(),
                media_type: image.media_type.clone(),
            })
            .collect();

        let mut episodes = BTreeMap::new();
        episodes.insert(
            episode.id.clone(),
            EpisodeMetadata {
                id: episode.id.clone(),
                title: episode.title.clone(),
                created_at: String::new(),
                updated_at: String::new(),
                images: image_refs,
            },
        );

        Self {
            novel_id: novel_id.to_string(),
            kakuyomu: false,
            illustration,
            tcy,
            episodes,
        }
    }
}
