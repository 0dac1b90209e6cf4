use std::path::PathBuf;

/// Errors raised while turning an episode request into a cached archive.
///
/// Serving-time conditions (bad ranges, traversal attempts, missing files)
/// are not represented here; they map directly to HTTP status codes in
/// [`crate::serve`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The upstream site was unreachable or answered with a non-2xx status.
    #[error("fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The fetched markup was not in the expected shape.
    #[error("parse episode page: {0}")]
    Parse(String),

    /// The builder received malformed structured content.
    #[error("malformed episode content: {0}")]
    Format(String),

    /// Writing an archive entry failed.
    #[error("write archive entry {name}: {source}")]
    Archive {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the temp file or publishing the cache entry failed.
    #[error("cache I/O at {path}: {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn cache_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CacheIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
