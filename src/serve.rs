use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use tokio::io::{AsyncReadExt as _, AsyncSeekExt as _};
use tokio_util::io::ReaderStream;

use crate::range::ByteRange;

/// Serve a file from `root`, honoring an optional single-byte-range
/// request.
///
/// Traversal outside the root answers 403 without touching the
/// filesystem; a missing file answers 404; an unsatisfiable or malformed
/// range answers 416. Partial responses stream only the requested span.
pub async fn serve_file(root: &Path, rel_path: &str, range_header: Option<&str>) -> Response {
    let Some(path) = resolve_under_root(root, rel_path) else {
        tracing::warn!(rel_path, "rejected path outside serving root");
        return status_only(StatusCode::FORBIDDEN);
    };

    let mut file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(_) => return status_only(StatusCode::NOT_FOUND),
    };
    let meta = match file.metadata().await {
        Ok(meta) if meta.is_file() => meta,
        _ => return status_only(StatusCode::NOT_FOUND),
    };
    let size = meta.len();
    let content_type = media_type_for(&path);

    let Some(raw_range) = range_header else {
        return full_response(file, size, meta.modified().ok(), content_type);
    };

    let span = ByteRange::parse(raw_range).and_then(|range| range.resolve(size));
    let (start, end) = match span {
        Ok(span) => span,
        Err(err) => {
            tracing::debug!(raw_range, %err, "range rejected");
            return status_only(StatusCode::RANGE_NOT_SATISFIABLE);
        }
    };

    if let Err(err) = file.seek(SeekFrom::Start(start)).await {
        tracing::error!(path = %path.display(), %err, "seek failed");
        return status_only(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let len = end - start + 1;
    let stream = ReaderStream::new(file.take(len));

    let mut resp = Response::new(Body::from_stream(stream));
    *resp.status_mut() = StatusCode::PARTIAL_CONTENT;
    let headers = resp.headers_mut();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(value) = HeaderValue::from_str(&format!("bytes {start}-{end}/{size}")) {
        headers.insert(header::CONTENT_RANGE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    resp
}

fn full_response(
    file: tokio::fs::File,
    size: u64,
    modified: Option<SystemTime>,
    content_type: &'static str,
) -> Response {
    let mut resp = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = resp.headers_mut();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(value) = HeaderValue::from_str(&size.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    if let Some(value) = modified
        .map(http_date)
        .and_then(|date| HeaderValue::from_str(&date).ok())
    {
        headers.insert(header::LAST_MODIFIED, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    resp
}

fn status_only(status: StatusCode) -> Response {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = status;
    resp
}

/// Lexical containment check: the path is resolved segment by segment and
/// any `..` is rejected outright, so nothing outside the root is ever
/// opened or stat'ed.
fn resolve_under_root(root: &Path, rel_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in rel_path.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." || segment.contains('\\') {
            return None;
        }
        path.push(segment);
    }
    if path == root {
        return None;
    }
    Some(path)
}

fn http_date(time: SystemTime) -> String {
    chrono::DateTime::<chrono::Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Media type from the file extension alone; no content sniffing.
fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "epub" => "application/epub+zip",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
