/// A single byte range taken from an HTTP `Range` request header.
///
/// Only one range is supported; comma-separated multi-ranges count as
/// malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `start-end`, both inclusive.
    FromTo(i64, i64),
    /// `start-`, open-ended.
    From(i64),
    /// `-len`, the last `len` bytes.
    Suffix(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("malformed range header")]
    Malformed,
    #[error("range not satisfiable")]
    Unsatisfiable,
}

impl ByteRange {
    /// Parse a `bytes=...` header value. Wrong delimiter count or
    /// non-numeric components are malformed.
    pub fn parse(header: &str) -> Result<Self, RangeError> {
        let spec = header
            .trim()
            .strip_prefix("bytes=")
            .ok_or(RangeError::Malformed)?;

        let parts: Vec<&str> = spec.split('-').collect();
        let [start, end] = parts.as_slice() else {
            return Err(RangeError::Malformed);
        };

        match (start.is_empty(), end.is_empty()) {
            (true, true) => Err(RangeError::Malformed),
            (true, false) => Ok(Self::Suffix(parse_component(end)?)),
            (false, true) => Ok(Self::From(parse_component(start)?)),
            (false, false) => Ok(Self::FromTo(
                parse_component(start)?,
                parse_component(end)?,
            )),
        }
    }

    /// Resolve to inclusive `(start, end)` offsets within a file of
    /// `file_size` bytes. An overshooting `end` clamps to the last byte.
    pub fn resolve(self, file_size: u64) -> Result<(u64, u64), RangeError> {
        let size = i64::try_from(file_size).map_err(|_| RangeError::Unsatisfiable)?;

        let (start, end) = match self {
            Self::Suffix(len) => {
                if len <= 0 {
                    return Err(RangeError::Unsatisfiable);
                }
                ((size - len).max(0), size - 1)
            }
            Self::From(start) => (start, size - 1),
            Self::FromTo(start, end) => (start, end.min(size - 1)),
        };

        if start < 0 || end < 0 {
            return Err(RangeError::Unsatisfiable);
        }
        if start > end {
            return Err(RangeError::Unsatisfiable);
        }
        if start >= size {
            return Err(RangeError::Unsatisfiable);
        }

        Ok((start as u64, end as u64))
    }
}

fn parse_component(raw: &str) -> Result<i64, RangeError> {
    raw.trim().parse().map_err(|_| RangeError::Malformed)
}
