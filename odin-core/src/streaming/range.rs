//! HTTP `Range` header evaluation (RFC 7233, single byte ranges).

/// Inclusive byte range within a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered, never zero.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a 206 response.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }
}

/// Outcome of evaluating a `Range` header against a resource size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// Serve the whole resource with 200
    Full,
    /// Serve one range with 206
    Partial(ByteRange),
    /// Answer 416 with `Content-Range: bytes */<total>`
    Unsatisfiable,
}

/// Evaluates `header` against a resource of `total` bytes.
///
/// Syntactically invalid headers and multi-range requests are ignored and
/// the full resource is served. End positions past the resource are clamped.
///
/// # Examples
/// ```
/// use odin_core::streaming::range::{ByteRange, RangeSpec, evaluate_range};
///
/// assert_eq!(
///     evaluate_range("bytes=100-199", 1000),
///     RangeSpec::Partial(ByteRange { start: 100, end: 199 })
/// );
/// assert_eq!(evaluate_range("bytes=1000-", 1000), RangeSpec::Unsatisfiable);
/// ```
pub fn evaluate_range(header: &str, total: u64) -> RangeSpec {
    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return RangeSpec::Full;
    };
    if spec.contains(',') {
        return RangeSpec::Full;
    }
    let Some((first, last)) = spec.trim().split_once('-') else {
        return RangeSpec::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // Suffix range: the final `last` bytes
        let Ok(suffix) = last.parse::<u64>() else {
            return RangeSpec::Full;
        };
        if suffix == 0 || total == 0 {
            return RangeSpec::Unsatisfiable;
        }
        return RangeSpec::Partial(ByteRange {
            start: total.saturating_sub(suffix),
            end: total - 1,
        });
    }

    let Ok(start) = first.parse::<u64>() else {
        return RangeSpec::Full;
    };
    let end = if last.is_empty() {
        None
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            _ => return RangeSpec::Full,
        }
    };

    if start >= total {
        return RangeSpec::Unsatisfiable;
    }

    let end = end.map_or(total - 1, |end| end.min(total - 1));
    RangeSpec::Partial(ByteRange { start, end })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn partial(start: u64, end: u64) -> RangeSpec {
        RangeSpec::Partial(ByteRange { start, end })
    }

    #[test]
    fn test_explicit_range() {
        assert_eq!(evaluate_range("bytes=100-199", 1000), partial(100, 199));
        assert_eq!(evaluate_range("bytes=0-0", 1000), partial(0, 0));
        assert_eq!(evaluate_range("bytes=900-5000", 1000), partial(900, 999));
    }

    #[test]
    fn test_open_and_suffix_ranges() {
        assert_eq!(evaluate_range("bytes=500-", 1000), partial(500, 999));
        assert_eq!(evaluate_range("bytes=-100", 1000), partial(900, 999));
        assert_eq!(evaluate_range("bytes=-5000", 1000), partial(0, 999));
    }

    #[test]
    fn test_unsatisfiable_ranges() {
        assert_eq!(evaluate_range("bytes=1000-", 1000), RangeSpec::Unsatisfiable);
        assert_eq!(evaluate_range("bytes=2000-3000", 1000), RangeSpec::Unsatisfiable);
        assert_eq!(evaluate_range("bytes=-0", 1000), RangeSpec::Unsatisfiable);
        assert_eq!(evaluate_range("bytes=0-", 0), RangeSpec::Unsatisfiable);
    }

    #[test]
    fn test_ignored_headers_serve_full_body() {
        for header in [
            "items=0-10",
            "bytes=abc-def",
            "bytes=200-100",
            "bytes=0-10,20-30",
            "bytes=",
            "bytes=10",
        ] {
            assert_eq!(evaluate_range(header, 1000), RangeSpec::Full, "{header}");
        }
    }

    #[test]
    fn test_content_range_value() {
        let range = ByteRange {
            start: 100,
            end: 199,
        };
        assert_eq!(range.length(), 100);
        assert_eq!(range.content_range(1000), "bytes 100-199/1000");
    }

    proptest! {
        #[test]
        fn satisfiable_ranges_stay_in_bounds(start in 0u64..5000, len in 0u64..5000, total in 1u64..4000) {
            let header = format!("bytes={start}-{}", start + len);
            match evaluate_range(&header, total) {
                RangeSpec::Partial(range) => {
                    prop_assert!(range.start <= range.end);
                    prop_assert!(range.end < total);
                    prop_assert_eq!(range.start, start);
                }
                RangeSpec::Unsatisfiable => prop_assert!(start >= total),
                RangeSpec::Full => prop_assert!(false, "well-formed range ignored"),
            }
        }
    }
}
