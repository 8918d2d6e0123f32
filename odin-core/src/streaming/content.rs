//! Range-aware content serving with conditional request handling.

use std::io::SeekFrom;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::StreamingError;
use super::range::{RangeSpec, evaluate_range};

const CHUNK_SIZE: usize = 64 * 1024;

/// Serves `reader` as `name`, honoring `Range`, `If-Range` and
/// `If-Modified-Since`.
///
/// The content type is guessed from `name`. `Accept-Ranges: bytes` and
/// `Last-Modified` are always sent.
///
/// # Errors
///
/// - `StreamingError::Io` - Seeking to the range start failed
/// - `StreamingError::Response` - Response headers could not be assembled
pub async fn serve_content<R>(
    headers: &HeaderMap,
    name: &str,
    size: u64,
    modified: DateTime<Utc>,
    mut reader: R,
) -> Result<Response, StreamingError>
where
    R: AsyncRead + AsyncSeek + Send + Unpin + 'static,
{
    let last_modified = http_date(modified);

    if is_not_modified(headers, modified) {
        return build(
            Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .header(header::LAST_MODIFIED, &last_modified),
            Body::empty(),
        );
    }

    let content_type = mime_guess::from_path(name).first_or_octet_stream();
    let base = Response::builder()
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::LAST_MODIFIED, &last_modified);

    let spec = match headers.get(header::RANGE).and_then(|v| v.to_str().ok()) {
        Some(range) if range_applies(headers, modified) => evaluate_range(range, size),
        _ => RangeSpec::Full,
    };

    let (status, start, length, content_range) = match spec {
        RangeSpec::Unsatisfiable => {
            return build(
                base.status(StatusCode::RANGE_NOT_SATISFIABLE)
                    .header(header::CONTENT_RANGE, format!("bytes */{size}")),
                Body::empty(),
            );
        }
        RangeSpec::Full => (StatusCode::OK, 0, size, None),
        RangeSpec::Partial(range) => (
            StatusCode::PARTIAL_CONTENT,
            range.start,
            range.length(),
            Some(range.content_range(size)),
        ),
    };

    if start > 0 {
        reader.seek(SeekFrom::Start(start)).await?;
    }

    let mut builder = base
        .status(status)
        .header(header::CONTENT_LENGTH, length);
    if let Some(content_range) = content_range {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }

    let stream = ReaderStream::with_capacity(reader.take(length), CHUNK_SIZE);
    build(builder, Body::from_stream(stream))
}

fn build(builder: axum::http::response::Builder, body: Body) -> Result<Response, StreamingError> {
    builder.body(body).map_err(|e| StreamingError::Response {
        reason: e.to_string(),
    })
}

/// IMF-fixdate as used by HTTP date headers.
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn parse_http_date(value: &HeaderValue) -> Option<DateTime<Utc>> {
    let text = value.to_str().ok()?;
    DateTime::parse_from_rfc2822(text.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn is_not_modified(headers: &HeaderMap, modified: DateTime<Utc>) -> bool {
    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(parse_http_date)
        .is_some_and(|since| modified.timestamp() <= since.timestamp())
}

/// A `Range` is honored only when `If-Range` is absent or names the exact
/// current modification second. Entity tags never match.
fn range_applies(headers: &HeaderMap, modified: DateTime<Utc>) -> bool {
    match headers.get(header::IF_RANGE) {
        None => true,
        Some(value) => {
            parse_http_date(value).is_some_and(|date| date.timestamp() == modified.timestamp())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::{Duration, TimeZone};

    use super::*;

    fn sample() -> Vec<u8> {
        (0..1000u32).map(|i| (i % 251) as u8).collect()
    }

    fn modified() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    async fn serve(headers: HeaderMap) -> Response {
        let data = sample();
        let size = data.len() as u64;
        serve_content(&headers, "movie.mp4", size, modified(), Cursor::new(data))
            .await
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    fn with_header(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_full_response() {
        let response = serve(HeaderMap::new()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "1000");
        assert_eq!(
            response.headers()[header::LAST_MODIFIED],
            "Fri, 01 Mar 2024 12:00:00 GMT"
        );
        assert_eq!(body_bytes(response).await, sample());
    }

    #[tokio::test]
    async fn test_partial_response() {
        let response = serve(with_header(header::RANGE, "bytes=100-199")).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers()[header::CONTENT_RANGE],
            "bytes 100-199/1000"
        );
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
        assert_eq!(body_bytes(response).await, sample()[100..200].to_vec());
    }

    #[tokio::test]
    async fn test_suffix_range() {
        let response = serve(with_header(header::RANGE, "bytes=-10")).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(body_bytes(response).await, sample()[990..].to_vec());
    }

    #[tokio::test]
    async fn test_unsatisfiable_range() {
        let response = serve(with_header(header::RANGE, "bytes=5000-")).await;
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_multiple_ranges_serve_everything() {
        let response = serve(with_header(header::RANGE, "bytes=0-1,5-6")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await.len(), 1000);
    }

    #[tokio::test]
    async fn test_if_modified_since() {
        let fresh = serve(with_header(
            header::IF_MODIFIED_SINCE,
            &http_date(modified() + Duration::hours(1)),
        ))
        .await;
        assert_eq!(fresh.status(), StatusCode::NOT_MODIFIED);

        let stale = serve(with_header(
            header::IF_MODIFIED_SINCE,
            &http_date(modified() - Duration::hours(1)),
        ))
        .await;
        assert_eq!(stale.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_if_range_with_stale_date_drops_range() {
        let mut headers = with_header(header::RANGE, "bytes=0-9");
        headers.insert(
            header::IF_RANGE,
            HeaderValue::from_str(&http_date(modified() - Duration::days(1))).unwrap(),
        );
        let response = serve(headers).await;
        assert_eq!(response.status(), StatusCode::OK);

        let mut headers = with_header(header::RANGE, "bytes=0-9");
        headers.insert(
            header::IF_RANGE,
            HeaderValue::from_str(&http_date(modified())).unwrap(),
        );
        let response = serve(headers).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    }

    #[test]
    fn test_unknown_extension_is_octet_stream() {
        assert_eq!(
            mime_guess::from_path("blob.unknownext").first_or_octet_stream(),
            "application/octet-stream"
        );
    }
}
