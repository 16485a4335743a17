//! File and directory naming for downloaded artifacts.

use std::path::{Component, Path};

use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use tracing::debug;
use url::Url;

/// Picks the file name for a response: Content-Disposition first, then the
/// last URL path segment, then `download.bin`.
#[must_use]
pub fn response_filename(headers: &HeaderMap, url: &str) -> String {
    if let Some(value) = headers.get(CONTENT_DISPOSITION)
        && let Ok(value) = value.to_str()
        && let Some(name) = parse_content_disposition(value)
    {
        return sanitize_filename(&name);
    }

    if let Ok(parsed) = Url::parse(url)
        && let Some(mut segments) = parsed.path_segments()
        && let Some(last) = segments.next_back()
        && !last.is_empty()
    {
        let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
            debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
            last.into()
        });
        return sanitize_filename(&decoded);
    }

    "download.bin".to_string()
}

/// Parses a Content-Disposition header value for its file name.
///
/// Handles:
/// - `attachment; filename="example.torrent"`
/// - `attachment; filename=example.torrent`
/// - `attachment; filename*=UTF-8''example%20file.torrent` (RFC 5987)
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            if let Ok(decoded) = urlencoding::decode(encoded[..end].trim()) {
                return Some(decoded.into_owned());
            }
        }
    }

    if let Some(pos) = header.find("filename=") {
        let value = header[pos + 9..].trim();
        if let Some(stripped) = value.strip_prefix('"') {
            if let Some(end) = stripped.find('"') {
                let name = &stripped[..end];
                let decoded = urlencoding::decode(name).map_or_else(|_| name.to_string(), |d| d.into_owned());
                return Some(decoded);
            }
        } else {
            let end = value.find(';').unwrap_or(value.len());
            let name = value[..end].trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }

    None
}

/// Replaces characters that are invalid on common filesystems.
///
/// The result is a single path segment: separators become `_` and bare dot
/// segments have their dots replaced.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

fn is_safe_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Output name template handed to the external tool.
///
/// `[<site>] [<tag>] [%(channel)s] %(title)s [%(id)s].%(ext)s`; the tag is
/// omitted in index mode.
#[must_use]
pub fn external_name_template(site: &str, tag: Option<&str>) -> String {
    let site = sanitize_filename(site);
    match tag {
        Some(tag) => format!(
            "[{site}] [{}] [%(channel)s] %(title)s [%(id)s].%(ext)s",
            sanitize_filename(tag)
        ),
        None => format!("[{site}] [%(channel)s] %(title)s [%(id)s].%(ext)s"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    // ==================== Content-Disposition ====================

    #[test]
    fn test_parse_content_disposition_quoted() {
        let header = r#"attachment; filename="Film (2001) [1080p] [YTS.MX].torrent""#;
        assert_eq!(
            parse_content_disposition(header).as_deref(),
            Some("Film (2001) [1080p] [YTS.MX].torrent")
        );
    }

    #[test]
    fn test_parse_content_disposition_unquoted_with_params() {
        let header = "attachment; filename=example.torrent; size=1234";
        assert_eq!(parse_content_disposition(header).as_deref(), Some("example.torrent"));
    }

    #[test]
    fn test_parse_content_disposition_rfc5987() {
        let header = "attachment; filename*=UTF-8''Film%20%282001%29.torrent";
        assert_eq!(parse_content_disposition(header).as_deref(), Some("Film (2001).torrent"));
    }

    #[test]
    fn test_parse_content_disposition_missing() {
        assert_eq!(parse_content_disposition("inline"), None);
    }

    // ==================== Response Naming ====================

    #[test]
    fn test_response_filename_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"a.torrent\""),
        );
        assert_eq!(response_filename(&headers, "https://x.example/dl/123"), "a.torrent");
    }

    #[test]
    fn test_response_filename_falls_back_to_url() {
        let headers = HeaderMap::new();
        assert_eq!(
            response_filename(&headers, "https://x.example/files/My%20Clip.mp4"),
            "My Clip.mp4"
        );
        assert_eq!(response_filename(&headers, "https://x.example/"), "download.bin");
    }

    // ==================== Sanitizing ====================

    #[test]
    fn test_sanitize_filename_removes_separators() {
        assert_eq!(sanitize_filename("a/b\\c:d.mp4"), "a_b_c_d.mp4");
        assert_eq!(sanitize_filename(".."), "__");
        assert_eq!(sanitize_filename(""), "_");
        assert_eq!(sanitize_filename("Film (2001) [1080p]"), "Film (2001) [1080p]");
    }

    #[test]
    fn test_external_name_template() {
        assert_eq!(
            external_name_template("Tube", Some("cats")),
            "[Tube] [cats] [%(channel)s] %(title)s [%(id)s].%(ext)s"
        );
        assert_eq!(
            external_name_template("Tube", None),
            "[Tube] [%(channel)s] %(title)s [%(id)s].%(ext)s"
        );
    }
}
