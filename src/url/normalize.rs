use crate::UrlError;
use url::Url;

/// Canonicalizes a URL so trivially different spellings share one frontier key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed. Parsing lowercases the host of web
///    URLs and drops default ports (80 for http, 443 for https).
/// 2. Remove the fragment (everything after #)
/// 3. Remove an empty query string (trailing ?)
///
/// Paths are left alone: a trailing slash distinguishes a directory listing
/// from a file on the hosts we crawl.
///
/// # Examples
///
/// ```
/// use exam_crawler::url::canonicalize;
///
/// let url = canonicalize("https://Example.com:443/x#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/x");
/// ```
pub fn canonicalize(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|source| UrlError::Parse {
        url: url_str.to_string(),
        source,
    })?;
    strip_noise(&mut url);
    Ok(url)
}

/// Applies the same cleanup to an already parsed URL
pub fn strip_noise(url: &mut Url) {
    url.set_fragment(None);
    if url.query() == Some("") {
        url.set_query(None);
    }
}
