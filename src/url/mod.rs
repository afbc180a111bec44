//! URL handling module
//!
//! This module provides URL canonicalization, ancestor expansion, and the
//! crawl eligibility check.

mod expand;
mod normalize;
mod validate;

pub use expand::expand_url;
pub use normalize::{canonicalize, strip_noise};
pub use validate::Validator;

use url::Url;

/// Last path segment of a URL, used to name uploaded blobs
///
/// Returns `None` for directory URLs and the host root.
pub fn basename(url: &Url) -> Option<&str> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
}
