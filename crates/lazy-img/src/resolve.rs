//! URL resolution
//!
//! Image sources resolve against the document base, not against wherever
//! the element's own definition came from.

use url::Url;

/// Resolve `src` against the document base URL
pub fn resolve_src(src: &str, base: &Url) -> Result<Url, url::ParseError> {
    base.join(src.trim())
}
