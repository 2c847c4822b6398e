//! Storefront deep links

use url::Url;

/// Builds `{store_url}/products/{handle}`.
///
/// Returns `None` when either part is missing or the result would not be a valid http(s) URL.
pub fn product_url(store_url: Option<&str>, handle: Option<&str>) -> Option<String> {
    let store_url = store_url.map(str::trim).filter(|s| !s.is_empty())?;
    let handle = handle.map(str::trim).filter(|h| !h.is_empty())?;

    let mut base = Url::parse(store_url).ok()?;
    if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
        return None;
    }

    base.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(["products", handle]);

    Some(base.into())
}
