//! Cursor pagination for Admin REST list endpoints.
//!
//! Every list response carries a `Link` header with the URLs of adjacent
//! pages; the cursor is the `page_info` query parameter of the `rel="next"`
//! URL. A response without a `next` relation is the last page.
//!
//! ```text
//! <https://shop.myshopify.com/admin/api/2024-01/products.json?limit=250&page_info=PREV>; rel="previous",
//! <https://shop.myshopify.com/admin/api/2024-01/products.json?limit=250&page_info=NEXT>; rel="next"
//! ```

/// Extracts the `page_info` cursor of the next page from a `Link` header.
///
/// Returns `None` when the header is absent, has no `rel="next"` segment,
/// or its next URL has no `page_info` parameter.
#[must_use]
pub fn extract_next_cursor(link_header: Option<&str>) -> Option<String> {
    let header = link_header?;

    header
        .split(',')
        .map(str::trim)
        .find(|segment| segment.contains(r#"rel="next""#))
        .and_then(angle_bracket_url)
        .and_then(|url| query_param(url, "page_info"))
}

fn angle_bracket_url(segment: &str) -> Option<&str> {
    let start = segment.find('<')? + 1;
    let end = segment.find('>')?;
    if start >= end {
        return None;
    }
    Some(&segment[start..end])
}

/// Cursors are base64url, so values are returned without percent-decoding.
fn query_param(url: &str, param: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    let needle = format!("{param}=");
    query
        .split('&')
        .filter_map(|pair| pair.strip_prefix(needle.as_str()))
        .map(|value| value.split('#').next().unwrap_or(value))
        .find(|value| !value.is_empty())
        .map(str::to_owned)
}
