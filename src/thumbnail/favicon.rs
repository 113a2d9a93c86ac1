/// Favicon fallback for bookmarks without a captured thumbnail

pub const DEFAULT_FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons";

/// Build the fallback image source for a page; the page URL is passed verbatim
pub fn favicon_url(service: &str, page_url: &str) -> String {
    format!("{}?domain={}", service, page_url)
}

/// Fallback sources are recognised by prefix so the UI knows to offer a capture
pub fn is_fallback(service: &str, src: &str) -> bool {
    src.starts_with(service)
}
