/// Bookmark Deck - Chrome new tab page for browsing bookmarks as thumbnails
/// Built with Rust + WASM + Yew

pub mod bookmarks;
pub mod filter;
mod host;
pub mod navigation;
pub mod settings;
pub mod thumbnail;
pub mod ui;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Re-export the host shown under each card for JavaScript access
#[wasm_bindgen]
pub fn extract_host(url: &str) -> String {
    bookmarks::display_host(url).unwrap_or_default()
}

// Start the Yew app for the new tab page
#[wasm_bindgen]
pub fn start_new_tab() {
    yew::Renderer::<ui::newtab::NewTab>::new().render();
}

/// Thumbnail a freshly created bookmark from the tab the user is looking at.
/// Called by the background worker when a bookmark with a URL is created.
#[wasm_bindgen]
pub async fn on_bookmark_created(url: String) {
    let settings = host::load_settings().await;
    let pipeline = host::chrome_pipeline(settings.thumbnails);

    let raw = match host::capture_active_tab().await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            log::warn!("Active tab could not be captured for {}", url);
            return;
        }
        Err(e) => {
            log::error!("Failed to capture active tab for {}: {}", url, e);
            return;
        }
    };

    let outcome = pipeline.ingest(&url, &raw, |_, _| {}).await;
    if !outcome.is_success() {
        log::warn!("No thumbnail stored for new bookmark {}", url);
    }
}
