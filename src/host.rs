/// Bridge to the chrome.* extension APIs via the /newtab.js module

use async_trait::async_trait;
use wasm_bindgen::prelude::*;

use crate::bookmarks::BookmarkNode;
use crate::settings::{SETTINGS_KEY, Settings};
use crate::thumbnail::compress::decode_data_url;
use crate::thumbnail::{
    CaptureSource, KeyValueStore, SurfaceHandle, ThumbnailConfig, ThumbnailError, ThumbnailPipeline, Timer,
};

// Import JS bridge functions
#[wasm_bindgen(module = "/newtab.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getBookmarkTree() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn updateBookmark(id: &str, title: &str, url: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn moveBookmark(id: &str, parent_id: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn removeBookmark(id: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn openInCurrentTab(url: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn openInNewTab(url: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn getLocal(key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setLocal(key: &str, value: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn removeLocal(key: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn getSync(key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setSync(key: &str, value: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn openCaptureWindow(url: &str, width: u32, height: u32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn waitForTabComplete(tab_id: i32) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn captureVisibleTab(window_id: i32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn captureActiveTab() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn closeWindow(window_id: i32) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, js_name = sleep)]
    async fn js_sleep(ms: u32) -> Result<(), JsValue>;

    fn prefersDark() -> bool;
}

fn host_error(e: JsValue) -> ThumbnailError {
    ThumbnailError::Host(format!("{:?}", e))
}

fn optional_string(value: JsValue) -> Option<String> {
    if value.is_null() || value.is_undefined() {
        None
    } else {
        value.as_string()
    }
}

fn bytes_from_data_url(value: JsValue) -> Result<Option<Vec<u8>>, ThumbnailError> {
    match optional_string(value) {
        Some(data_url) => decode_data_url(&data_url).map(|(_, bytes)| Some(bytes)),
        None => Ok(None),
    }
}

/// Popup windows opened through chrome.windows and snapshotted with captureVisibleTab
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChromeCaptureSource;

#[async_trait(?Send)]
impl CaptureSource for ChromeCaptureSource {
    async fn open_surface(&self, url: &str, width: u32, height: u32) -> Result<SurfaceHandle, ThumbnailError> {
        let handle_js = openCaptureWindow(url, width, height).await.map_err(host_error)?;
        serde_wasm_bindgen::from_value(handle_js)
            .map_err(|e| ThumbnailError::Host(format!("Failed to parse window handle: {:?}", e)))
    }

    async fn wait_for_load(&self, surface: &SurfaceHandle) -> Result<(), ThumbnailError> {
        waitForTabComplete(surface.tab_id).await.map_err(host_error)
    }

    async fn capture_visible(&self, surface: &SurfaceHandle) -> Result<Option<Vec<u8>>, ThumbnailError> {
        let data_url = captureVisibleTab(surface.window_id).await.map_err(host_error)?;
        bytes_from_data_url(data_url)
    }

    async fn close_surface(&self, surface: SurfaceHandle) -> Result<(), ThumbnailError> {
        closeWindow(surface.window_id).await.map_err(host_error)
    }
}

/// chrome.storage.local, one entry per bookmark URL
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChromeLocalStore;

#[async_trait(?Send)]
impl KeyValueStore for ChromeLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ThumbnailError> {
        let value = getLocal(key)
            .await
            .map_err(|e| ThumbnailError::Store(format!("{:?}", e)))?;
        Ok(optional_string(value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ThumbnailError> {
        setLocal(key, value)
            .await
            .map_err(|e| ThumbnailError::Store(format!("{:?}", e)))
    }

    async fn remove(&self, key: &str) -> Result<(), ThumbnailError> {
        removeLocal(key)
            .await
            .map_err(|e| ThumbnailError::Store(format!("{:?}", e)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BrowserTimer;

#[async_trait(?Send)]
impl Timer for BrowserTimer {
    async fn sleep(&self, ms: u32) {
        if let Err(e) = js_sleep(ms).await {
            log::warn!("Timer failed: {:?}", e);
        }
    }
}

pub type ChromePipeline = ThumbnailPipeline<ChromeCaptureSource, ChromeLocalStore, BrowserTimer>;

pub fn chrome_pipeline(config: ThumbnailConfig) -> ChromePipeline {
    ThumbnailPipeline::new(ChromeCaptureSource, ChromeLocalStore, BrowserTimer, config)
}

/// Raw bytes of whatever tab is active in the focused window
pub async fn capture_active_tab() -> Result<Option<Vec<u8>>, ThumbnailError> {
    let data_url = captureActiveTab().await.map_err(host_error)?;
    bytes_from_data_url(data_url)
}

pub fn system_prefers_dark() -> bool {
    prefersDark()
}

// Helper functions

pub async fn load_tree() -> Result<Vec<BookmarkNode>, String> {
    let tree_js = getBookmarkTree()
        .await
        .map_err(|e| format!("Failed to get bookmarks: {:?}", e))?;
    serde_wasm_bindgen::from_value(tree_js).map_err(|e| format!("Failed to parse bookmarks: {:?}", e))
}

pub async fn load_settings() -> Settings {
    match getSync(SETTINGS_KEY).await {
        Ok(value) => Settings::from_json(optional_string(value).as_deref()),
        Err(e) => {
            log::warn!("Failed to read settings: {:?}", e);
            Settings::new()
        }
    }
}

pub async fn save_settings(settings: &Settings) -> Result<(), String> {
    let json = settings.to_json()?;
    setSync(SETTINGS_KEY, &json)
        .await
        .map_err(|e| format!("Failed to save settings: {:?}", e))
}

pub async fn open_url(url: &str, new_tab: bool) -> Result<(), String> {
    let result = if new_tab {
        openInNewTab(url).await
    } else {
        openInCurrentTab(url).await
    };
    result.map_err(|e| format!("Failed to open {}: {:?}", url, e))
}

/// Requested changes from the edit dialog
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkEdit {
    pub title: String,
    pub url: String,
    /// Destination folder, when it differs from the current parent
    pub parent_id: Option<String>,
}

/// Apply an edit; a changed URL drops the thumbnail stored under the old one
pub async fn save_edit(original: &BookmarkNode, edit: &BookmarkEdit, pipeline: &ChromePipeline) -> Result<(), String> {
    let url = edit.url.trim();
    if url.is_empty() {
        return Err("URL cannot be empty".to_string());
    }

    updateBookmark(&original.id, edit.title.trim(), url)
        .await
        .map_err(|e| format!("Failed to update bookmark: {:?}", e))?;

    if let Some(parent_id) = edit
        .parent_id
        .as_deref()
        .filter(|parent| original.parent_id.as_deref() != Some(*parent))
    {
        moveBookmark(&original.id, parent_id)
            .await
            .map_err(|e| format!("Failed to move bookmark: {:?}", e))?;
    }

    if let Some(old_url) = original.url.as_deref().filter(|old| *old != url) {
        pipeline.delete(old_url).await;
    }

    log::info!("Updated bookmark {}", original.id);
    Ok(())
}

/// Remove a bookmark and then its thumbnail
pub async fn delete_bookmark(node: &BookmarkNode, pipeline: &ChromePipeline) -> Result<(), String> {
    removeBookmark(&node.id)
        .await
        .map_err(|e| format!("Failed to delete bookmark: {:?}", e))?;

    if let Some(url) = node.url.as_deref() {
        pipeline.delete(url).await;
    }

    log::info!("Deleted bookmark: {}", node.title);
    Ok(())
}
