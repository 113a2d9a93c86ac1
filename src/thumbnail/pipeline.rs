/// Screenshot capture, size-bounded re-encoding, and the URL-keyed thumbnail cache

use std::future::Future;
use std::pin::pin;

use async_trait::async_trait;
use futures::future::{self, AbortHandle, AbortRegistration, Abortable, Either};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::compress::{CompressionPolicy, JPEG_MIME, JpegCanvas, compress, to_data_url};
use super::error::ThumbnailError;
use super::favicon::{DEFAULT_FAVICON_SERVICE, favicon_url, is_fallback};

/// Thumbnail capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Capture surface and output canvas width
    pub width: u32,
    pub height: u32,
    /// Delay between load completion and capture, for late painting content
    pub settle_delay_ms: u32,
    /// `None` waits for load completion forever
    pub load_timeout_ms: Option<u32>,
    pub favicon_service: String,
    pub compression: CompressionPolicy,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        ThumbnailConfig {
            width: 1024,
            height: 683,
            settle_delay_ms: 1000,
            load_timeout_ms: Some(30_000),
            favicon_service: DEFAULT_FAVICON_SERVICE.to_string(),
            compression: CompressionPolicy::default(),
        }
    }
}

/// An auxiliary browsing surface opened for a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceHandle {
    pub window_id: i32,
    pub tab_id: i32,
}

/// Host facility that renders a URL in a visible surface and snapshots it
#[async_trait(?Send)]
pub trait CaptureSource {
    async fn open_surface(&self, url: &str, width: u32, height: u32) -> Result<SurfaceHandle, ThumbnailError>;

    /// Resolves once the surface reports page-load completion
    async fn wait_for_load(&self, surface: &SurfaceHandle) -> Result<(), ThumbnailError>;

    /// Raw image bytes of the visible area, `None` when the host produced nothing
    async fn capture_visible(&self, surface: &SurfaceHandle) -> Result<Option<Vec<u8>>, ThumbnailError>;

    async fn close_surface(&self, surface: SurfaceHandle) -> Result<(), ThumbnailError>;
}

/// Durable async string store
#[async_trait(?Send)]
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ThumbnailError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), ThumbnailError>;
    async fn remove(&self, key: &str) -> Result<(), ThumbnailError>;
}

#[async_trait(?Send)]
pub trait Timer {
    async fn sleep(&self, ms: u32);
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Data URL of the stored thumbnail
    Captured(String),
    Failed(ThumbnailError),
}

impl CaptureOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CaptureOutcome::Captured(_))
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            CaptureOutcome::Captured(payload) => Some(payload),
            CaptureOutcome::Failed(_) => None,
        }
    }

    pub fn into_parts(self) -> (bool, Option<String>) {
        match self {
            CaptureOutcome::Captured(payload) => (true, Some(payload)),
            CaptureOutcome::Failed(_) => (false, None),
        }
    }
}

#[derive(Clone)]
pub struct ThumbnailPipeline<C, S, T> {
    source: C,
    store: S,
    timer: T,
    config: ThumbnailConfig,
}

impl<C, S, T> ThumbnailPipeline<C, S, T>
where
    C: CaptureSource,
    S: KeyValueStore,
    T: Timer,
{
    pub fn new(source: C, store: S, timer: T, config: ThumbnailConfig) -> Self {
        ThumbnailPipeline {
            source,
            store,
            timer,
            config,
        }
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Capture `url`, persist the compressed result, then hand it to `on_update`
    pub async fn capture<F>(&self, url: &str, title: &str, on_update: F) -> CaptureOutcome
    where
        F: FnOnce(&str, &str),
    {
        let (_handle, registration) = AbortHandle::new_pair();
        self.capture_with_abort(url, title, on_update, registration).await
    }

    /// Like [`capture`](Self::capture), but the load, settle, and capture waits
    /// stop when the paired `AbortHandle` fires. The surface is closed either way.
    pub async fn capture_with_abort<F>(
        &self,
        url: &str,
        title: &str,
        on_update: F,
        registration: AbortRegistration,
    ) -> CaptureOutcome
    where
        F: FnOnce(&str, &str),
    {
        if url.is_empty() {
            warn!("Refusing to capture thumbnail for '{}': URL is empty", title);
            return CaptureOutcome::Failed(ThumbnailError::InvalidUrl);
        }

        let capture_id = Uuid::new_v4();
        info!("[{}] Capturing thumbnail for '{}' ({})", capture_id, title, url);

        let opening = self.source.open_surface(url, self.config.width, self.config.height);
        let surface = match self.within_load_timeout(opening).await {
            Ok(surface) => surface,
            Err(e) => {
                error!("[{}] Failed to open capture surface: {}", capture_id, e);
                return CaptureOutcome::Failed(e);
            }
        };

        let grabbed = Abortable::new(self.grab(url, &surface), registration).await;

        if let Err(e) = self.source.close_surface(surface).await {
            warn!("[{}] Failed to close capture surface: {}", capture_id, e);
        }

        let raw = match grabbed {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                error!("[{}] Capture failed: {}", capture_id, e);
                return CaptureOutcome::Failed(e);
            }
            Err(_aborted) => {
                info!("[{}] Capture cancelled", capture_id);
                return CaptureOutcome::Failed(ThumbnailError::Cancelled);
            }
        };

        debug!("[{}] Captured {} raw bytes", capture_id, raw.len());
        self.ingest(url, &raw, on_update).await
    }

    async fn grab(&self, url: &str, surface: &SurfaceHandle) -> Result<Vec<u8>, ThumbnailError> {
        self.wait_for_load(surface).await?;
        self.timer.sleep(self.config.settle_delay_ms).await;

        self.source
            .capture_visible(surface)
            .await?
            .ok_or_else(|| ThumbnailError::CaptureFailed(url.to_string()))
    }

    async fn wait_for_load(&self, surface: &SurfaceHandle) -> Result<(), ThumbnailError> {
        self.within_load_timeout(self.source.wait_for_load(surface)).await
    }

    /// Race `work` against `load_timeout_ms`; opening the surface and loading the
    /// page are each bounded by it
    async fn within_load_timeout<R, F>(&self, work: F) -> Result<R, ThumbnailError>
    where
        F: Future<Output = Result<R, ThumbnailError>>,
    {
        let Some(timeout_ms) = self.config.load_timeout_ms else {
            return work.await;
        };

        let deadline = self.timer.sleep(timeout_ms);
        match future::select(pin!(work), deadline).await {
            Either::Left((done, _)) => done,
            Either::Right(_) => Err(ThumbnailError::LoadTimedOut(timeout_ms)),
        }
    }

    /// Compress raw capture bytes, persist them under `url`, and notify the caller.
    /// A failed store write is logged; the caller is still notified.
    pub async fn ingest<F>(&self, url: &str, raw: &[u8], on_update: F) -> CaptureOutcome
    where
        F: FnOnce(&str, &str),
    {
        if url.is_empty() {
            return CaptureOutcome::Failed(ThumbnailError::InvalidUrl);
        }

        let policy = self.config.compression;
        let compressed = JpegCanvas::from_capture(raw, self.config.width, self.config.height)
            .and_then(|canvas| compress(&canvas, &policy));

        let compressed = match compressed {
            Ok(compressed) => compressed,
            Err(e) => {
                error!("Failed to compress thumbnail for {}: {}", url, e);
                return CaptureOutcome::Failed(e);
            }
        };

        info!(
            "Compressed thumbnail for {} to {} bytes at quality {} ({:?} after {} attempts)",
            url,
            compressed.bytes.len(),
            compressed.quality,
            compressed.reason,
            compressed.attempts
        );

        let payload = to_data_url(&compressed.bytes, JPEG_MIME);

        if let Err(e) = self.store.set(url, &payload).await {
            error!("Failed to store thumbnail for {}: {}", url, e);
        }

        on_update(url, &payload);
        CaptureOutcome::Captured(payload)
    }

    /// Stored thumbnail for `url`, or the favicon fallback on a miss or store error
    pub async fn display_url(&self, url: &str) -> String {
        match self.store.get(url).await {
            Ok(Some(payload)) => payload,
            Ok(None) => self.fallback_url(url),
            Err(e) => {
                warn!("Thumbnail lookup failed for {}: {}", url, e);
                self.fallback_url(url)
            }
        }
    }

    /// Remove the stored thumbnail; missing keys and store errors are not reported
    pub async fn delete(&self, url: &str) {
        if let Err(e) = self.store.remove(url).await {
            warn!("Failed to remove thumbnail for {}: {}", url, e);
        }
    }

    pub fn fallback_url(&self, url: &str) -> String {
        favicon_url(&self.config.favicon_service, url)
    }

    pub fn is_fallback(&self, src: &str) -> bool {
        is_fallback(&self.config.favicon_service, src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, VecDeque};

    #[derive(Default)]
    struct MemoryStore {
        entries: RefCell<HashMap<String, String>>,
        fail_reads: bool,
        fail_writes: bool,
        fail_removes: bool,
        writes: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl KeyValueStore for MemoryStore {
        async fn get(&self, key: &str) -> Result<Option<String>, ThumbnailError> {
            if self.fail_reads {
                return Err(ThumbnailError::Store("read failed".to_string()));
            }
            Ok(self.entries.borrow().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), ThumbnailError> {
            self.writes.set(self.writes.get() + 1);
            if self.fail_writes {
                return Err(ThumbnailError::Store("quota exceeded".to_string()));
            }
            self.entries.borrow_mut().insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<(), ThumbnailError> {
            if self.fail_removes {
                return Err(ThumbnailError::Store("remove failed".to_string()));
            }
            self.entries.borrow_mut().remove(key);
            Ok(())
        }
    }

    #[derive(Default)]
    struct ScriptedSource {
        captures: RefCell<VecDeque<Option<Vec<u8>>>>,
        never_loads: bool,
        fail_open: bool,
        never_opens: bool,
        opened: RefCell<Vec<(String, u32, u32)>>,
        closed: Cell<usize>,
    }

    impl ScriptedSource {
        fn yielding(captures: Vec<Option<Vec<u8>>>) -> Self {
            ScriptedSource {
                captures: RefCell::new(captures.into()),
                ..ScriptedSource::default()
            }
        }
    }

    #[async_trait(?Send)]
    impl CaptureSource for ScriptedSource {
        async fn open_surface(&self, url: &str, width: u32, height: u32) -> Result<SurfaceHandle, ThumbnailError> {
            self.opened.borrow_mut().push((url.to_string(), width, height));
            if self.fail_open {
                return Err(ThumbnailError::Host("window creation blocked".to_string()));
            }
            if self.never_opens {
                future::pending::<()>().await;
            }
            Ok(SurfaceHandle {
                window_id: 7,
                tab_id: 70,
            })
        }

        async fn wait_for_load(&self, _surface: &SurfaceHandle) -> Result<(), ThumbnailError> {
            if self.never_loads {
                future::pending::<()>().await;
            }
            Ok(())
        }

        async fn capture_visible(&self, _surface: &SurfaceHandle) -> Result<Option<Vec<u8>>, ThumbnailError> {
            Ok(self.captures.borrow_mut().pop_front().flatten())
        }

        async fn close_surface(&self, _surface: SurfaceHandle) -> Result<(), ThumbnailError> {
            self.closed.set(self.closed.get() + 1);
            Ok(())
        }
    }

    #[derive(Default)]
    struct InstantTimer {
        slept: RefCell<Vec<u32>>,
    }

    #[async_trait(?Send)]
    impl Timer for InstantTimer {
        async fn sleep(&self, ms: u32) {
            self.slept.borrow_mut().push(ms);
        }
    }

    type TestPipeline = ThumbnailPipeline<ScriptedSource, MemoryStore, InstantTimer>;

    fn pipeline(source: ScriptedSource, store: MemoryStore) -> TestPipeline {
        ThumbnailPipeline::new(source, store, InstantTimer::default(), ThumbnailConfig::default())
    }

    fn png_capture(shade: u8) -> Vec<u8> {
        let image = RgbImage::from_pixel(64, 43, Rgb([shade, 128, 255 - shade]));
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(image.as_raw(), 64, 43, ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    #[test]
    fn test_capture_stores_and_notifies() {
        let pipeline = pipeline(
            ScriptedSource::yielding(vec![Some(png_capture(10))]),
            MemoryStore::default(),
        );
        let notified = RefCell::new(None);

        let outcome = block_on(pipeline.capture("https://example.com", "Example", |url, payload| {
            *notified.borrow_mut() = Some((url.to_string(), payload.to_string()));
        }));

        let payload = outcome.payload().unwrap().to_string();
        assert!(payload.starts_with("data:image/jpeg;base64,"));
        assert_eq!(
            pipeline.store.entries.borrow().get("https://example.com"),
            Some(&payload)
        );
        assert_eq!(
            notified.into_inner(),
            Some(("https://example.com".to_string(), payload))
        );
        assert_eq!(
            *pipeline.source.opened.borrow(),
            vec![("https://example.com".to_string(), 1024, 683)]
        );
        assert_eq!(pipeline.source.closed.get(), 1);
        assert_eq!(*pipeline.timer.slept.borrow(), vec![1000]);
    }

    #[test]
    fn test_capture_empty_url_has_no_side_effects() {
        let pipeline = pipeline(
            ScriptedSource::yielding(vec![Some(png_capture(10))]),
            MemoryStore::default(),
        );
        let called = Cell::new(false);

        let outcome = block_on(pipeline.capture("", "Untitled", |_, _| called.set(true)));

        assert_eq!(outcome, CaptureOutcome::Failed(ThumbnailError::InvalidUrl));
        assert_eq!(outcome.into_parts(), (false, None));
        assert!(pipeline.source.opened.borrow().is_empty());
        assert_eq!(pipeline.store.writes.get(), 0);
        assert!(!called.get());
    }

    #[test]
    fn test_capture_without_image_data_keeps_fallback() {
        let pipeline = pipeline(ScriptedSource::yielding(vec![None]), MemoryStore::default());
        let called = Cell::new(false);

        let outcome = block_on(pipeline.capture("https://example.com", "Example", |_, _| called.set(true)));

        assert_eq!(
            outcome,
            CaptureOutcome::Failed(ThumbnailError::CaptureFailed("https://example.com".to_string()))
        );
        assert!(!called.get());
        assert_eq!(pipeline.source.closed.get(), 1);
        assert_eq!(
            block_on(pipeline.display_url("https://example.com")),
            "https://www.google.com/s2/favicons?domain=https://example.com"
        );
    }

    #[test]
    fn test_capture_times_out_when_page_never_loads() {
        let source = ScriptedSource {
            never_loads: true,
            ..ScriptedSource::yielding(vec![Some(png_capture(10))])
        };
        let pipeline = pipeline(source, MemoryStore::default());

        let outcome = block_on(pipeline.capture("https://slow.example", "Slow", |_, _| {}));

        assert_eq!(outcome, CaptureOutcome::Failed(ThumbnailError::LoadTimedOut(30_000)));
        assert_eq!(pipeline.source.closed.get(), 1);
        assert_eq!(pipeline.store.writes.get(), 0);
    }

    #[test]
    fn test_capture_open_failure_skips_close() {
        let source = ScriptedSource {
            fail_open: true,
            ..ScriptedSource::yielding(vec![Some(png_capture(10))])
        };
        let pipeline = pipeline(source, MemoryStore::default());
        let called = Cell::new(false);

        let outcome = block_on(pipeline.capture("javascript:void(0)", "Bookmarklet", |_, _| called.set(true)));

        assert!(matches!(outcome, CaptureOutcome::Failed(ThumbnailError::Host(_))));
        assert_eq!(pipeline.source.closed.get(), 0);
        assert_eq!(pipeline.store.writes.get(), 0);
        assert!(!called.get());
    }

    #[test]
    fn test_capture_times_out_when_surface_never_opens() {
        let source = ScriptedSource {
            never_opens: true,
            ..ScriptedSource::yielding(vec![Some(png_capture(10))])
        };
        let pipeline = pipeline(source, MemoryStore::default());

        let outcome = block_on(pipeline.capture("https://blocked.example", "Blocked", |_, _| {}));

        assert_eq!(outcome, CaptureOutcome::Failed(ThumbnailError::LoadTimedOut(30_000)));
        assert_eq!(pipeline.source.closed.get(), 0);
        assert_eq!(pipeline.store.writes.get(), 0);
    }

    #[test]
    fn test_capture_abort_closes_surface() {
        let pipeline = pipeline(
            ScriptedSource::yielding(vec![Some(png_capture(10))]),
            MemoryStore::default(),
        );
        let (handle, registration) = AbortHandle::new_pair();
        handle.abort();

        let outcome = block_on(pipeline.capture_with_abort("https://example.com", "Example", |_, _| {}, registration));

        assert_eq!(outcome, CaptureOutcome::Failed(ThumbnailError::Cancelled));
        assert_eq!(pipeline.source.opened.borrow().len(), 1);
        assert_eq!(pipeline.source.closed.get(), 1);
        assert_eq!(pipeline.store.writes.get(), 0);
    }

    #[test]
    fn test_store_failure_still_notifies() {
        let store = MemoryStore {
            fail_writes: true,
            ..MemoryStore::default()
        };
        let pipeline = pipeline(ScriptedSource::yielding(vec![Some(png_capture(10))]), store);
        let called = Cell::new(false);

        let outcome = block_on(pipeline.capture("https://example.com", "Example", |_, _| called.set(true)));

        assert!(outcome.is_success());
        assert!(called.get());
        assert!(pipeline.store.entries.borrow().is_empty());
    }

    #[test]
    fn test_undecodable_capture_fails() {
        let pipeline = pipeline(
            ScriptedSource::yielding(vec![Some(b"garbage".to_vec())]),
            MemoryStore::default(),
        );

        let outcome = block_on(pipeline.capture("https://example.com", "Example", |_, _| {}));

        assert!(matches!(outcome, CaptureOutcome::Failed(ThumbnailError::Decode(_))));
        assert_eq!(pipeline.store.writes.get(), 0);
    }

    #[test]
    fn test_sequential_captures_last_write_wins() {
        let pipeline = pipeline(
            ScriptedSource::yielding(vec![Some(png_capture(10)), Some(png_capture(200))]),
            MemoryStore::default(),
        );

        let first = block_on(pipeline.capture("https://example.com", "Example", |_, _| {}));
        let second = block_on(pipeline.capture("https://example.com", "Example", |_, _| {}));

        assert_ne!(first.payload(), second.payload());
        assert_eq!(
            pipeline.store.entries.borrow().get("https://example.com").map(String::as_str),
            second.payload()
        );
    }

    #[test]
    fn test_display_url_round_trip() {
        let pipeline = pipeline(ScriptedSource::default(), MemoryStore::default());
        pipeline
            .store
            .entries
            .borrow_mut()
            .insert("https://example.com".to_string(), "data:image/jpeg;base64,AAAA".to_string());

        assert_eq!(
            block_on(pipeline.display_url("https://example.com")),
            "data:image/jpeg;base64,AAAA"
        );
    }

    #[test]
    fn test_display_url_missing_returns_fallback() {
        let pipeline = pipeline(ScriptedSource::default(), MemoryStore::default());
        let src = block_on(pipeline.display_url("https://missing.example"));

        assert_eq!(src, "https://www.google.com/s2/favicons?domain=https://missing.example");
        assert!(pipeline.is_fallback(&src));
    }

    #[test]
    fn test_display_url_store_error_returns_fallback() {
        let store = MemoryStore {
            fail_reads: true,
            ..MemoryStore::default()
        };
        let pipeline = pipeline(ScriptedSource::default(), store);

        assert!(pipeline.is_fallback(&block_on(pipeline.display_url("https://example.com"))));
    }

    #[test]
    fn test_delete_removes_and_is_idempotent() {
        let pipeline = pipeline(
            ScriptedSource::yielding(vec![Some(png_capture(10))]),
            MemoryStore::default(),
        );
        block_on(pipeline.capture("https://example.com", "Example", |_, _| {}));

        block_on(pipeline.delete("https://example.com"));
        block_on(pipeline.delete("https://example.com"));

        assert!(pipeline.is_fallback(&block_on(pipeline.display_url("https://example.com"))));
    }

    #[test]
    fn test_delete_store_error_is_absorbed() {
        let store = MemoryStore {
            fail_removes: true,
            ..MemoryStore::default()
        };
        store
            .entries
            .borrow_mut()
            .insert("https://example.com".to_string(), "data:image/jpeg;base64,AAAA".to_string());
        let pipeline = pipeline(ScriptedSource::default(), store);

        block_on(pipeline.delete("https://example.com"));

        assert_eq!(
            block_on(pipeline.display_url("https://example.com")),
            "data:image/jpeg;base64,AAAA"
        );
    }

    #[test]
    fn test_ingest_skips_surface() {
        let pipeline = pipeline(ScriptedSource::default(), MemoryStore::default());

        let outcome = block_on(pipeline.ingest("https://example.com", &png_capture(90), |_, _| {}));

        assert!(outcome.is_success());
        assert!(pipeline.source.opened.borrow().is_empty());
        assert_eq!(pipeline.store.writes.get(), 1);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ThumbnailConfig = serde_json::from_str(r#"{"settle_delay_ms": 250}"#).unwrap();
        assert_eq!(config.settle_delay_ms, 250);
        assert_eq!(config.width, 1024);
        assert_eq!(config.load_timeout_ms, Some(30_000));
        assert_eq!(config.compression, CompressionPolicy::default());
    }
}
