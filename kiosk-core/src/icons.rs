//! Memoized icon and background assets keyed by `(icon code, size)`.
//!
//! The cache is only ever populated from the composition step of a refresh
//! cycle. Lookups take `&mut self`, so that single-writer constraint is a
//! borrow rule rather than a lock; sharing a cache across threads would need
//! explicit synchronization.

use std::{
    collections::HashMap,
    fmt::Debug,
    path::{Path, PathBuf},
    sync::Arc,
};

use image::RgbaImage;
use tracing::{debug, warn};

use crate::error::{KioskError, KioskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconSize {
    /// Forecast cell icon.
    Small,
    /// Current conditions icon.
    Large,
    /// Full-screen background.
    Background,
}

impl IconSize {
    fn suffix(&self) -> &'static str {
        match self {
            IconSize::Small => "_t@2x",
            IconSize::Large => "_t@4x",
            IconSize::Background => "_bg",
        }
    }
}

/// Deterministic asset file name, e.g. `10n_t@2x.png`.
pub fn asset_file_name(code: &str, size: IconSize) -> String {
    format!("{code}{}.png", size.suffix())
}

/// Reads and decodes one asset file.
pub trait AssetLoader: Send + Debug {
    fn load(&self, path: &Path) -> KioskResult<RgbaImage>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsAssetLoader;

impl AssetLoader for FsAssetLoader {
    fn load(&self, path: &Path) -> KioskResult<RgbaImage> {
        if !path.exists() {
            return Err(KioskError::AssetMissing {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }

        image::open(path).map(|img| img.to_rgba8()).map_err(|e| KioskError::AssetMissing {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug)]
pub struct IconCache {
    root: PathBuf,
    loader: Box<dyn AssetLoader>,
    entries: HashMap<(String, IconSize), Arc<RgbaImage>>,
}

impl IconCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_loader(root, Box::new(FsAssetLoader))
    }

    pub fn with_loader(root: impl Into<PathBuf>, loader: Box<dyn AssetLoader>) -> Self {
        Self {
            root: root.into(),
            loader,
            entries: HashMap::new(),
        }
    }

    /// Cached image for the key, loading and decoding it on first use.
    ///
    /// `None` means "skip this visual element"; failures are logged and not
    /// remembered, so a key with no backing asset is simply absent every time.
    pub fn get_icon(&mut self, code: &str, size: IconSize) -> Option<Arc<RgbaImage>> {
        if code.is_empty() {
            return None;
        }

        let key = (code.to_string(), size);
        if let Some(hit) = self.entries.get(&key) {
            return Some(Arc::clone(hit));
        }

        let path = self.root.join(asset_file_name(code, size));
        match self.loader.load(&path) {
            Ok(img) => {
                debug!(path = %path.display(), "asset cached");
                let img = Arc::new(img);
                self.entries.insert(key, Arc::clone(&img));
                Some(img)
            }
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingLoader {
        loads: Arc<AtomicUsize>,
    }

    impl AssetLoader for CountingLoader {
        fn load(&self, path: &Path) -> KioskResult<RgbaImage> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if path.to_string_lossy().contains("missing") {
                return Err(KioskError::AssetMissing {
                    path: path.to_path_buf(),
                    reason: "file not found".into(),
                });
            }
            Ok(RgbaImage::new(4, 4))
        }
    }

    #[test]
    fn file_names_follow_size_suffix() {
        assert_eq!(asset_file_name("01d", IconSize::Small), "01d_t@2x.png");
        assert_eq!(asset_file_name("01d", IconSize::Large), "01d_t@4x.png");
        assert_eq!(asset_file_name("13n", IconSize::Background), "13n_bg.png");
    }

    #[test]
    fn second_lookup_reuses_decoded_image() {
        let loader = CountingLoader::default();
        let loads = Arc::clone(&loader.loads);
        let mut cache = IconCache::with_loader("assets", Box::new(loader));

        let first = cache.get_icon("01d", IconSize::Small).expect("asset present");
        let second = cache.get_icon("01d", IconSize::Small).expect("asset present");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn sizes_are_separate_keys() {
        let mut cache = IconCache::with_loader("assets", Box::new(CountingLoader::default()));
        cache.get_icon("01d", IconSize::Small);
        cache.get_icon("01d", IconSize::Large);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn missing_asset_is_absent_every_time() {
        let mut cache = IconCache::with_loader("assets", Box::new(CountingLoader::default()));
        assert!(cache.get_icon("missing", IconSize::Large).is_none());
        assert!(cache.get_icon("missing", IconSize::Large).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn empty_code_skips_loading() {
        let loader = CountingLoader::default();
        let loads = Arc::clone(&loader.loads);
        let mut cache = IconCache::with_loader("assets", Box::new(loader));

        assert!(cache.get_icon("", IconSize::Small).is_none());
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn filesystem_loader_reports_missing_file() {
        let mut cache = IconCache::new("/definitely/not/a/real/dir");
        assert!(cache.get_icon("01d", IconSize::Background).is_none());
    }
}
