//! Gallery synchronizer.
//!
//! The local list is a cache of the server's: every refresh replaces it and
//! every delete is followed by a refresh. Entries are never patched locally.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::core::error::ClientError;
use crate::providers::JobBackend;
use crate::state::GalleryView;

#[derive(Debug, Default)]
struct GalleryCache {
    view: GalleryView,
    /// Sequence number handed to the most recently started refresh.
    issued: u64,
    /// Sequence number of the refresh whose result is on display.
    applied: u64,
}

pub struct GallerySynchronizer<B: JobBackend> {
    backend: Arc<B>,
    cache: Mutex<GalleryCache>,
}

impl<B: JobBackend> GallerySynchronizer<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            cache: Mutex::new(GalleryCache::default()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, GalleryCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn view(&self) -> GalleryView {
        self.cache().view.clone()
    }

    /// Fetches the full list and replaces the cache. A response older than the
    /// one already displayed is discarded, so the latest issued refresh wins.
    pub async fn refresh(&self) -> Result<GalleryView, ClientError> {
        let sequence = {
            let mut cache = self.cache();
            cache.issued += 1;
            cache.issued
        };

        let entries = self.backend.gallery().await?;

        let mut cache = self.cache();
        if sequence < cache.applied {
            debug!(sequence, applied = cache.applied, "dropping stale gallery refresh");
            return Ok(cache.view.clone());
        }
        cache.applied = sequence;
        cache.view = GalleryView::from_entries(entries);
        debug!(sequence, count = cache.view.entries().len(), "gallery refreshed");
        Ok(cache.view.clone())
    }

    /// Deletes on the server, then re-reads the authoritative list.
    pub async fn delete(&self, image_id: &str) -> Result<GalleryView, ClientError> {
        if let Err(err) = self.backend.delete_image(image_id).await {
            warn!(image_id, error = %err, "gallery delete failed");
            return Err(err);
        }
        info!(image_id, "gallery image deleted");
        self.refresh().await
    }
}
