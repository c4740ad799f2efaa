//! Cached mirror of the server gallery.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::resolve_url;

/// One persisted result as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub style: String,
}

impl GalleryEntry {
    pub fn resolved_url(&self, base: &Url) -> String {
        resolve_url(base, &self.url)
    }
}

/// What the UI should show for the gallery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "entries", rename_all = "snake_case")]
pub enum GalleryView {
    #[default]
    NotLoaded,
    /// The server holds no results; rendered as a placeholder.
    Empty,
    Entries(Vec<GalleryEntry>),
}

impl GalleryView {
    /// Server order is kept as-is.
    pub fn from_entries(entries: Vec<GalleryEntry>) -> Self {
        if entries.is_empty() {
            GalleryView::Empty
        } else {
            GalleryView::Entries(entries)
        }
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        match self {
            GalleryView::Entries(entries) => entries,
            _ => &[],
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries().iter().any(|entry| entry.id == id)
    }
}
