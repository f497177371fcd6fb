//! Resolves a document identifier to its stored raw blob

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::BlobStore;
use crate::types::document::key_extension;
use crate::types::{BlobRef, StorageLayout};

/// Extensions preferred when several raw blobs share an identifier
const PRIORITY_EXTENSIONS: [&str; 3] = [".pdf", ".docx", ".txt"];

/// Finds `raw/{id}{ext}` when the extension is not known
pub struct DocumentLocator {
    store: Arc<dyn BlobStore>,
    layout: StorageLayout,
}

impl DocumentLocator {
    pub fn new(store: Arc<dyn BlobStore>, layout: StorageLayout) -> Self {
        Self { store, layout }
    }

    /// Locate the raw blob for `id`; `Error::DocumentNotFound` when none exists
    pub async fn locate(&self, id: &str) -> Result<BlobRef> {
        let prefix = self.layout.raw_search_prefix(id);
        let mut candidates: Vec<String> = self
            .store
            .list(&prefix)
            .await?
            .into_iter()
            .filter(|key| is_exact_stem(key, &prefix))
            .collect();
        candidates.sort();

        let key = select(&candidates).ok_or_else(|| Error::not_found(id))?;
        if candidates.len() > 1 {
            tracing::debug!("[{}] {} raw blobs found, using {}", id, candidates.len(), key);
        }

        let media_type = mime_guess::from_path(key).first_or_octet_stream();
        Ok(BlobRef::new(key, media_type.essence_str()))
    }
}

/// Key is `prefix` itself or `prefix` followed by an extension
pub(crate) fn is_exact_stem(key: &str, prefix: &str) -> bool {
    match key.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || (rest.starts_with('.') && !rest.contains('/')),
        None => false,
    }
}

/// First candidate by extension priority, else the first candidate
fn select(candidates: &[String]) -> Option<&str> {
    PRIORITY_EXTENSIONS
        .iter()
        .find_map(|ext| {
            candidates
                .iter()
                .find(|key| key_extension(key).as_deref() == Some(*ext))
        })
        .or_else(|| candidates.first())
        .map(String::as_str)
}
