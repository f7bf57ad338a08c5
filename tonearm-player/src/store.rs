//! Content-addressed resource store ("depot")
//!
//! Registry of opaque identifiers mapping to either a file-path reference
//! or an in-memory blob with a mime type. Entries are immutable after
//! insertion and never evicted, so reads need only a brief read lock and
//! handed-out entries are shared via Arc.
//!
//! Registration is deliberately not deduplicated: registering the same path
//! twice yields two identifiers. Long sessions therefore grow the map
//! without bound; a content-hash-keyed store with refcounts would cap this,
//! at the cost of the append-only simplicity relied on here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Payload of a registered resource.
#[derive(Debug, Clone)]
pub enum ResourcePayload {
    /// Reference to a file on the privileged side
    PathRef(PathBuf),
    /// In-memory bytes with an explicit content type
    Blob { bytes: Arc<Vec<u8>>, mime: String },
}

/// An immutable registered resource.
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    pub id: Uuid,
    pub payload: ResourcePayload,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Uuid, Arc<ResourceEntry>>,
    /// Insertion order, so find_by_path scans oldest-first
    order: Vec<Uuid>,
}

/// Identifier registry for the resource resolution protocol.
#[derive(Default)]
pub struct ResourceStore {
    inner: RwLock<Inner>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path reference. Always allocates a fresh identifier.
    pub fn register_path(&self, path: impl Into<PathBuf>) -> Uuid {
        let path = path.into();
        debug!("Registering path resource: {}", path.display());
        self.insert(ResourcePayload::PathRef(path))
    }

    /// Register an in-memory blob with its content type.
    pub fn register_blob(&self, bytes: Vec<u8>, mime: impl Into<String>) -> Uuid {
        let mime = mime.into();
        debug!("Registering blob resource: {} bytes, {}", bytes.len(), mime);
        self.insert(ResourcePayload::Blob {
            bytes: Arc::new(bytes),
            mime,
        })
    }

    fn insert(&self, payload: ResourcePayload) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.write().unwrap();
        inner.entries.insert(id, Arc::new(ResourceEntry { id, payload }));
        inner.order.push(id);
        id
    }

    /// Linear scan for the first path-kind entry matching `path`.
    pub fn find_by_path(&self, path: &Path) -> Option<Uuid> {
        let inner = self.inner.read().unwrap();
        inner.order.iter().find(|id| {
            matches!(
                inner.entries.get(id).map(|e| &e.payload),
                Some(ResourcePayload::PathRef(p)) if p == path
            )
        }).copied()
    }

    /// Constant-time lookup by identifier.
    pub fn fetch(&self, id: Uuid) -> Option<Arc<ResourceEntry>> {
        self.inner.read().unwrap().entries.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_allocates_distinct_ids_for_same_path() {
        let store = ResourceStore::new();
        let a = store.register_path("/music/a.flac");
        let b = store.register_path("/music/a.flac");

        assert_ne!(a, b);
        for id in [a, b] {
            let entry = store.fetch(id).unwrap();
            match &entry.payload {
                ResourcePayload::PathRef(p) => {
                    assert_eq!(p, Path::new("/music/a.flac"))
                }
                other => panic!("expected path entry, got {:?}", other),
            }
        }
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn find_by_path_returns_first_registered() {
        let store = ResourceStore::new();
        store.register_blob(vec![1, 2, 3], "image/png");
        let first = store.register_path("/music/b.mp3");
        store.register_path("/music/b.mp3");

        assert_eq!(store.find_by_path(Path::new("/music/b.mp3")), Some(first));
        assert_eq!(store.find_by_path(Path::new("/music/missing.mp3")), None);
    }

    #[test]
    fn fetch_unknown_id_is_none() {
        let store = ResourceStore::new();
        assert!(store.fetch(Uuid::new_v4()).is_none());
    }

    #[test]
    fn blob_payload_keeps_mime() {
        let store = ResourceStore::new();
        let id = store.register_blob(vec![0xde, 0xad], "image/jpeg");

        let entry = store.fetch(id).unwrap();
        match &entry.payload {
            ResourcePayload::Blob { bytes, mime } => {
                assert_eq!(bytes.as_slice(), &[0xde, 0xad]);
                assert_eq!(mime, "image/jpeg");
            }
            other => panic!("expected blob entry, got {:?}", other),
        }
    }
}
