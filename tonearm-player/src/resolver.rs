//! Resource resolution
//!
//! Resolves registered identifiers to bytes for the depot protocol
//! (`GET /depot/{id}`) and for the engine's own fetch path. The resolver is
//! the privilege boundary: consumers never see filesystem paths, only
//! identifiers, and path-kind entries are validated against the media root
//! before any bytes leave the privileged side.

use crate::error::{Error, Result};
use crate::store::{ResourcePayload, ResourceStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// A resolved resource ready to serve.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub body: ResolvedBody,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub enum ResolvedBody {
    /// Serve file contents from disk
    File(PathBuf),
    /// Serve stored blob bytes
    Bytes(Arc<Vec<u8>>),
}

/// Request handler core for the resource resolution protocol.
pub struct Resolver {
    store: Arc<ResourceStore>,
    media_root: PathBuf,
}

impl Resolver {
    pub fn new(store: Arc<ResourceStore>, media_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            media_root: media_root.into(),
        }
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    /// Resolve an identifier to a servable body and content type.
    ///
    /// Identifiers are opaque and allocated internally, not attacker
    /// controlled paths, but path-kind entries are still checked against the
    /// media root before serving.
    pub fn resolve(&self, id: Uuid) -> Result<Resolved> {
        let entry = self.store.fetch(id).ok_or(Error::ResourceNotFound(id))?;

        match &entry.payload {
            ResourcePayload::PathRef(path) => {
                let checked = self.check_within_root(path)?;
                let content_type = content_type_for(&checked).to_string();
                debug!("Resolved {} -> {} ({})", id, checked.display(), content_type);
                Ok(Resolved {
                    body: ResolvedBody::File(checked),
                    content_type,
                })
            }
            ResourcePayload::Blob { bytes, mime } => {
                debug!("Resolved {} -> blob of {} bytes ({})", id, bytes.len(), mime);
                Ok(Resolved {
                    body: ResolvedBody::Bytes(Arc::clone(bytes)),
                    content_type: mime.clone(),
                })
            }
        }
    }

    /// Resolve and materialize bytes. Used by the playback engine, whose
    /// fetch goes through the same boundary as restricted consumers.
    pub async fn fetch_bytes(&self, id: Uuid) -> Result<(Vec<u8>, String)> {
        let resolved = self.resolve(id)?;
        match resolved.body {
            ResolvedBody::File(path) => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| Error::Fetch(format!("{}: {}", path.display(), e)))?;
                Ok((bytes, resolved.content_type))
            }
            ResolvedBody::Bytes(bytes) => Ok((bytes.as_ref().clone(), resolved.content_type)),
        }
    }

    /// Canonicalize `path` and require it to stay under the media root.
    fn check_within_root(&self, path: &Path) -> Result<PathBuf> {
        let root = self
            .media_root
            .canonicalize()
            .map_err(|e| Error::Fetch(format!("{}: {}", self.media_root.display(), e)))?;
        let canonical = path
            .canonicalize()
            .map_err(|e| Error::Fetch(format!("{}: {}", path.display(), e)))?;

        if !canonical.starts_with(&root) {
            warn!(
                "Rejecting path outside media root: {} (root {})",
                canonical.display(),
                root.display()
            );
            return Err(Error::BadRequest(format!(
                "path escapes media root: {}",
                path.display()
            )));
        }
        Ok(canonical)
    }
}

/// Infer a content type from a file extension.
fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("flac") => "audio/flac",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_root(root: &Path) -> (Arc<ResourceStore>, Resolver) {
        let store = Arc::new(ResourceStore::new());
        let resolver = Resolver::new(Arc::clone(&store), root);
        (store, resolver)
    }

    #[test]
    fn content_type_inference() {
        assert_eq!(content_type_for(Path::new("a.FLAC")), "audio/flac");
        assert_eq!(content_type_for(Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(content_type_for(Path::new("a.wav")), "audio/wav");
        assert_eq!(content_type_for(Path::new("a.bin")), "application/octet-stream");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, resolver) = store_with_root(dir.path());

        let id = Uuid::new_v4();
        match resolver.resolve(id) {
            Err(Error::ResourceNotFound(missing)) => assert_eq!(missing, id),
            other => panic!("expected ResourceNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn blob_resolves_to_stored_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let (store, resolver) = store_with_root(dir.path());

        let id = store.register_blob(vec![7, 8, 9], "image/png");
        let resolved = resolver.resolve(id).unwrap();
        assert_eq!(resolved.content_type, "image/png");
        match resolved.body {
            ResolvedBody::Bytes(bytes) => assert_eq!(bytes.as_slice(), &[7, 8, 9]),
            other => panic!("expected bytes, got {:?}", other),
        }
    }

    #[test]
    fn path_escaping_media_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::NamedTempFile::new().unwrap();
        let (store, resolver) = store_with_root(dir.path());

        let id = store.register_path(outside.path());
        match resolver.resolve(id) {
            Err(Error::BadRequest(_)) => {}
            other => panic!("expected BadRequest, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn fetch_bytes_reads_file_within_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("song.wav");
        std::fs::write(&file, b"RIFFdata").unwrap();
        let (store, resolver) = store_with_root(dir.path());

        let id = store.register_path(&file);
        let (bytes, content_type) = resolver.fetch_bytes(id).await.unwrap();
        assert_eq!(bytes, b"RIFFdata");
        assert_eq!(content_type, "audio/wav");
    }
}
