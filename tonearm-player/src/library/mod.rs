//! Music library
//!
//! A flat scan of the media directory at startup. Tracks are identified by
//! a fresh id per process run; metadata is read lazily on first request and
//! cached on the track.

mod tags;

use crate::error::{Error, Result};
use crate::store::ResourceStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tonearm_common::types::{TrackInfo, TrackTags};
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["flac", "mp3", "wav"];

/// One playable file in the library.
pub struct Track {
    pub id: Uuid,
    pub path: PathBuf,
    pub display_name: String,
    tags: OnceCell<TrackTags>,
}

impl Track {
    pub fn new(path: PathBuf) -> Self {
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            id: Uuid::new_v4(),
            path,
            display_name,
            tags: OnceCell::new(),
        }
    }

    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            track_id: self.id,
            display_name: self.display_name.clone(),
            path: self.path.to_string_lossy().into_owned(),
        }
    }

    /// Read and cache the track's tags. Embedded cover art is registered as
    /// a blob resource on first read so clients can fetch it by id.
    pub async fn tags(&self, store: &ResourceStore) -> Result<&TrackTags> {
        self.tags
            .get_or_try_init(|| async {
                let path = self.path.clone();
                let extracted = tokio::task::spawn_blocking(move || tags::extract(&path))
                    .await
                    .map_err(|e| Error::Internal(format!("Tag read task failed: {}", e)))??;

                let art_id = extracted
                    .picture
                    .map(|(bytes, mime)| store.register_blob(bytes, mime));

                Ok(TrackTags {
                    title: extracted.title,
                    artist: extracted.artist,
                    album: extracted.album,
                    duration_ms: extracted.duration_ms,
                    bitrate_kbps: extracted.bitrate_kbps,
                    sample_rate_hz: extracted.sample_rate_hz,
                    format: extracted.format,
                    art_id,
                })
            })
            .await
    }
}

/// Walk `dir` and collect playable files in path order.
pub fn scan_library(dir: &Path) -> Result<Vec<Arc<Track>>> {
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "Music directory does not exist: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();

    debug!("Found {} audio files under {}", paths.len(), dir.display());
    let tracks: Vec<Arc<Track>> = paths
        .into_iter()
        .map(|path| Arc::new(Track::new(path)))
        .collect();
    info!("Library scan complete: {} tracks", tracks.len());
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.mp3"), b"x").unwrap();
        fs::write(dir.path().join("a.flac"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join("c.WAV"), b"x").unwrap();

        let tracks = scan_library(dir.path()).unwrap();
        let names: Vec<&str> = tracks.iter().map(|t| t.display_name.as_str()).collect();
        assert_eq!(names, vec!["a.flac", "b.mp3", "c.WAV"]);
    }

    #[test]
    fn scan_recurses_into_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("album")).unwrap();
        fs::write(dir.path().join("album").join("song.mp3"), b"x").unwrap();

        let tracks = scan_library(dir.path()).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].display_name, "song.mp3");
    }

    #[test]
    fn scan_rejects_missing_directory() {
        let result = scan_library(Path::new("/nonexistent/music"));
        assert!(result.is_err());
    }

    #[test]
    fn tracks_get_distinct_ids() {
        let a = Track::new(PathBuf::from("/music/same.mp3"));
        let b = Track::new(PathBuf::from("/music/same.mp3"));
        assert_ne!(a.id, b.id);
    }
}
