//! Tag extraction via lofty.

use crate::error::{Error, Result};
use lofty::prelude::{Accessor, AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use std::path::Path;
use tracing::debug;

/// Raw extraction result, before cover art is registered as a resource.
pub struct ExtractedTags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    pub bitrate_kbps: Option<u32>,
    pub sample_rate_hz: Option<u32>,
    pub format: Option<String>,
    pub picture: Option<(Vec<u8>, String)>,
}

pub fn extract(path: &Path) -> Result<ExtractedTags> {
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::Metadata(format!("Failed to open {}: {}", path.display(), e)))?
        .guess_file_type()
        .map_err(|e| Error::Metadata(format!("Failed to probe {}: {}", path.display(), e)))?
        .read()
        .map_err(|e| Error::Metadata(format!("Failed to read tags of {}: {}", path.display(), e)))?;

    let tag = tagged_file.primary_tag().or(tagged_file.first_tag());
    let properties = tagged_file.properties();

    // Untitled files fall back to the file stem, missing credits to the
    // Unknown placeholders
    let title = tag
        .and_then(|t| t.title().map(|s| s.to_string()))
        .unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown")
                .to_string()
        });
    let artist = tag
        .and_then(|t| t.artist().map(|s| s.to_string()))
        .unwrap_or_else(|| "Unknown Artist".to_string());
    let album = tag
        .and_then(|t| t.album().map(|s| s.to_string()))
        .unwrap_or_else(|| "Unknown Album".to_string());

    let picture = tag.and_then(|t| t.pictures().first()).map(|picture| {
        let mime = picture
            .mime_type()
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        (picture.data().to_vec(), mime)
    });

    let format = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());

    debug!("Extracted tags for {}: {} / {}", path.display(), artist, title);

    Ok(ExtractedTags {
        title,
        artist,
        album,
        duration_ms: properties.duration().as_millis() as u64,
        bitrate_kbps: properties.audio_bitrate(),
        sample_rate_hz: properties.sample_rate(),
        format,
        picture,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sine_wav_file(dir: &Path) -> std::path::PathBuf {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
            for n in 0..8000u32 {
                let t = n as f32 / 8000.0;
                let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
                writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        let path = dir.join("tone.wav");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn untagged_file_gets_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        let path = sine_wav_file(dir.path());

        let tags = extract(&path).unwrap();
        assert_eq!(tags.title, "tone");
        assert_eq!(tags.artist, "Unknown Artist");
        assert_eq!(tags.album, "Unknown Album");
        assert_eq!(tags.format.as_deref(), Some("wav"));
        assert!(tags.duration_ms >= 900 && tags.duration_ms <= 1100);
        assert_eq!(tags.sample_rate_hz, Some(8000));
        assert!(tags.picture.is_none());
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.mp3");
        std::fs::write(&path, b"not audio at all").unwrap();
        assert!(extract(&path).is_err());
    }
}
