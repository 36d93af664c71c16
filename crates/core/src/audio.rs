use std::path::Path;

const AUDIO_EXTENSIONS: &[&str] = &["mp3"];

/// Tag fields exposed as `|artist|`, `|album|`, `|track|` and `|no|`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioTags {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub track: Option<u32>,
}

impl AudioTags {
    pub fn field(&self, placeholder: &str) -> Option<String> {
        match placeholder {
            "artist" => self.artist.clone(),
            "album" => self.album.clone(),
            "track" => self.title.clone(),
            "no" => self.track.map(|n| format!("{n:02}")),
            _ => None,
        }
    }
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            AUDIO_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a))
        })
        .unwrap_or(false)
}

#[cfg(feature = "audio")]
pub fn read_audio_tags(path: &Path) -> anyhow::Result<AudioTags> {
    use anyhow::Context;
    use id3::{Tag, TagLike};

    let tag = Tag::read_from_path(path)
        .with_context(|| format!("failed to read ID3 tag: {}", path.display()))?;

    Ok(AudioTags {
        artist: normalize(tag.artist()),
        album: normalize(tag.album()),
        title: normalize(tag.title()),
        track: tag.track(),
    })
}

#[cfg(not(feature = "audio"))]
pub fn read_audio_tags(path: &Path) -> anyhow::Result<AudioTags> {
    anyhow::bail!(
        "audio tags are unavailable (built without the `audio` feature): {}",
        path.display()
    )
}

#[cfg(feature = "audio")]
fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_mp3_extension_case_insensitively() {
        assert!(is_audio_file(Path::new("/music/a.mp3")));
        assert!(is_audio_file(Path::new("/music/a.MP3")));
        assert!(!is_audio_file(Path::new("/music/a.flac")));
        assert!(!is_audio_file(Path::new("/music/mp3")));
    }

    #[test]
    fn field_maps_placeholders_to_tags() {
        let tags = AudioTags {
            artist: Some("Stones".to_string()),
            album: None,
            title: Some("Sympathy".to_string()),
            track: Some(3),
        };
        assert_eq!(tags.field("artist").as_deref(), Some("Stones"));
        assert_eq!(tags.field("album"), None);
        assert_eq!(tags.field("track").as_deref(), Some("Sympathy"));
        assert_eq!(tags.field("no").as_deref(), Some("03"));
        assert_eq!(tags.field("genre"), None);
    }

    #[test]
    fn missing_or_untagged_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("silence.mp3");
        std::fs::write(&path, b"not an mp3").expect("write");
        assert!(read_audio_tags(&path).is_err());
    }
}
