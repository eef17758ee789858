//! Tag reading for local audio files.
//!
//! Uses the lofty crate for format-independent metadata access.
//!
//! # Features
//! - Generic tag scan: APE first, then ID3v2, reported item by item through
//!   a [`TagHandler`]
//! - Full song loading (primary tag + duration) for the player

use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag, TagType};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{Song, SongTag, TagKind};

/// Receives tag data found by a scan.
pub trait TagHandler {
    /// Song duration in whole seconds.
    fn on_duration(&mut self, _seconds: u64) {}

    /// One tag item.
    fn on_tag(&mut self, kind: TagKind, value: &str);
}

/// Handler that collects everything into a [`SongTag`].
#[derive(Debug, Default)]
pub struct SongTagCollector {
    tag: SongTag,
}

impl SongTagCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_tag(self) -> SongTag {
        self.tag
    }
}

impl TagHandler for SongTagCollector {
    fn on_duration(&mut self, seconds: u64) {
        self.tag.time = Some(seconds);
    }

    fn on_tag(&mut self, kind: TagKind, value: &str) {
        self.tag.add(kind, value);
    }
}

/// Scan a stream for APE tags, falling back to ID3v2.
///
/// The stream is rewound before the ID3v2 attempt. Returns true if either
/// format produced tags.
pub fn scan_generic_tags<R: Read + Seek>(stream: &mut R, handler: &mut dyn TagHandler) -> bool {
    if scan_tag_type(stream, TagType::Ape, handler) {
        return true;
    }
    if let Err(e) = stream.seek(SeekFrom::Start(0)) {
        tracing::debug!("rewind before ID3 scan failed: {}", e);
        return false;
    }
    scan_tag_type(stream, TagType::Id3v2, handler)
}

/// [`scan_generic_tags`] on a file path.
pub fn scan_generic_tags_path(path: &Path, handler: &mut dyn TagHandler) -> bool {
    match File::open(path) {
        Ok(file) => scan_generic_tags(&mut BufReader::new(file), handler),
        Err(e) => {
            tracing::debug!(path = %path.display(), "cannot open for tag scan: {}", e);
            false
        }
    }
}

fn scan_tag_type<R: Read + Seek>(
    stream: &mut R,
    tag_type: TagType,
    handler: &mut dyn TagHandler,
) -> bool {
    let tagged = match probe_stream(stream) {
        Ok(tagged) => tagged,
        Err(e) => {
            tracing::trace!(?tag_type, "probe failed: {}", e);
            return false;
        }
    };
    let Some(tag) = tagged.tag(tag_type) else {
        return false;
    };

    let seconds = tagged.properties().duration().as_secs();
    if seconds > 0 {
        handler.on_duration(seconds);
    }
    emit_tag(tag, handler);
    true
}

fn probe_stream<R: Read + Seek>(stream: &mut R) -> lofty::error::Result<TaggedFile> {
    Probe::new(stream).guess_file_type()?.read()
}

/// Report every text item of `tag` that maps to a [`TagKind`].
fn emit_tag(tag: &Tag, handler: &mut dyn TagHandler) {
    for item in tag.items() {
        let Some(kind) = tag_kind(item.key()) else {
            continue;
        };
        if let Some(text) = item.value().text() {
            handler.on_tag(kind, text);
        }
    }
}

fn tag_kind(key: &ItemKey) -> Option<TagKind> {
    let kind = match key {
        ItemKey::TrackArtist => TagKind::Artist,
        ItemKey::AlbumTitle => TagKind::Album,
        ItemKey::TrackTitle => TagKind::Title,
        ItemKey::TrackNumber => TagKind::Track,
        ItemKey::Genre => TagKind::Genre,
        ItemKey::RecordingDate | ItemKey::Year => TagKind::Date,
        ItemKey::Composer => TagKind::Composer,
        ItemKey::Performer => TagKind::Performer,
        ItemKey::Comment => TagKind::Comment,
        ItemKey::DiscNumber => TagKind::Disc,
        _ => return None,
    };
    Some(kind)
}

/// Load a song with its primary tag (or the first available one) and
/// duration.
pub fn read_song(path: &Path) -> Result<Song> {
    if !path.exists() {
        return Err(Error::not_found(path));
    }

    let tagged_file = Probe::open(path)
        .and_then(|probe| probe.read())
        .map_err(|e| Error::metadata(path, e.to_string()))?;

    let mut collector = SongTagCollector::new();
    let seconds = tagged_file.properties().duration().as_secs();
    if seconds > 0 {
        collector.on_duration(seconds);
    }
    if let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    {
        emit_tag(tag, &mut collector);
    }

    let tag = collector.into_tag();
    let song = Song::from_path(path);
    Ok(if tag.is_empty() { song } else { song.with_tag(tag) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::config::WriteOptions;
    use lofty::tag::{Accessor, TagExt};
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    /// Write one second of 8kHz mono silence as a WAV file.
    fn write_wav(path: &Path) {
        let data_len: u32 = 16_000;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&8000u32.to_le_bytes());
        bytes.extend_from_slice(&16_000u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(44 + data_len as usize, 0);
        std::fs::write(path, bytes).expect("Failed to write wav");
    }

    #[derive(Default)]
    struct Recorder {
        items: Vec<(TagKind, String)>,
        duration: Option<u64>,
    }

    impl TagHandler for Recorder {
        fn on_duration(&mut self, seconds: u64) {
            self.duration = Some(seconds);
        }

        fn on_tag(&mut self, kind: TagKind, value: &str) {
            self.items.push((kind, value.to_string()));
        }
    }

    #[test]
    fn test_scan_non_audio_stream_finds_nothing() {
        let mut stream = Cursor::new(b"This is just some text, not music.".to_vec());
        let mut recorder = Recorder::default();
        assert!(!scan_generic_tags(&mut stream, &mut recorder));
        assert!(recorder.items.is_empty());
    }

    #[test]
    fn test_scan_missing_path_finds_nothing() {
        let mut collector = SongTagCollector::new();
        assert!(!scan_generic_tags_path(
            Path::new("non_existent_file.mp3"),
            &mut collector
        ));
        assert!(collector.into_tag().is_empty());
    }

    #[test]
    fn test_scan_untagged_wav_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.wav");
        write_wav(&path);

        let mut recorder = Recorder::default();
        assert!(!scan_generic_tags_path(&path, &mut recorder));
    }

    #[test]
    fn test_scan_falls_back_to_id3v2() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagged.wav");
        write_wav(&path);

        let mut tag = Tag::new(TagType::Id3v2);
        tag.set_title("Bohemian Rhapsody".to_string());
        tag.set_artist("Queen".to_string());
        tag.save_to_path(&path, WriteOptions::default())
            .expect("Failed to write tag");

        let mut recorder = Recorder::default();
        assert!(scan_generic_tags_path(&path, &mut recorder));
        assert!(
            recorder
                .items
                .contains(&(TagKind::Title, "Bohemian Rhapsody".to_string()))
        );
        assert!(recorder.items.contains(&(TagKind::Artist, "Queen".to_string())));
        assert_eq!(recorder.duration, Some(1));
    }

    #[test]
    fn test_read_song_non_audio_file_returns_error() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "This is just some text, not music.").expect("Failed to write to temp file");

        let result = read_song(file.path());
        assert!(matches!(result, Err(Error::Metadata { .. })));
    }

    #[test]
    fn test_read_song_non_existent_file_returns_not_found() {
        let result = read_song(Path::new("non_existent_file.mp3"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_read_song_wav_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one-second.wav");
        write_wav(&path);

        let song = read_song(&path).unwrap();
        assert_eq!(song.url, path.to_string_lossy());
        assert_eq!(song.duration().map(|d| d.as_secs()), Some(1));
    }

    #[test]
    fn test_collector_skips_blank_values() {
        let mut collector = SongTagCollector::new();
        collector.on_tag(TagKind::Title, "   ");
        collector.on_tag(TagKind::Genre, "Rock");
        collector.on_duration(42);

        let tag = collector.into_tag();
        assert_eq!(tag.title(), None);
        assert_eq!(tag.get(TagKind::Genre), Some("Rock"));
        assert_eq!(tag.time, Some(42));
    }
}
