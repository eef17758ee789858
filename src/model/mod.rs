//! Core data models shared by the player and the tag scanner.
//!
//! A [`Song`] is what the control side hands to the player: a url (a local
//! path or a `file://` url) plus an optional [`SongTag`]. The player keeps
//! its own copies (current-song and queued-song snapshots), so songs are
//! plain owned values that are cheap enough to clone.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Kind of a single tag item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Artist,
    Album,
    Title,
    Track,
    Name,
    Genre,
    Date,
    Composer,
    Performer,
    Comment,
    Disc,
}

impl TagKind {
    /// Label used when printing tags.
    pub fn label(self) -> &'static str {
        match self {
            Self::Artist => "Artist",
            Self::Album => "Album",
            Self::Title => "Title",
            Self::Track => "Track",
            Self::Name => "Name",
            Self::Genre => "Genre",
            Self::Date => "Date",
            Self::Composer => "Composer",
            Self::Performer => "Performer",
            Self::Comment => "Comment",
            Self::Disc => "Disc",
        }
    }
}

/// One tag value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagItem {
    pub kind: TagKind,
    pub value: String,
}

/// Tag metadata attached to a song.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongTag {
    /// Duration in whole seconds, if known
    pub time: Option<u64>,
    // SmallVec: songs rarely carry more than 8 tag items
    pub items: SmallVec<[TagItem; 8]>,
}

impl SongTag {
    /// Create an empty tag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tag item. Empty values are ignored.
    pub fn add(&mut self, kind: TagKind, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            return;
        }
        self.items.push(TagItem { kind, value });
    }

    /// First value of the given kind.
    pub fn get(&self, kind: TagKind) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.kind == kind)
            .map(|item| item.value.as_str())
    }

    /// True when the tag has neither items nor a duration.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.time.is_none()
    }

    pub fn title(&self) -> Option<&str> {
        self.get(TagKind::Title)
    }

    pub fn artist(&self) -> Option<&str> {
        self.get(TagKind::Artist)
    }

    pub fn album(&self) -> Option<&str> {
        self.get(TagKind::Album)
    }
}

/// A playable song: url plus optional tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub url: String,
    pub tag: Option<SongTag>,
}

impl Song {
    /// Create a song without tag metadata.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tag: None,
        }
    }

    /// Create a song for a local file.
    pub fn from_path(path: &Path) -> Self {
        Self::new(path.to_string_lossy())
    }

    /// Attach tag metadata.
    pub fn with_tag(mut self, tag: SongTag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Duration from the tag, if known.
    pub fn duration(&self) -> Option<Duration> {
        self.tag
            .as_ref()
            .and_then(|t| t.time)
            .map(Duration::from_secs)
    }

    /// Local filesystem path for this song.
    ///
    /// Returns `None` for urls with a scheme other than `file://`.
    pub fn local_path(&self) -> Option<PathBuf> {
        if let Some(rest) = self.url.strip_prefix("file://") {
            return Some(PathBuf::from(rest));
        }
        if self.url.contains("://") {
            return None;
        }
        Some(PathBuf::from(&self.url))
    }

    /// Get display title (file stem if no title tag).
    pub fn display_title(&self) -> String {
        if let Some(title) = self.tag.as_ref().and_then(|t| t.title()) {
            return title.to_string();
        }
        self.local_path()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
            .unwrap_or_else(|| self.url.clone())
    }

    /// Get display artist.
    pub fn display_artist(&self) -> &str {
        self.tag
            .as_ref()
            .and_then(|t| t.artist())
            .unwrap_or("Unknown Artist")
    }
}
