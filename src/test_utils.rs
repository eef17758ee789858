//! Test fixtures shared by the player tests.
//!
//! [`ScriptedDecoder`] stands in for a real decoder: it never touches audio,
//! it just walks the decode protocol against the control block so the worker
//! and command paths can be exercised without sound files or hardware.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{ScriptedDecoder, mock_song};
//!
//! let player = Player::start(Box::new(ScriptedDecoder::default()), Box::new(NullOutput::new(false)), &AudioConfig::default())?;
//! player.play(&mock_song("/music/a.flac", 180));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::model::{Song, SongTag, TagKind};
use crate::player::{
    AudioFormat, AudioOutput, DecodeCommand, DecodeSession, Decoder, Delivery, OutputError,
    PlayerError, StreamInfo,
};

/// Creates a song with a title tag and a known length.
pub fn mock_song(url: &str, seconds: u64) -> Song {
    let mut tag = SongTag::new();
    tag.time = Some(seconds);
    tag.add(TagKind::Title, format!("Test {url}"));
    tag.add(TagKind::Artist, "Test Artist");
    Song::new(url).with_tag(tag)
}

/// Decoder that follows the decode protocol without producing audio.
///
/// A song "plays" until stopped. Seeking to or past its end advances to the
/// queued song, or ends decoding when the queue is empty or locked.
#[derive(Debug, Default, Clone)]
pub struct ScriptedDecoder {
    /// Urls that fail with `DecodeFailure` instead of starting
    pub failing: Vec<String>,
    /// Return without reporting start or failure
    pub silent: bool,
}

impl ScriptedDecoder {
    pub fn failing(urls: &[&str]) -> Self {
        Self {
            failing: urls.iter().map(|u| u.to_string()).collect(),
            silent: false,
        }
    }

    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    fn info(song: &Song) -> StreamInfo {
        StreamInfo {
            total_time: song.duration().map_or(0.0, |d| d.as_secs_f64()),
            sample_rate: 44_100,
            bits: 16,
            channels: 2,
            bit_rate: 1411,
        }
    }
}

impl Decoder for ScriptedDecoder {
    fn decode(&mut self, session: &mut DecodeSession<'_>) {
        if self.silent {
            return;
        }
        let Some(mut song) = session.current_song() else {
            session.fail(PlayerError::SystemError);
            return;
        };
        if self.failing.contains(&song.url) {
            session.fail(PlayerError::DecodeFailure(song.url));
            return;
        }

        session.publish_metadata(song.clone());
        session.started(Self::info(&song));

        loop {
            match session.poll() {
                Some(DecodeCommand::Stop) => return,
                Some(DecodeCommand::Seek { position }) => {
                    let length = song.duration().map_or(f64::INFINITY, |d| d.as_secs_f64());
                    if position < length {
                        session.seek_done(position);
                        continue;
                    }
                    match session.take_queued() {
                        Some(next) => {
                            song = next;
                            session.publish_metadata(song.clone());
                            session.started(Self::info(&song));
                            session.seek_done(0.0);
                        }
                        None => return,
                    }
                }
                Some(DecodeCommand::Pause { .. }) => {}
                None => session.wait(),
            }
        }
    }
}

/// Output that counts how often it was closed.
#[derive(Debug, Default, Clone)]
pub struct SpyOutput {
    format: Option<AudioFormat>,
    pub closes: Arc<AtomicUsize>,
}

impl SpyOutput {
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl AudioOutput for SpyOutput {
    fn open(&mut self, format: AudioFormat) -> Result<(), OutputError> {
        self.format = Some(format);
        Ok(())
    }

    fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    fn play(&mut self, _samples: &[f32]) -> Result<Delivery, OutputError> {
        self.format
            .map(|_| Delivery::Accepted)
            .ok_or(OutputError::NotOpen)
    }

    fn close(&mut self) {
        self.format = None;
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
