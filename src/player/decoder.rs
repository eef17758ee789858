//! File decoder built on symphonia.
//!
//! Supported formats:
//! - MP3
//! - FLAC
//! - OGG Vorbis
//! - WAV/PCM
//! - AAC (in MP4 container)

use std::fs::File;
use std::io;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

use super::audio::{AudioFormat, Delivery};
use super::error::PlayerError;
use super::state::StreamInfo;
use super::worker::{DecodeCommand, DecodeSession, Decoder};
use crate::model::{Song, SongTag, TagKind};

/// Decodes local files and writes them to the session's output.
///
/// At the end of a song it moves on to the queued song, if the queue allows.
#[derive(Debug, Default)]
pub struct SymphoniaDecoder {
    samples: Vec<f32>,
}

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&mut self, session: &mut DecodeSession<'_>) {
        let Some(song) = session.current_song() else {
            session.fail(PlayerError::SystemError);
            return;
        };
        let Some(mut stream) = start_song(session, &song) else {
            return;
        };

        // A decoded chunk the output has not taken yet
        let mut pending = false;
        loop {
            match session.poll() {
                Some(DecodeCommand::Stop) => {
                    session.output().cancel();
                    return;
                }
                Some(DecodeCommand::Seek { position }) => {
                    pending = false;
                    match seek(session, stream, position) {
                        Some(next) => stream = next,
                        None => return,
                    }
                    continue;
                }
                Some(DecodeCommand::Pause { .. }) | None => {}
            }

            if session.is_paused() {
                session.wait();
                continue;
            }

            if !pending {
                let volume = session.software_volume() as f32 / 1000.0;
                match stream.next_chunk(volume, &mut self.samples) {
                    Ok(true) => pending = true,
                    Ok(false) => {
                        match advance(session) {
                            Some(next) => stream = next,
                            None => return,
                        }
                        continue;
                    }
                    Err(e) => {
                        session.fail(e);
                        return;
                    }
                }
            }

            match session.output().play(&self.samples) {
                Ok(Delivery::Accepted) => {
                    pending = false;
                    let played = self.samples.len() as f64
                        / f64::from(stream.info.channels.max(1))
                        / f64::from(stream.info.sample_rate.max(1));
                    session.update_elapsed(stream.position, played, 0);
                }
                Ok(Delivery::Busy) => {}
                Err(e) => {
                    tracing::error!(url = %stream.url, "audio output failed: {}", e);
                    session.fail(PlayerError::AudioOpenFailure);
                    return;
                }
            }
        }
    }
}

/// Open `song`, make sure the output matches its format and report start.
fn start_song(session: &mut DecodeSession<'_>, song: &Song) -> Option<OpenStream> {
    let stream = match OpenStream::open(song) {
        Ok(stream) => stream,
        Err(e) => {
            session.fail(e);
            return None;
        }
    };

    let format = AudioFormat {
        sample_rate: stream.info.sample_rate,
        channels: stream.info.channels,
    };
    if session.output().format() != Some(format)
        && let Err(e) = session.output().open(format)
    {
        tracing::error!("failed to open audio output: {}", e);
        session.fail(PlayerError::AudioOpenFailure);
        return None;
    }

    tracing::info!(
        url = %song.url,
        sample_rate = stream.info.sample_rate,
        channels = stream.info.channels,
        "song started"
    );
    // Publish first so the caller sees the snapshot once play() returns
    session.publish_metadata(stream.snapshot(song));
    session.started(stream.info);
    Some(stream)
}

/// Move on to the queued song, if any.
fn advance(session: &mut DecodeSession<'_>) -> Option<OpenStream> {
    let next = session.take_queued()?;
    start_song(session, &next)
}

/// Carry out a seek request. Returns the stream to keep playing, or `None`
/// when decoding is over.
fn seek(
    session: &mut DecodeSession<'_>,
    mut stream: OpenStream,
    position: f64,
) -> Option<OpenStream> {
    // The control side may have swapped the current song along with the seek
    if let Some(current) = session.current_song()
        && current.url != stream.url
    {
        stream = start_song(session, &current)?;
    }

    let total = stream.info.total_time;
    if total > 0.0 && position >= total {
        let next = advance(session)?;
        session.output().cancel();
        session.seek_done(0.0);
        return Some(next);
    }

    session.output().cancel();
    let reached = match stream.seek(position) {
        Ok(reached) => reached,
        Err(e) => {
            tracing::warn!(url = %stream.url, "seek failed: {}", e);
            stream.position
        }
    };
    session.seek_done(reached);
    Some(stream)
}

/// A song opened for decoding.
struct OpenStream {
    url: String,
    reader: Box<dyn FormatReader>,
    codec: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    info: StreamInfo,
    tag: SongTag,
    /// Seconds decoded so far
    position: f64,
    samples: Option<SampleBuffer<f32>>,
    sample_capacity: usize,
}

impl OpenStream {
    fn open(song: &Song) -> Result<Self, PlayerError> {
        let url = song.url.clone();
        let path = song
            .local_path()
            .ok_or_else(|| PlayerError::FileNotFound(url.clone()))?;

        let file = File::open(&path).map_err(|e| {
            tracing::debug!(url = %url, "open failed: {}", e);
            PlayerError::FileNotFound(url.clone())
        })?;
        let file_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension() {
            hint.with_extension(&ext.to_string_lossy());
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let mut probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| {
                tracing::debug!(url = %url, "probe failed: {}", e);
                PlayerError::UnknownFileType(url.clone())
            })?;

        let mut tag = SongTag::new();
        if let Some(revision) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
            collect_tags(revision, &mut tag);
        }
        let mut reader = probed.format;
        if let Some(revision) = reader.metadata().current() {
            collect_tags(revision, &mut tag);
        }

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlayerError::DecodeFailure(url.clone()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| PlayerError::DecodeFailure(url.clone()))?;
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(2);
        let bits = params.bits_per_sample.unwrap_or(16) as u16;

        let total_time = match (params.n_frames, params.time_base) {
            (Some(frames), Some(tb)) => {
                let time = tb.calc_time(frames);
                time.seconds as f64 + time.frac
            }
            (Some(frames), None) => frames as f64 / f64::from(sample_rate),
            _ => 0.0,
        };
        let bit_rate = if total_time > 0.0 {
            (file_size as f64 * 8.0 / total_time / 1000.0).round() as u32
        } else {
            0
        };

        let codec = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| {
                tracing::debug!(url = %url, "no codec: {}", e);
                PlayerError::DecodeFailure(url.clone())
            })?;

        Ok(Self {
            url,
            reader,
            codec,
            track_id,
            time_base: params.time_base,
            info: StreamInfo {
                total_time,
                sample_rate,
                bits,
                channels,
                bit_rate,
            },
            tag,
            position: 0.0,
            samples: None,
            sample_capacity: 0,
        })
    }

    /// Metadata snapshot for the mailbox: stream tags when present, else the
    /// song's own tag.
    fn snapshot(&self, song: &Song) -> Song {
        if self.tag.is_empty() {
            return song.clone();
        }
        let mut tag = self.tag.clone();
        if self.info.total_time > 0.0 {
            tag.time = Some(self.info.total_time.round() as u64);
        } else {
            tag.time = song.tag.as_ref().and_then(|t| t.time);
        }
        Song::new(song.url.clone()).with_tag(tag)
    }

    fn seconds(&self, ts: u64) -> f64 {
        match self.time_base {
            Some(tb) => {
                let time = tb.calc_time(ts);
                time.seconds as f64 + time.frac
            }
            None => ts as f64 / f64::from(self.info.sample_rate.max(1)),
        }
    }

    /// Seek to `position` seconds; returns the position reached.
    fn seek(&mut self, position: f64) -> Result<f64, SymphoniaError> {
        let seeked = self.reader.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time: Time::from(position),
                track_id: Some(self.track_id),
            },
        )?;
        self.codec.reset();
        self.position = self.seconds(seeked.actual_ts);
        Ok(self.position)
    }

    /// Decode the next packet into `out` as interleaved samples scaled by
    /// `volume`. Returns `Ok(false)` at end of stream.
    fn next_chunk(&mut self, volume: f32, out: &mut Vec<f32>) -> Result<bool, PlayerError> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.codec.reset();
                    continue;
                }
                Err(e) => {
                    tracing::error!(url = %self.url, "read failed: {}", e);
                    return Err(PlayerError::DecodeFailure(self.url.clone()));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }
            let start = self.seconds(packet.ts());

            let decoded = match self.codec.decode(&packet) {
                Ok(decoded) => decoded,
                // Skip bad frame
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!(url = %self.url, "skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => {
                    tracing::error!(url = %self.url, "decode failed: {}", e);
                    return Err(PlayerError::DecodeFailure(self.url.clone()));
                }
            };

            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }
            if self.sample_capacity < decoded.capacity() {
                self.sample_capacity = decoded.capacity();
                self.samples = Some(SampleBuffer::new(
                    decoded.capacity() as u64,
                    *decoded.spec(),
                ));
            }
            let Some(buffer) = self.samples.as_mut() else {
                continue;
            };
            buffer.copy_interleaved_ref(decoded);

            out.clear();
            out.extend(buffer.samples().iter().map(|s| s * volume));
            self.position = start + frames as f64 / f64::from(self.info.sample_rate.max(1));
            return Ok(true);
        }
    }
}

fn collect_tags(revision: &MetadataRevision, tag: &mut SongTag) {
    for item in revision.tags() {
        let kind = match item.std_key {
            Some(StandardTagKey::Artist) => TagKind::Artist,
            Some(StandardTagKey::Album) => TagKind::Album,
            Some(StandardTagKey::TrackTitle) => TagKind::Title,
            Some(StandardTagKey::TrackNumber) => TagKind::Track,
            Some(StandardTagKey::Genre) => TagKind::Genre,
            Some(StandardTagKey::Date) => TagKind::Date,
            Some(StandardTagKey::Composer) => TagKind::Composer,
            Some(StandardTagKey::Performer) => TagKind::Performer,
            Some(StandardTagKey::Comment) => TagKind::Comment,
            Some(StandardTagKey::DiscNumber) => TagKind::Disc,
            _ => continue,
        };
        if tag.get(kind).is_none() {
            tag.add(kind, item.value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::control::ControlBlock;
    use crate::player::state::{CommandFlags, PlayerState, QueueState};
    use crate::player::{AudioOutput, NullOutput, OutputError};
    use std::io::Write;
    use std::path::Path;
    use std::sync::Arc;

    /// Output whose device never drains. Requests a stop after a few offers.
    struct StalledOutput {
        control: Arc<ControlBlock>,
        format: Option<AudioFormat>,
        offers: usize,
    }

    impl AudioOutput for StalledOutput {
        fn open(&mut self, format: AudioFormat) -> Result<(), OutputError> {
            self.format = Some(format);
            Ok(())
        }

        fn format(&self) -> Option<AudioFormat> {
            self.format
        }

        fn play(&mut self, _samples: &[f32]) -> Result<Delivery, OutputError> {
            self.offers += 1;
            if self.offers == 3 {
                self.control.lock().flags.insert(CommandFlags::STOP);
            }
            Ok(Delivery::Busy)
        }

        fn close(&mut self) {
            self.format = None;
        }
    }

    /// Write a 16-bit PCM WAV of silence.
    fn write_wav(path: &Path, sample_rate: u32, channels: u16, seconds: u32) {
        let frames = sample_rate * seconds;
        let data_len = frames * u32::from(channels) * 2;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * u32::from(channels) * 2).to_le_bytes());
        bytes.extend_from_slice(&(channels * 2).to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(44 + data_len as usize, 0);
        let mut file = File::create(path).unwrap();
        file.write_all(&bytes).unwrap();
    }

    fn decode(control: &ControlBlock, song: Song) {
        control.lock().set_current_song(&song);
        let mut output = NullOutput::new(false);
        let mut session = DecodeSession::new(control, &mut output);
        SymphoniaDecoder::new().decode(&mut session);
    }

    #[test]
    fn test_missing_file_latches_not_found() {
        let control = ControlBlock::default();
        decode(&control, Song::new("/nonexistent/file.mp3"));

        let st = control.lock();
        assert_eq!(
            st.error,
            Some(PlayerError::FileNotFound("/nonexistent/file.mp3".into()))
        );
        assert_eq!(st.state, PlayerState::Stopped);
    }

    #[test]
    fn test_remote_url_is_not_found() {
        let control = ControlBlock::default();
        decode(&control, Song::new("http://example.com/stream.mp3"));
        assert!(matches!(
            control.lock().error,
            Some(PlayerError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_garbage_file_is_unknown_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "definitely not audio").unwrap();

        let control = ControlBlock::default();
        let song = Song::from_path(&path);
        let url = song.url.clone();
        decode(&control, song);

        assert_eq!(control.lock().error, Some(PlayerError::UnknownFileType(url)));
    }

    #[test]
    fn test_decodes_wav_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");
        write_wav(&path, 8000, 1, 2);

        let control = ControlBlock::default();
        let song = Song::from_path(&path);
        let url = song.url.clone();
        decode(&control, song);

        let st = control.lock();
        assert_eq!(st.error, None);
        assert_eq!(st.status.sample_rate, 8000);
        assert_eq!(st.status.channels, 1);
        assert_eq!(st.status.bits, 16);
        assert!((st.status.total_time - 2.0).abs() < 0.01);
        assert!((st.status.total_play_time - 2.0).abs() < 0.05);
        drop(st);
        assert_eq!(control.mailbox().consume().map(|s| s.url), Some(url));
    }

    #[test]
    fn test_stalled_output_still_sees_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");
        write_wav(&path, 8000, 1, 2);

        let control = Arc::new(ControlBlock::default());
        control.lock().set_current_song(&Song::from_path(&path));
        let mut output = StalledOutput {
            control: Arc::clone(&control),
            format: None,
            offers: 0,
        };
        let mut session = DecodeSession::new(&control, &mut output);
        SymphoniaDecoder::new().decode(&mut session);
        drop(session);

        assert_eq!(output.offers, 3);
        let st = control.lock();
        assert_eq!(st.error, None);
        assert_eq!(st.status.total_play_time, 0.0);
        assert!(st.flags.contains(CommandFlags::STOP));
    }

    #[test]
    fn test_advances_to_queued_song() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("one.wav");
        let second = dir.path().join("two.wav");
        write_wav(&first, 8000, 2, 1);
        write_wav(&second, 11_025, 1, 1);

        let control = ControlBlock::default();
        {
            let mut st = control.lock();
            st.queued = Some(Song::from_path(&second));
            st.queue_state = QueueState::Full;
        }
        decode(&control, Song::from_path(&first));

        let st = control.lock();
        assert_eq!(st.error, None);
        assert_eq!(st.queue_state, QueueState::Blank);
        assert_eq!(st.status.sample_rate, 11_025);
        assert!((st.status.total_play_time - 2.0).abs() < 0.05);
        assert_eq!(
            st.current.as_ref().map(|s| s.url.clone()),
            Some(Song::from_path(&second).url)
        );
    }
}
