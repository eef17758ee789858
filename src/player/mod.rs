//! Background audio player driven by synchronous commands.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Player (control side)                        │
//! │  play / stop / pause / seek / queue / close-audio, getters      │
//! └────────────────────────────┬────────────────────────────────────┘
//!                              │ command flags + condvars
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  PlayerWorker (worker thread)                   │
//! │   services flags in priority order, runs the Decoder            │
//! └────────────────────────────┬────────────────────────────────────┘
//!                              │ DecodeSession
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              Decoder  ───────────▶  AudioOutput                 │
//! │        (symphonia)                  (null / cpal)               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutating command takes the submission lock, sets one flag in the
//! [`ControlBlock`](control::ControlBlock) and blocks until the worker side
//! clears it. The currently decoding song is handed back through a single-slot
//! metadata mailbox, and failures are latched until a caller clears them.

mod audio;
mod channel;
mod control;
mod decoder;
mod error;
mod mailbox;
mod state;
mod worker;

pub use audio::{AudioFormat, AudioOutput, Delivery, NullOutput, create_output, list_devices};
#[cfg(feature = "cpal-output")]
pub use audio::CpalOutput;
pub use decoder::SymphoniaDecoder;
pub use error::{ACK_ERROR_PLAYER_SYNC, ControlError, OutputError, PlayerError, error_code};
pub use state::{
    MetadataState, PlaybackStatus, PlayerState, QueueLockState, QueueState, StreamInfo,
    format_duration,
};
pub use worker::{DecodeCommand, DecodeSession, Decoder};

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Mutex, MutexGuard};

use crate::config::{AudioConfig, MAX_SOFTWARE_VOLUME};
use crate::error::ResultExt;
use crate::model::Song;
use control::{ControlBlock, ControlState};
use state::CommandFlags;
use worker::PlayerWorker;

/// Handle to a running player subsystem.
///
/// Commands block until the worker thread has acted on them. A `Player` is
/// `Sync`; concurrent callers are serialized so only one command is ever in
/// flight. Dropping the handle shuts the worker down.
pub struct Player {
    control: Arc<ControlBlock>,
    /// Held for the whole of every mutating command
    submit: Mutex<()>,
    worker: Option<JoinHandle<()>>,
}

impl Player {
    /// Spawn the worker thread with the given decoder and output.
    pub fn start(
        decoder: Box<dyn Decoder>,
        output: Box<dyn AudioOutput>,
        config: &AudioConfig,
    ) -> io::Result<Self> {
        let control = Arc::new(ControlBlock::new(
            config.software_volume,
            config.crossfade_seconds,
        ));
        let worker = PlayerWorker::new(Arc::clone(&control), decoder, output).spawn()?;
        Ok(Self {
            control,
            submit: Mutex::new(()),
            worker: Some(worker),
        })
    }

    /// Start a player that decodes with symphonia into the configured output.
    pub fn from_config(config: &AudioConfig) -> crate::error::Result<Self> {
        let output = create_output(config)?;
        Self::start(Box::new(SymphoniaDecoder::new()), output, config)
            .with_context("starting player worker")
    }

    /// Stop whatever is playing and start `song`.
    pub fn play(&self, song: &Song) {
        let _submit = self.submit.lock();
        let mut st = self.control.lock();
        self.stop_locked(&mut st);
        st.set_current_song(song);
        st.status.elapsed_time = 0.0;
        self.control.mailbox().reset();
        tracing::info!(url = %song.url, "play");
        self.control
            .channel()
            .submit_signalled(&mut st, CommandFlags::PLAY);
    }

    /// Stop playback and empty the queue slot.
    pub fn stop(&self) {
        let _submit = self.submit.lock();
        let mut st = self.control.lock();
        self.stop_locked(&mut st);
    }

    /// Toggle between playing and paused. Does nothing while stopped.
    pub fn pause(&self) {
        let _submit = self.submit.lock();
        let mut st = self.control.lock();
        if st.state != PlayerState::Stopped {
            self.control.channel().submit(&mut st, CommandFlags::PAUSE);
        }
    }

    /// Pause or resume, only toggling when the state differs.
    pub fn set_pause(&self, pause: bool) {
        let _submit = self.submit.lock();
        let mut st = self.control.lock();
        let toggle = match st.state {
            PlayerState::Playing => pause,
            PlayerState::Paused => !pause,
            PlayerState::Stopped => false,
        };
        if toggle {
            self.control.channel().submit(&mut st, CommandFlags::PAUSE);
        }
    }

    /// Seek to `time` seconds in `song`.
    ///
    /// `song` becomes the current song snapshot when its url differs from
    /// the one playing. With an error latched the seek is skipped.
    pub fn seek(&self, song: &Song, time: f64) -> Result<(), ControlError> {
        let _submit = self.submit.lock();
        let mut st = self.control.lock();
        if st.state == PlayerState::Stopped {
            return Err(ControlError::NotPlaying);
        }

        if st.current.as_ref().is_none_or(|current| current.url != song.url) {
            st.set_current_song(song);
        }

        if st.error.is_none() {
            self.control.mailbox().reset();
            st.seek_target = time.max(0.0);
            tracing::debug!(url = %song.url, time, "seek");
            self.control
                .channel()
                .submit_signalled(&mut st, CommandFlags::SEEK);
        }
        Ok(())
    }

    /// Put `song` in the lookahead slot.
    pub fn queue_song(&self, song: &Song) -> Result<(), ControlError> {
        let _submit = self.submit.lock();
        let mut st = self.control.lock();
        if st.queue_state != QueueState::Blank {
            return Err(ControlError::QueueFull);
        }
        st.queued = Some(song.clone());
        st.queue_state = QueueState::Full;
        tracing::debug!(url = %song.url, "queued");
        Ok(())
    }

    /// Keep the decoder from moving on to the queued song.
    pub fn lock_queue(&self) {
        let _submit = self.submit.lock();
        let mut st = self.control.lock();
        if st.queue_lock == QueueLockState::Unlocked {
            self.control
                .channel()
                .submit(&mut st, CommandFlags::LOCK_QUEUE);
        }
    }

    pub fn unlock_queue(&self) {
        let _submit = self.submit.lock();
        let mut st = self.control.lock();
        self.unlock_queue_locked(&mut st);
    }

    /// Stop and release the audio device.
    pub fn close_audio(&self) {
        let _submit = self.submit.lock();
        let mut st = self.control.lock();
        self.close_audio_locked(&mut st);
    }

    /// Quiesce the subsystem: stop playback and close the device.
    pub fn wait(&self) {
        let _submit = self.submit.lock();
        let mut st = self.control.lock();
        self.close_audio_locked(&mut st);
    }

    /// Override queue occupancy from the playlist layer.
    ///
    /// `Blank` drops the queued song. `Full` is only accepted while a song
    /// is actually queued.
    pub fn set_queue_state(&self, state: QueueState) {
        let mut st = self.control.lock();
        match state {
            QueueState::Blank => st.clear_queue(),
            QueueState::Full if st.queued.is_some() => st.queue_state = QueueState::Full,
            QueueState::Full => tracing::warn!("ignoring queue state Full with no queued song"),
        }
    }

    /// Claim the snapshot of the song the decoder is now playing, if a new
    /// one has been published since the last call.
    pub fn current_decode_song(&self) -> Option<Song> {
        self.control.mailbox().consume()
    }

    // Errors

    pub fn error(&self) -> Option<PlayerError> {
        self.control.lock().error.clone()
    }

    /// Message for the latched error.
    pub fn error_message(&self) -> Option<String> {
        self.control.lock().error.as_ref().map(ToString::to_string)
    }

    /// Status code of the latched error (0 when none).
    pub fn error_code(&self) -> u8 {
        error_code(self.control.lock().error.as_ref())
    }

    pub fn clear_error(&self) {
        self.control.lock().error = None;
    }

    // Status

    pub fn state(&self) -> PlayerState {
        self.control.lock().state
    }

    pub fn queue_state(&self) -> QueueState {
        self.control.lock().queue_state
    }

    pub fn queue_lock_state(&self) -> QueueLockState {
        self.control.lock().queue_lock
    }

    pub fn status(&self) -> PlaybackStatus {
        self.control.lock().status()
    }

    /// Elapsed seconds, rounded.
    pub fn elapsed_time(&self) -> u64 {
        self.status().elapsed_secs()
    }

    /// Song length in seconds, rounded.
    pub fn total_time(&self) -> u64 {
        self.status().total_secs()
    }

    pub fn total_play_time(&self) -> f64 {
        self.control.lock().status.total_play_time
    }

    pub fn bit_rate(&self) -> u32 {
        self.control.lock().status.bit_rate
    }

    pub fn sample_rate(&self) -> u32 {
        self.control.lock().status.sample_rate
    }

    pub fn bits(&self) -> u16 {
        self.control.lock().status.bits
    }

    pub fn channels(&self) -> u16 {
        self.control.lock().status.channels
    }

    // Settings

    pub fn cross_fade(&self) -> f32 {
        self.control.lock().cross_fade
    }

    /// Set crossfade length in seconds (negative values become 0).
    pub fn set_cross_fade(&self, seconds: f32) {
        self.control.lock().cross_fade = seconds.max(0.0);
    }

    pub fn software_volume(&self) -> u32 {
        self.control.lock().software_volume
    }

    /// Set software volume, 0 - 1000.
    pub fn set_software_volume(&self, volume: u32) {
        self.control.lock().software_volume = volume.min(MAX_SOFTWARE_VOLUME);
    }

    /// Stop the worker thread and wait for it to exit.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if !worker.is_finished() {
            self.wait();
        }
        self.control.lock().shutdown = true;
        self.control.channel().wake_worker();
        if worker.join().is_err() {
            tracing::error!("player worker panicked");
        }
    }

    fn stop_locked(&self, st: &mut MutexGuard<'_, ControlState>) {
        if st.state != PlayerState::Stopped {
            self.control.channel().submit(st, CommandFlags::STOP);
        }
        st.clear_queue();
        self.unlock_queue_locked(st);
    }

    fn unlock_queue_locked(&self, st: &mut MutexGuard<'_, ControlState>) {
        if st.queue_lock == QueueLockState::Locked {
            self.control
                .channel()
                .submit(st, CommandFlags::UNLOCK_QUEUE);
        }
    }

    fn close_audio_locked(&self, st: &mut MutexGuard<'_, ControlState>) {
        self.stop_locked(st);
        self.control
            .channel()
            .submit(st, CommandFlags::CLOSE_AUDIO);
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::test_utils::{ScriptedDecoder, mock_song};
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Play(u8),
        Stop,
        Pause,
        Queue(u8),
        Lock,
        Unlock,
        Seek(u16),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4).prop_map(Op::Play),
            Just(Op::Stop),
            Just(Op::Pause),
            (0u8..4).prop_map(Op::Queue),
            Just(Op::Lock),
            Just(Op::Unlock),
            (0u16..400).prop_map(Op::Seek),
        ]
    }

    fn song(n: u8) -> Song {
        mock_song(&format!("/music/{n}.flac"), 180)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Stop always leaves the player stopped with an empty, unlocked queue
        #[test]
        fn stop_postconditions_hold(ops in prop::collection::vec(op(), 1..24)) {
            let player = Player::start(
                Box::new(ScriptedDecoder::default()),
                Box::new(NullOutput::new(false)),
                &AudioConfig::default(),
            ).unwrap();
            let mut last = song(0);

            for op in ops {
                match op {
                    Op::Play(n) => {
                        last = song(n);
                        player.play(&last);
                    }
                    Op::Stop => {
                        player.stop();
                        prop_assert_eq!(player.state(), PlayerState::Stopped);
                        prop_assert_eq!(player.queue_state(), QueueState::Blank);
                        prop_assert_eq!(player.queue_lock_state(), QueueLockState::Unlocked);
                    }
                    Op::Pause => player.pause(),
                    Op::Queue(n) => {
                        let was_blank = player.queue_state() == QueueState::Blank;
                        let result = player.queue_song(&song(n));
                        prop_assert_eq!(result.is_ok(), was_blank);
                        prop_assert_eq!(player.queue_state(), QueueState::Full);
                    }
                    Op::Lock => player.lock_queue(),
                    Op::Unlock => player.unlock_queue(),
                    Op::Seek(secs) => {
                        let stopped = player.state() == PlayerState::Stopped;
                        let result = player.seek(&last, f64::from(secs));
                        prop_assert_eq!(result.is_err(), stopped);
                    }
                }
                prop_assert!(player.control.lock().flags.is_empty());
            }

            player.stop();
            prop_assert_eq!(player.state(), PlayerState::Stopped);
            player.shutdown();
        }

        /// Software volume never leaves 0..=1000
        #[test]
        fn software_volume_clamped(volume in any::<u32>()) {
            let control = ControlBlock::new(volume, 0.0);
            prop_assert_eq!(control.lock().software_volume, volume.min(MAX_SOFTWARE_VOLUME));
        }
    }
}
