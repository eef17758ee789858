//! The player worker thread.
//!
//! The worker owns the decoder and the audio output. It sleeps until the
//! control side raises a command flag, handles the highest-priority one and
//! acknowledges it. While a song is playing the decoder runs on this thread
//! and services its own commands through a [`DecodeSession`].

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::MutexGuard;

use super::audio::AudioOutput;
use super::control::ControlBlock;
use super::error::PlayerError;
use super::state::{CommandFlags, PlayerState, QueueLockState, QueueState, StreamInfo};
use crate::model::Song;

/// A command the decoder has to act on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeCommand {
    /// Stop decoding and return from [`Decoder::decode`].
    Stop,
    /// Pause state was toggled; `paused` is the new state.
    Pause { paused: bool },
    /// Seek to `position` seconds, then call [`DecodeSession::seek_done`].
    Seek { position: f64 },
}

/// Plays songs on the worker thread.
pub trait Decoder: Send {
    /// Play `session.current_song()` until stopped or out of songs.
    ///
    /// The decoder must call [`DecodeSession::started`] or
    /// [`DecodeSession::fail`] before doing anything slow, since the control
    /// side is blocked in `play` until one of them happens.
    fn decode(&mut self, session: &mut DecodeSession<'_>);
}

/// Decoder-facing view of the control block.
pub struct DecodeSession<'a> {
    control: &'a ControlBlock,
    output: &'a mut dyn AudioOutput,
    /// Set once `started` or `fail` has answered the play command
    reported: bool,
}

impl<'a> DecodeSession<'a> {
    pub fn new(control: &'a ControlBlock, output: &'a mut dyn AudioOutput) -> Self {
        Self {
            control,
            output,
            reported: false,
        }
    }

    /// Song the decoder should be playing.
    pub fn current_song(&self) -> Option<Song> {
        self.control.lock().current.clone()
    }

    /// Report that playback has begun. A paused player stays paused.
    pub fn started(&mut self, info: StreamInfo) {
        let mut st = self.control.lock();
        if st.state != PlayerState::Paused {
            st.state = PlayerState::Playing;
        }
        if info.total_time > 0.0 {
            st.status.total_time = info.total_time;
        }
        st.status.elapsed_time = 0.0;
        st.status.sample_rate = info.sample_rate;
        st.status.bits = info.bits;
        st.status.channels = info.channels;
        st.status.bit_rate = info.bit_rate;
        if !self.reported {
            st.flags.remove(CommandFlags::PLAY);
            self.reported = true;
        }
        self.control.channel().acknowledge();
    }

    /// Report that the song could not be played.
    pub fn fail(&mut self, error: PlayerError) {
        tracing::error!("{}", error);
        let mut st = self.control.lock();
        st.latch_error(error);
        st.state = PlayerState::Stopped;
        if !self.reported {
            st.flags.remove(CommandFlags::PLAY);
            self.reported = true;
        }
        self.control.channel().acknowledge();
    }

    /// Check for a pending command.
    ///
    /// Queue lock changes are applied here and never returned. A returned
    /// `Stop` leaves the flag set for the worker loop to clear once the
    /// decoder has returned.
    pub fn poll(&mut self) -> Option<DecodeCommand> {
        let control = self.control;
        let mut st = control.lock();
        loop {
            if st.shutdown || st.flags.contains(CommandFlags::STOP) {
                return Some(DecodeCommand::Stop);
            }
            if st.flags.contains(CommandFlags::SEEK) {
                return Some(DecodeCommand::Seek {
                    position: st.seek_target,
                });
            }
            if st.flags.contains(CommandFlags::PAUSE) {
                let paused = st.state != PlayerState::Paused;
                st.state = if paused {
                    PlayerState::Paused
                } else {
                    PlayerState::Playing
                };
                if paused {
                    self.output.pause();
                }
                st.flags.remove(CommandFlags::PAUSE);
                control.channel().acknowledge();
                tracing::debug!(paused, "pause toggled");
                return Some(DecodeCommand::Pause { paused });
            }
            if st.flags.contains(CommandFlags::LOCK_QUEUE) {
                st.queue_lock = QueueLockState::Locked;
                st.flags.remove(CommandFlags::LOCK_QUEUE);
                control.channel().acknowledge();
                continue;
            }
            if st.flags.contains(CommandFlags::UNLOCK_QUEUE) {
                st.queue_lock = QueueLockState::Unlocked;
                st.flags.remove(CommandFlags::UNLOCK_QUEUE);
                control.channel().acknowledge();
                continue;
            }
            return None;
        }
    }

    /// Finish a seek. `elapsed` is the position actually reached.
    pub fn seek_done(&mut self, elapsed: f64) {
        let mut st = self.control.lock();
        st.status.elapsed_time = elapsed.max(0.0);
        st.flags.remove(CommandFlags::SEEK);
        self.control.channel().acknowledge();
    }

    /// Block until a command is pending.
    pub fn wait(&self) {
        let mut st = self.control.lock();
        if !st.shutdown && (st.flags & CommandFlags::DECODER).is_empty() {
            self.control.channel().wait_for_command(&mut st);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.control.lock().state == PlayerState::Paused
    }

    /// Record progress: position in the song, seconds of audio just played
    /// and the current bit rate (0 keeps the previous value).
    pub fn update_elapsed(&self, elapsed: f64, played: f64, bit_rate: u32) {
        let mut st = self.control.lock();
        st.status.elapsed_time = elapsed;
        st.status.total_play_time += played.max(0.0);
        if bit_rate > 0 {
            st.status.bit_rate = bit_rate;
        }
    }

    /// 0 - 1000
    pub fn software_volume(&self) -> u32 {
        self.control.lock().software_volume
    }

    pub fn cross_fade(&self) -> f32 {
        self.control.lock().cross_fade
    }

    /// Hand a snapshot of the song now being decoded to the control side.
    pub fn publish_metadata(&self, song: Song) {
        self.control.mailbox().publish(song);
    }

    /// Move the queued song into the current slot.
    ///
    /// Returns `None` when the queue is empty or locked.
    pub fn take_queued(&mut self) -> Option<Song> {
        let mut st = self.control.lock();
        if st.queue_state != QueueState::Full || st.queue_lock == QueueLockState::Locked {
            return None;
        }
        let song = st.queued.take()?;
        st.clear_queue();
        st.set_current_song(&song);
        st.status.elapsed_time = 0.0;
        self.control.mailbox().reset();
        self.control.channel().acknowledge();
        tracing::info!(url = %song.url, "advancing to queued song");
        Some(song)
    }

    pub fn output(&mut self) -> &mut dyn AudioOutput {
        &mut *self.output
    }
}

/// Background loop driving the decoder and output.
pub struct PlayerWorker {
    control: Arc<ControlBlock>,
    decoder: Box<dyn Decoder>,
    output: Box<dyn AudioOutput>,
}

impl PlayerWorker {
    pub fn new(
        control: Arc<ControlBlock>,
        decoder: Box<dyn Decoder>,
        output: Box<dyn AudioOutput>,
    ) -> Self {
        Self {
            control,
            decoder,
            output,
        }
    }

    /// Start the worker on its own thread.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("player-worker".to_string())
            .spawn(move || self.run())
    }

    fn run(mut self) {
        tracing::info!("player worker started");
        let control = Arc::clone(&self.control);
        let mut st = control.lock();

        loop {
            if st.shutdown {
                break;
            }
            let Some(flag) = st.flags.next_pending() else {
                control.channel().wait_for_command(&mut st);
                continue;
            };
            tracing::debug!(command = flag.name(), "handling command");

            if flag == CommandFlags::PLAY {
                let reported = MutexGuard::unlocked(&mut st, || self.decode());
                if !reported {
                    tracing::warn!("decoder returned without reporting start");
                    st.flags.remove(CommandFlags::PLAY);
                    if st.error.is_none() {
                        st.latch_error(PlayerError::SystemError);
                    }
                }
                // A play issued after the decoder failed stays pending
                st.state = PlayerState::Stopped;
                control.channel().acknowledge();
                continue;
            }

            if flag == CommandFlags::STOP {
                st.state = PlayerState::Stopped;
            } else if flag == CommandFlags::CLOSE_AUDIO {
                MutexGuard::unlocked(&mut st, || self.output.close());
            } else if flag == CommandFlags::LOCK_QUEUE {
                st.queue_lock = QueueLockState::Locked;
            } else if flag == CommandFlags::UNLOCK_QUEUE {
                st.queue_lock = QueueLockState::Unlocked;
            }
            // Seek and pause with nothing decoding are simply dropped

            st.flags.remove(flag);
            control.channel().acknowledge();
        }

        drop(st);
        self.output.close();
        tracing::info!("player worker stopped");
    }

    /// Run the decoder; returns whether it answered the play command.
    fn decode(&mut self) -> bool {
        let mut session = DecodeSession::new(&self.control, self.output.as_mut());
        self.decoder.decode(&mut session);
        session.reported
    }
}
