//! The control block shared by the control side and the worker thread.
//!
//! All mutable fields live in one [`ControlState`] behind a single mutex.
//! The [`CommandChannel`] condition variables wait on that same mutex, so a
//! flag is never set or cleared outside the lock that the waiting side
//! checks it under.

use parking_lot::{Mutex, MutexGuard};

use super::channel::CommandChannel;
use super::error::PlayerError;
use super::mailbox::MetadataMailbox;
use super::state::{CommandFlags, PlaybackStatus, PlayerState, QueueLockState, QueueState};
use crate::config::MAX_SOFTWARE_VOLUME;
use crate::model::Song;

/// Mutable fields of the control block.
#[derive(Debug, Default)]
pub struct ControlState {
    /// Written only by the worker side
    pub state: PlayerState,
    /// Pending commands
    pub flags: CommandFlags,
    /// Seek target in seconds, meaningful while `SEEK` is pending
    pub seek_target: f64,
    pub queue_state: QueueState,
    pub queue_lock: QueueLockState,
    /// Song the decoder plays next time `PLAY` is handled
    pub current: Option<Song>,
    /// Lookahead song, present iff `queue_state == Full`
    pub queued: Option<Song>,
    pub status: PlaybackStatus,
    pub cross_fade: f32,
    /// 0 - 1000
    pub software_volume: u32,
    /// Latched error, latest wins
    pub error: Option<PlayerError>,
    /// Set once when the player shuts down
    pub shutdown: bool,
}

impl ControlState {
    /// Publish `song` as the current-song snapshot.
    pub fn set_current_song(&mut self, song: &Song) {
        self.status.total_time = song.duration().map_or(0.0, |d| d.as_secs_f64());
        self.current = Some(song.clone());
    }

    /// Empty the queue slot.
    pub fn clear_queue(&mut self) {
        self.queue_state = QueueState::Blank;
        self.queued = None;
    }

    /// Latch an error, replacing any earlier one.
    pub fn latch_error(&mut self, error: PlayerError) {
        if let Some(previous) = self.error.replace(error) {
            tracing::debug!(%previous, "overwriting unread player error");
        }
    }

    /// Status fields together with the current state.
    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            ..self.status
        }
    }
}

/// Shared state record plus its signalling primitives.
#[derive(Debug)]
pub struct ControlBlock {
    state: Mutex<ControlState>,
    channel: CommandChannel,
    mailbox: MetadataMailbox,
}

impl ControlBlock {
    pub fn new(software_volume: u32, cross_fade: f32) -> Self {
        let state = ControlState {
            software_volume: software_volume.min(MAX_SOFTWARE_VOLUME),
            cross_fade: cross_fade.max(0.0),
            ..ControlState::default()
        };
        Self {
            state: Mutex::new(state),
            channel: CommandChannel::new(),
            mailbox: MetadataMailbox::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock()
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    pub fn mailbox(&self) -> &MetadataMailbox {
        &self.mailbox
    }
}

impl Default for ControlBlock {
    fn default() -> Self {
        Self::new(MAX_SOFTWARE_VOLUME, 0.0)
    }
}
