//! Player state, command flags and status types.

use bitflags::bitflags;
use std::time::Duration;

/// Current playback status. Written only by the worker side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Occupancy of the single-slot lookahead queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueState {
    #[default]
    Blank,
    Full,
}

/// Gate that keeps the decoder from consuming the queued song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueLockState {
    #[default]
    Unlocked,
    Locked,
}

/// Publish/consume state of the metadata mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataState {
    /// Slot is free for the decoder to publish into
    #[default]
    Write,
    /// A snapshot is waiting to be consumed
    Read,
}

bitflags! {
    /// Pending commands for the worker thread.
    ///
    /// Set only by the control side, cleared only by the worker side once the
    /// command has been carried out.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommandFlags: u8 {
        const PLAY = 1 << 0;
        const STOP = 1 << 1;
        const SEEK = 1 << 2;
        const PAUSE = 1 << 3;
        const CLOSE_AUDIO = 1 << 4;
        const LOCK_QUEUE = 1 << 5;
        const UNLOCK_QUEUE = 1 << 6;

        /// Commands a running decoder services itself
        const DECODER = Self::STOP.bits()
            | Self::SEEK.bits()
            | Self::PAUSE.bits()
            | Self::LOCK_QUEUE.bits()
            | Self::UNLOCK_QUEUE.bits();
    }
}

impl CommandFlags {
    /// Order in which the worker services pending commands.
    pub const PRIORITY: [CommandFlags; 7] = [
        Self::PLAY,
        Self::STOP,
        Self::SEEK,
        Self::PAUSE,
        Self::CLOSE_AUDIO,
        Self::LOCK_QUEUE,
        Self::UNLOCK_QUEUE,
    ];

    /// Highest-priority pending command, if any.
    pub fn next_pending(self) -> Option<CommandFlags> {
        Self::PRIORITY.into_iter().find(|flag| self.contains(*flag))
    }

    /// Short name for logging.
    pub fn name(self) -> &'static str {
        match self {
            f if f == Self::PLAY => "play",
            f if f == Self::STOP => "stop",
            f if f == Self::SEEK => "seek",
            f if f == Self::PAUSE => "pause",
            f if f == Self::CLOSE_AUDIO => "close-audio",
            f if f == Self::LOCK_QUEUE => "lock-queue",
            f if f == Self::UNLOCK_QUEUE => "unlock-queue",
            _ => "mixed",
        }
    }
}

/// Stream parameters the decoder reports when a song starts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StreamInfo {
    /// Total length in seconds (0 = unknown)
    pub total_time: f64,
    pub sample_rate: u32,
    pub bits: u16,
    pub channels: u16,
    /// Average bit rate in kbit/s (0 = unknown)
    pub bit_rate: u32,
}

/// Snapshot of the status fields.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackStatus {
    pub state: PlayerState,
    /// Position in the current song, seconds
    pub elapsed_time: f64,
    /// Length of the current song, seconds
    pub total_time: f64,
    /// Seconds of audio played since the player started
    pub total_play_time: f64,
    /// kbit/s
    pub bit_rate: u32,
    pub sample_rate: u32,
    pub bits: u16,
    pub channels: u16,
}

impl PlaybackStatus {
    /// Elapsed time rounded to whole seconds.
    pub fn elapsed_secs(&self) -> u64 {
        round_secs(self.elapsed_time)
    }

    /// Total time rounded to whole seconds.
    pub fn total_secs(&self) -> u64 {
        round_secs(self.total_time)
    }

    /// Format position as MM:SS.
    pub fn position_str(&self) -> String {
        format_duration(Duration::from_secs(self.elapsed_secs()))
    }

    /// Format duration as MM:SS.
    pub fn duration_str(&self) -> String {
        format_duration(Duration::from_secs(self.total_secs()))
    }

    /// Get a display string for the current format.
    pub fn format_info(&self) -> String {
        format!(
            "{}Hz / {}ch / {}bit",
            self.sample_rate, self.channels, self.bits
        )
    }
}

fn round_secs(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs + 0.5) as u64
    } else {
        0
    }
}

/// Format a duration as MM:SS or HH:MM:SS.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}
