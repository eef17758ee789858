//! Player error types.
//!
//! Two families with different lifetimes:
//! - [`PlayerError`] is *latched* in the control block by the worker side and
//!   stays there until a caller clears it. Its `Display` output is the
//!   user-facing message for the error.
//! - [`ControlError`] is returned directly from a synchronous command that
//!   could not be carried out and never touches the latched slot.

/// Protocol error category for commands that conflict with the player state.
pub const ACK_ERROR_PLAYER_SYNC: u32 = 55;

/// Latched playback failure.
///
/// Variants that concern a specific song carry the errored url.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    #[error("file \"{0}\" does not exist or is inaccessible")]
    FileNotFound(String),

    #[error("problems decoding \"{0}\"")]
    DecodeFailure(String),

    #[error("problems opening audio device")]
    AudioOpenFailure,

    #[error("system error occurred")]
    SystemError,

    #[error("file type of \"{0}\" is unknown")]
    UnknownFileType(String),
}

impl PlayerError {
    /// Numeric code reported in player status (0 is reserved for "no error").
    pub fn code(&self) -> u8 {
        match self {
            Self::DecodeFailure(_) => 1,
            Self::AudioOpenFailure => 2,
            Self::SystemError => 3,
            Self::UnknownFileType(_) => 4,
            Self::FileNotFound(_) => 5,
        }
    }

    /// Url of the song that failed, for variants tied to a song.
    pub fn errored_url(&self) -> Option<&str> {
        match self {
            Self::FileNotFound(url) | Self::DecodeFailure(url) | Self::UnknownFileType(url) => {
                Some(url)
            }
            Self::AudioOpenFailure | Self::SystemError => None,
        }
    }
}

/// Status code for an optional latched error.
pub fn error_code(error: Option<&PlayerError>) -> u8 {
    error.map_or(0, PlayerError::code)
}

/// Synchronous command failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("player not currently playing")]
    NotPlaying,

    #[error("queue slot already holds a song")]
    QueueFull,
}

impl ControlError {
    /// Error category for the remote-facing command protocol.
    pub fn ack_code(&self) -> u32 {
        ACK_ERROR_PLAYER_SYNC
    }
}

/// Audio output failure.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("No output device found")]
    NoDevice,

    #[error("Output device {0:?} not found")]
    DeviceNotFound(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Output stream error: {0}")]
    Stream(String),

    #[error("Output is not open")]
    NotOpen,

    #[error("Output backend {0:?} is not compiled in")]
    Unavailable(&'static str),
}
