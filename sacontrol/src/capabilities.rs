// sacontrol/src/capabilities.rs
use crate::errors::ControlError;
use crate::model::{MediaInfo, PositionInfo};

/// High-level playback state of a speaker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    Transitioning,
    NoMedia,
    /// Backend-specific or unknown state string.
    Unknown(String),
}

impl PlaybackState {
    /// Map a raw UPnP AVTransport CurrentTransportState string
    /// to a logical PlaybackState.
    pub fn from_upnp_state(raw: &str) -> Self {
        let s = raw.trim().to_ascii_uppercase();
        match s.as_str() {
            "STOPPED" => PlaybackState::Stopped,
            "PLAYING" => PlaybackState::Playing,
            "PAUSED_PLAYBACK" | "PAUSED_RECORDING" => PlaybackState::Paused,
            "TRANSITIONING" => PlaybackState::Transitioning,
            "NO_MEDIA_PRESENT" => PlaybackState::NoMedia,
            _ => PlaybackState::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PlaybackState::Stopped => "STOPPED",
            PlaybackState::Playing => "PLAYING",
            PlaybackState::Paused => "PAUSED",
            PlaybackState::Transitioning => "TRANSITIONING",
            PlaybackState::NoMedia => "NO_MEDIA",
            PlaybackState::Unknown(s) => s.as_str(),
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

/// Transport state (AVTransport::GetTransportInfo).
pub trait PlaybackStatus {
    fn playback_state(&self) -> Result<PlaybackState, ControlError>;
}

/// Current track of the transport (AVTransport::GetPositionInfo).
pub trait PlaybackPosition {
    fn playback_position(&self) -> Result<PositionInfo, ControlError>;
}

/// Source the transport was started from (AVTransport::GetMediaInfo).
///
/// For streaming services this is the only handle able to restart playback.
pub trait MediaSource {
    fn media_info(&self) -> Result<MediaInfo, ControlError>;
}

pub trait TransportControl {
    /// Sets the transport URI with its metadata, then starts playback.
    fn play_uri(&self, uri: &str, meta: &str) -> Result<(), ControlError>;

    /// Seeks to a relative time (H:MM:SS) in the current track.
    fn seek_rel_time(&self, hhmmss: &str) -> Result<(), ControlError>;
}

/// Play queue managed by the speaker itself.
pub trait QueueControl {
    fn queue_len(&self) -> Result<usize, ControlError>;

    /// Switches the transport to the queue and plays the item at `index` (0-based).
    fn play_from_queue(&self, index: usize) -> Result<(), ControlError>;
}

/// Everything the alert sequence needs from a speaker.
pub trait SpeakerControl:
    PlaybackStatus + PlaybackPosition + MediaSource + TransportControl + QueueControl + Send + Sync
{
}

impl<T> SpeakerControl for T where
    T: PlaybackStatus
        + PlaybackPosition
        + MediaSource
        + TransportControl
        + QueueControl
        + Send
        + Sync
{
}
