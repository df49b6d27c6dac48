//! Interrupt, play the alert, resume.
//!
//! [`AlertController::run`] is the whole sequence for one trigger:
//!
//! 1. query the transport state,
//! 2. if playing, capture a [`PlaybackSnapshot`],
//! 3. play the alert sound,
//! 4. read the alert duration,
//! 5. wait for it (bounded),
//! 6. restore from the snapshot, whatever happened in 3 to 5.
//!
//! Speaker calls are blocking SOAP requests; each one runs on the blocking
//! pool under a command timeout. Triggers are serialized per controller.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::{self, JoinHandle};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::capabilities::{PlaybackState, SpeakerControl};
use crate::errors::ControlError;
use crate::time_utils::{format_hhmmss, parse_duration};

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_FALLBACK_WAIT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

/// Playback state captured just before the alert interrupts it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub transport_state: PlaybackState,
    /// 0-based index in the speaker queue; `None` when the track is not from the queue.
    pub queue_position: Option<usize>,
    /// Offset in the current track; `None` for streams that report no position.
    pub track_position: Option<Duration>,
    pub track_uri: String,
    pub media_uri: String,
    /// Opaque DIDL-Lite blob, handed back untouched on resume.
    pub media_metadata: String,
    pub title: Option<String>,
    pub artist: Option<String>,
}

/// How the snapshot was put back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RestoreAction {
    /// Queue item replayed, then seeked to the captured offset.
    Queue { index: usize },
    /// Source URI replayed with its metadata.
    DirectUri,
}

impl PlaybackSnapshot {
    /// Reads the current track and media source of `speaker`.
    pub fn capture<S>(speaker: &S, transport_state: PlaybackState) -> Result<Self, ControlError>
    where
        S: SpeakerControl + ?Sized,
    {
        let position = speaker.playback_position()?;
        let media = speaker.media_info()?;
        let (title, artist) = position.title_artist();

        let track_position = position
            .rel_time
            .as_deref()
            .and_then(|t| parse_duration(t).ok())
            .map(Duration::from_secs);

        let snapshot = Self {
            transport_state,
            queue_position: (position.track as usize).checked_sub(1),
            track_position,
            track_uri: position.track_uri.unwrap_or_default(),
            media_uri: media.current_uri,
            media_metadata: media.current_uri_metadata,
            title,
            artist,
        };

        debug!(?snapshot, "Playback snapshot captured");
        Ok(snapshot)
    }

    /// Puts the speaker back where the snapshot was taken.
    ///
    /// A non-empty queue and a queue position above zero resume through the
    /// queue; everything else replays the media URI with its metadata.
    pub fn restore<S>(&self, speaker: &S) -> Result<RestoreAction, ControlError>
    where
        S: SpeakerControl + ?Sized,
    {
        let queue_len = speaker.queue_len()?;

        match self.queue_position {
            Some(index) if queue_len > 0 && index > 0 => {
                info!(
                    "Resume queue from {}: {} - {}",
                    index,
                    self.artist.as_deref().unwrap_or("?"),
                    self.title.as_deref().unwrap_or("?")
                );
                speaker.play_from_queue(index)?;
                match self.track_position {
                    Some(offset) => speaker.seek_rel_time(&format_hhmmss(offset.as_secs()))?,
                    None => debug!("No track position captured, resuming from track start"),
                }
                Ok(RestoreAction::Queue { index })
            }
            _ => {
                info!("Resuming {}", self.media_uri);
                speaker.play_uri(&self.media_uri, &self.media_metadata)?;
                Ok(RestoreAction::DirectUri)
            }
        }
    }
}

/// Wait and timeout settings of the sequence.
#[derive(Clone, Debug)]
pub struct AlertTimings {
    /// Added to the reported alert duration.
    pub padding: Duration,
    /// Used when the alert duration cannot be read.
    pub fallback_wait: Duration,
    /// Upper bound on the wait.
    pub max_wait: Duration,
    /// Upper bound on a single speaker call.
    pub command_timeout: Duration,
}

impl Default for AlertTimings {
    fn default() -> Self {
        Self {
            padding: Duration::ZERO,
            fallback_wait: DEFAULT_FALLBACK_WAIT,
            max_wait: DEFAULT_MAX_WAIT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertPhase {
    Query,
    Snapshot,
    Play,
    Duration,
    Restore,
}

impl fmt::Display for AlertPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertPhase::Query => "query",
            AlertPhase::Snapshot => "snapshot",
            AlertPhase::Play => "play",
            AlertPhase::Duration => "duration",
            AlertPhase::Restore => "restore",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("speaker {phase} failed: {source}")]
    Transport {
        phase: AlertPhase,
        #[source]
        source: ControlError,
    },
    #[error("speaker {phase} did not answer within {after:?}")]
    Timeout { phase: AlertPhase, after: Duration },
    #[error("alert needs {requested:?}, more than the {limit:?} allowed")]
    WaitExceeded { requested: Duration, limit: Duration },
    #[error("speaker task failed during {phase}: {message}")]
    Task { phase: AlertPhase, message: String },
}

impl AlertError {
    pub fn phase(&self) -> Option<AlertPhase> {
        match self {
            AlertError::Transport { phase, .. }
            | AlertError::Timeout { phase, .. }
            | AlertError::Task { phase, .. } => Some(*phase),
            AlertError::WaitExceeded { .. } => None,
        }
    }
}

/// Runs the alert sequence against one speaker.
pub struct AlertController {
    speaker: Arc<dyn SpeakerControl>,
    alert_sound_url: String,
    timings: AlertTimings,
    single_flight: Mutex<()>,
}

impl AlertController {
    pub fn new(
        speaker: Arc<dyn SpeakerControl>,
        alert_sound_url: impl Into<String>,
        timings: AlertTimings,
    ) -> Self {
        Self {
            speaker,
            alert_sound_url: alert_sound_url.into(),
            timings,
            single_flight: Mutex::new(()),
        }
    }

    pub fn alert_sound_url(&self) -> &str {
        &self.alert_sound_url
    }

    pub fn timings(&self) -> &AlertTimings {
        &self.timings
    }

    /// Runs the sequence on its own task.
    ///
    /// Dropping the returned handle does not stop the sequence, so a caller
    /// going away never skips the restore.
    pub fn trigger(self: &Arc<Self>) -> JoinHandle<Result<(), AlertError>> {
        let controller = Arc::clone(self);
        tokio::spawn(async move { controller.run().await })
    }

    /// Interrupts playback, plays the alert, waits for it, restores.
    ///
    /// Concurrent calls run one after another. Restore is attempted whenever a
    /// snapshot was captured; the first error met is returned afterwards.
    pub async fn run(&self) -> Result<(), AlertError> {
        let _flight = self.single_flight.lock().await;

        let state = self
            .on_speaker(AlertPhase::Query, |s| s.playback_state())
            .await?;
        info!("Playback state is {}", state.as_str());

        let mut first_error: Option<AlertError> = None;

        let snapshot = if state.is_playing() {
            let captured_state = state.clone();
            match self
                .on_speaker(AlertPhase::Snapshot, move |s| {
                    PlaybackSnapshot::capture(s, captured_state)
                })
                .await
            {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    error!("Cannot capture playback, music will not resume: {}", e);
                    first_error.get_or_insert(e);
                    None
                }
            }
        } else {
            None
        };

        if let Err(e) = self.play_and_wait().await {
            first_error.get_or_insert(e);
        }

        if let Some(snapshot) = snapshot {
            info!("Restarting music...");
            match self
                .on_speaker(AlertPhase::Restore, move |s| snapshot.restore(s))
                .await
            {
                Ok(action) => debug!(?action, "Playback restored"),
                Err(e) => {
                    error!("Restore failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn play_and_wait(&self) -> Result<(), AlertError> {
        let url = self.alert_sound_url.clone();
        info!("Playing alert {}", url);
        self.on_speaker(AlertPhase::Play, move |s| s.play_uri(&url, ""))
            .await
            .inspect_err(|e| error!("Alert did not play: {}", e))?;

        let wait = match self.on_speaker(AlertPhase::Duration, alert_duration).await {
            // A duration too large to pad saturates and falls into the bounded path below.
            Ok(Some(secs)) => Duration::from_secs(secs)
                .checked_add(self.timings.padding)
                .unwrap_or(Duration::MAX),
            Ok(None) => {
                warn!(
                    fallback = ?self.timings.fallback_wait,
                    "Speaker reports no alert duration, using fallback wait"
                );
                self.timings.fallback_wait
            }
            Err(e) => {
                warn!(
                    fallback = ?self.timings.fallback_wait,
                    "Cannot read alert duration ({}), using fallback wait", e
                );
                self.timings.fallback_wait
            }
        };

        if wait > self.timings.max_wait {
            warn!(?wait, limit = ?self.timings.max_wait, "Alert duration over limit, cutting wait");
            time::sleep(self.timings.max_wait).await;
            return Err(AlertError::WaitExceeded {
                requested: wait,
                limit: self.timings.max_wait,
            });
        }

        debug!(?wait, "Waiting for the alert to play through");
        time::sleep(wait).await;
        Ok(())
    }

    async fn on_speaker<T, F>(&self, phase: AlertPhase, f: F) -> Result<T, AlertError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SpeakerControl) -> Result<T, ControlError> + Send + 'static,
    {
        let speaker = Arc::clone(&self.speaker);
        let call = task::spawn_blocking(move || f(speaker.as_ref()));

        match time::timeout(self.timings.command_timeout, call).await {
            Ok(Ok(result)) => result.map_err(|source| AlertError::Transport { phase, source }),
            Ok(Err(join_err)) => Err(AlertError::Task {
                phase,
                message: join_err.to_string(),
            }),
            Err(_) => {
                warn!(%phase, after = ?self.timings.command_timeout, "Speaker command timed out");
                Err(AlertError::Timeout {
                    phase,
                    after: self.timings.command_timeout,
                })
            }
        }
    }
}

/// Duration of the track now playing, in seconds.
///
/// `Ok(None)` when the speaker reports nothing or `0:00:00`, which it does
/// while the alert is still loading.
fn alert_duration(speaker: &dyn SpeakerControl) -> Result<Option<u64>, ControlError> {
    let position = speaker.playback_position()?;
    match position.track_duration.as_deref() {
        None => Ok(None),
        Some(raw) => {
            let secs = parse_duration(raw)?;
            Ok((secs > 0).then_some(secs))
        }
    }
}
