//! Viseme cue scheduling for lip-sync animation.
//!
//! A viseme is a visual mouth-shape category, not a phonetic sound. While
//! the avatar speaks, mouth shapes cycle through a fixed vowel set at a
//! configurable cadence; each cue is held briefly so the mouth pulses
//! rather than sliding between overlapping shapes.
//!
//! This is a heuristic approximation. Cues are derived from utterance
//! length and wall-clock cadence, never from phoneme alignment against
//! the audio waveform, and the schedule is cut off unconditionally when
//! playback ends: no cue is emitted at or after `Ended`, even if the
//! cyclic schedule has not completed.

use crate::config::LipSyncConfig;
use crate::conversation::messages::{PlaybackEvent, UtteranceId};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// Visual mouth-shape categories driving the avatar's facial animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Viseme {
    A,
    E,
    I,
    O,
    U,
}

impl Viseme {
    /// The cyclic order mouth shapes are played in.
    pub const CYCLE: [Viseme; 5] = [Viseme::A, Viseme::E, Viseme::I, Viseme::O, Viseme::U];

    /// Animation clip name for this viseme on the avatar model.
    #[must_use]
    pub fn animation_name(self) -> &'static str {
        match self {
            Self::A => "Mouth_A",
            Self::E => "Mouth_E",
            Self::I => "Mouth_I",
            Self::O => "Mouth_O",
            Self::U => "Mouth_U",
        }
    }
}

/// One timed mouth-shape cue within an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnimationCue {
    /// Mouth shape to show.
    pub viseme: Viseme,
    /// Offset from utterance start in ms.
    pub offset_ms: u64,
    /// How long the shape is held in ms.
    pub duration_ms: u64,
}

/// Estimate how long `text` takes to speak, in ms.
#[must_use]
pub fn estimate_duration_ms(text: &str, words_per_minute: f32) -> u64 {
    let words = text.split_whitespace().count() as f32;
    let minutes = words / words_per_minute.max(30.0);
    (minutes * 60_000.0) as u64
}

/// Finite cue sequence for one utterance.
///
/// Non-restartable: iteration consumes cues, and a consumed cue is never
/// produced again.
#[derive(Debug)]
pub struct CueSchedule {
    cues: std::vec::IntoIter<AnimationCue>,
}

impl Iterator for CueSchedule {
    type Item = AnimationCue;

    fn next(&mut self) -> Option<Self::Item> {
        self.cues.next()
    }
}

impl ExactSizeIterator for CueSchedule {
    fn len(&self) -> usize {
        self.cues.len()
    }
}

/// Derives timed cue sequences and emits them against the playback
/// lifecycle of an utterance.
#[derive(Debug, Clone)]
pub struct AnimationSynchronizer {
    config: LipSyncConfig,
}

impl AnimationSynchronizer {
    /// Create a synchronizer with the given scheduling settings.
    #[must_use]
    pub fn new(config: LipSyncConfig) -> Self {
        Self { config }
    }

    /// Build the cue schedule for `text`.
    ///
    /// Cues start at offset 0 and repeat every `cue_interval_ms`, cycling
    /// through [`Viseme::CYCLE`]; the count is bounded by the
    /// words-per-minute duration estimate. Empty or whitespace-only text
    /// produces an empty schedule.
    #[must_use]
    pub fn schedule(&self, text: &str) -> CueSchedule {
        if text.trim().is_empty() {
            return CueSchedule {
                cues: Vec::new().into_iter(),
            };
        }

        let interval = self.config.cue_interval_ms.max(1);
        let total_ms = estimate_duration_ms(text, self.config.words_per_minute);
        let count = (total_ms / interval).max(1) as usize;

        let cues: Vec<AnimationCue> = (0..count)
            .map(|index| AnimationCue {
                viseme: Viseme::CYCLE[index % Viseme::CYCLE.len()],
                offset_ms: index as u64 * interval,
                duration_ms: self.config.cue_duration_ms,
            })
            .collect();
        CueSchedule {
            cues: cues.into_iter(),
        }
    }

    /// Emit the cue schedule for `utterance` against its playback
    /// lifecycle events.
    ///
    /// Waits for the matching `Started`, then sends each cue at its
    /// offset. Terminates when the schedule is exhausted, the matching
    /// `Ended` arrives, or the cue consumer goes away. `Ended` wins races
    /// against due cues, so no cue is ever delivered at or after it.
    pub async fn drive(
        &self,
        utterance: UtteranceId,
        text: &str,
        mut events: broadcast::Receiver<PlaybackEvent>,
        cues: mpsc::Sender<AnimationCue>,
    ) {
        let started_at = loop {
            match events.recv().await {
                Ok(PlaybackEvent::Started { utterance: id }) if id == utterance => {
                    break tokio::time::Instant::now();
                }
                Ok(PlaybackEvent::Ended { utterance: id }) if id == utterance => return,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("lip-sync fell behind playback events, skipped {skipped}");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        };

        let mut schedule = self.schedule(text);
        let mut pending = schedule.next();
        while let Some(cue) = pending {
            let due = started_at + tokio::time::Duration::from_millis(cue.offset_ms);
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Ok(PlaybackEvent::Ended { utterance: id }) if id == utterance => return,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("lip-sync fell behind playback events, skipped {skipped}");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
                () = tokio::time::sleep_until(due) => {
                    if cues.send(cue).await.is_err() {
                        return;
                    }
                    pending = schedule.next();
                }
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
