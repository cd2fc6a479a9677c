//! Shared avatar state with synchronous change propagation.
//!
//! [`AvatarStateStore`] is the single place avatar-facing state lives:
//! the current emotional expression, whether the avatar is speaking, and
//! the utterance being spoken. Components receive a store handle at
//! construction rather than reaching for a global, so tests can hand each
//! component its own store.
//!
//! Mutation goes through [`AvatarStateStore::update`] exclusively. An
//! update merges the given fields into the state and then notifies every
//! observer, synchronously, in subscription order, with the new snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, Weak};
use tracing::warn;

/// Emotional expression shown by the avatar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    /// Resting expression.
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Surprised => "surprised",
        };
        write!(f, "{name}")
    }
}

/// Snapshot of the avatar-facing state.
///
/// Invariant, preserved by callers of [`AvatarStateStore::update`]:
/// `speaking == true` implies `current_utterance` is non-empty, and the
/// update that sets `speaking` back to `false` clears `current_utterance`
/// in the same call, so no observer sees a stale utterance on a silent
/// avatar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvatarState {
    /// Current emotional expression.
    pub emotion: Emotion,
    /// Whether speech playback is in progress.
    pub speaking: bool,
    /// Text of the utterance currently being spoken, empty when silent.
    pub current_utterance: String,
}

/// Partial state change applied by [`AvatarStateStore::update`].
///
/// Only the fields that were set are merged; the rest keep their current
/// values. Setting `speaking` and `current_utterance` in one update makes
/// the pair change atomically with respect to observers.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    emotion: Option<Emotion>,
    speaking: Option<bool>,
    current_utterance: Option<String>,
}

impl StateUpdate {
    /// An empty update. Applying it notifies observers without changes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the emotional expression.
    #[must_use]
    pub fn emotion(mut self, emotion: Emotion) -> Self {
        self.emotion = Some(emotion);
        self
    }

    /// Set the speaking flag.
    #[must_use]
    pub fn speaking(mut self, speaking: bool) -> Self {
        self.speaking = Some(speaking);
        self
    }

    /// Set the current utterance text.
    #[must_use]
    pub fn utterance(mut self, text: impl Into<String>) -> Self {
        self.current_utterance = Some(text.into());
        self
    }

    fn apply(&self, state: &mut AvatarState) {
        if let Some(emotion) = self.emotion {
            state.emotion = emotion;
        }
        if let Some(speaking) = self.speaking {
            state.speaking = speaking;
        }
        if let Some(ref text) = self.current_utterance {
            state.current_utterance.clone_from(text);
        }
    }
}

type Observer = Arc<dyn Fn(&AvatarState) + Send + Sync>;

struct StoreInner {
    state: AvatarState,
    observers: Vec<(u64, Observer)>,
    next_observer_id: u64,
}

/// Shared store for [`AvatarState`] with observer notification.
///
/// Cloning the store produces another handle to the same state; that is
/// how the store is shared among the conversation controller, the speech
/// output adapter, and any UI consumers.
#[derive(Clone)]
pub struct AvatarStateStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl Default for AvatarStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AvatarStateStore {
    /// Create a store holding the default state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                state: AvatarState::default(),
                observers: Vec::new(),
                next_observer_id: 0,
            })),
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn read(&self) -> AvatarState {
        self.lock().state.clone()
    }

    /// Merge `update` into the state, then notify all observers with the
    /// new snapshot.
    ///
    /// Notification is synchronous and runs in subscription order. A
    /// panicking observer is isolated and logged; the remaining observers
    /// still run.
    pub fn update(&self, update: StateUpdate) {
        let (snapshot, observers) = {
            let mut inner = self.lock();
            update.apply(&mut inner.state);
            (inner.state.clone(), inner.observers.clone())
        };

        for (id, observer) in observers {
            if catch_unwind(AssertUnwindSafe(|| observer(&snapshot))).is_err() {
                warn!("avatar state observer {id} panicked; skipping it for this update");
            }
        }
    }

    /// Reset the state to defaults, notifying observers.
    pub fn reset(&self) {
        let (snapshot, observers) = {
            let mut inner = self.lock();
            inner.state = AvatarState::default();
            (inner.state.clone(), inner.observers.clone())
        };
        for (id, observer) in observers {
            if catch_unwind(AssertUnwindSafe(|| observer(&snapshot))).is_err() {
                warn!("avatar state observer {id} panicked; skipping it for this update");
            }
        }
    }

    /// Register an observer invoked on every update.
    ///
    /// The returned [`Subscription`] unsubscribes on drop; call
    /// [`Subscription::detach`] to keep the observer for the lifetime of
    /// the store instead.
    #[must_use]
    pub fn subscribe(&self, observer: impl Fn(&AvatarState) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut inner = self.lock();
            let id = inner.next_observer_id;
            inner.next_observer_id += 1;
            inner.observers.push((id, Arc::new(observer)));
            id
        };
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle for a registered observer. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    inner: Weak<Mutex<StoreInner>>,
}

impl Subscription {
    /// Explicitly remove the observer.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keep the observer registered for the lifetime of the store.
    pub fn detach(mut self) {
        self.inner = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.observers.retain(|(id, _)| *id != self.id);
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn update_merges_only_given_fields() {
        let store = AvatarStateStore::new();
        store.update(StateUpdate::new().emotion(Emotion::Happy));
        store.update(StateUpdate::new().speaking(true).utterance("hello"));

        let state = store.read();
        assert_eq!(state.emotion, Emotion::Happy);
        assert!(state.speaking);
        assert_eq!(state.current_utterance, "hello");
    }

    #[test]
    fn speaking_and_utterance_change_in_one_snapshot() {
        let store = AvatarStateStore::new();
        store.update(StateUpdate::new().speaking(true).utterance("line"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = store.subscribe(move |s| {
            seen_clone.lock().unwrap().push(s.clone());
        });

        store.update(StateUpdate::new().speaking(false).utterance(""));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].speaking);
        assert!(seen[0].current_utterance.is_empty());
    }

    #[test]
    fn observers_notified_in_subscription_order() {
        let store = AvatarStateStore::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = Arc::clone(&order);
        let _a = store.subscribe(move |_| o1.lock().unwrap().push("first"));
        let o2 = Arc::clone(&order);
        let _b = store.subscribe(move |_| o2.lock().unwrap().push("second"));

        store.update(StateUpdate::new().emotion(Emotion::Sad));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn panicking_observer_does_not_block_later_observers() {
        let store = AvatarStateStore::new();
        let _bad = store.subscribe(|_| panic!("observer bug"));

        let reached = Arc::new(Mutex::new(false));
        let reached_clone = Arc::clone(&reached);
        let _good = store.subscribe(move |_| *reached_clone.lock().unwrap() = true);

        store.update(StateUpdate::new().emotion(Emotion::Surprised));
        assert!(*reached.lock().unwrap());
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let store = AvatarStateStore::new();
        let count = Arc::new(Mutex::new(0_u32));

        let c = Arc::clone(&count);
        let sub = store.subscribe(move |_| *c.lock().unwrap() += 1);

        store.update(StateUpdate::new().speaking(true).utterance("x"));
        drop(sub);
        store.update(StateUpdate::new().speaking(false).utterance(""));

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn detach_keeps_observer_alive() {
        let store = AvatarStateStore::new();
        let count = Arc::new(Mutex::new(0_u32));

        let c = Arc::clone(&count);
        store.subscribe(move |_| *c.lock().unwrap() += 1).detach();

        store.update(StateUpdate::new().emotion(Emotion::Happy));
        store.update(StateUpdate::new().emotion(Emotion::Neutral));
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn reset_restores_defaults_and_notifies() {
        let store = AvatarStateStore::new();
        store.update(
            StateUpdate::new()
                .emotion(Emotion::Angry)
                .speaking(true)
                .utterance("loud"),
        );

        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let _sub = store.subscribe(move |s| *seen_clone.lock().unwrap() = Some(s.clone()));

        store.reset();
        assert_eq!(store.read(), AvatarState::default());
        assert_eq!(seen.lock().unwrap().clone(), Some(AvatarState::default()));
    }

    #[test]
    fn emotion_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Emotion::Surprised).unwrap(), "\"surprised\"");
        assert_eq!(Emotion::Sad.to_string(), "sad");
    }
}
