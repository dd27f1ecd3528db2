//! Passively tracked view of Live's state.
//!
//! The receive loop overwrites fields whenever a recognised reply or push
//! message arrives. Nothing is ever invalidated, but each field starts as
//! `None` so "never heard" is distinct from a genuine zero.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Metadata recorded for a clip slot we created.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSlotInfo {
    /// Clip length in beats
    pub length: f64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionState {
    pub tempo: Option<f32>,
    pub is_playing: Option<bool>,
    pub current_track: Option<i32>,
    pub track_count: Option<i32>,
    /// Keyed by `(track, slot)`
    pub clip_slots: HashMap<(i32, i32), ClipSlotInfo>,
}

/// Shared handle to the connection state.
#[derive(Clone, Default)]
pub struct StateHandle {
    state: Arc<RwLock<ConnectionState>>,
}

impl StateHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the state with a closure.
    pub fn with_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ConnectionState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Write to the state with a closure.
    pub fn with_write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ConnectionState) -> R,
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Get a clone of the current state.
    pub fn snapshot(&self) -> ConnectionState {
        self.with_read(|s| s.clone())
    }

    pub fn tempo(&self) -> Option<f32> {
        self.with_read(|s| s.tempo)
    }

    pub fn is_playing(&self) -> Option<bool> {
        self.with_read(|s| s.is_playing)
    }

    pub fn track_count(&self) -> Option<i32> {
        self.with_read(|s| s.track_count)
    }
}

impl std::fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateHandle")
            .field("tempo", &self.tempo())
            .field("is_playing", &self.is_playing())
            .finish_non_exhaustive()
    }
}
