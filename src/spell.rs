//! # Spell Tracking
//!
//! Per-session keystroke buffers and spell matching.
//!
//! Each session gets a trailing window of its most recent keys, trimmed
//! to the spell length on every insert. Trimming from the front keeps the
//! update O(1) amortized and turns "does the tail match" into a plain
//! element-wise comparison: the window naturally discards everything
//! before a failed attempt, so no substring search is needed.
//!
//! Buffers live in memory for the process lifetime. There is no eviction.
use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, info};

/// Tracks what each session has typed and reports when a session's
/// trailing window equals the configured spell.
pub struct SpellTracker {
    buffers: Mutex<HashMap<String, Vec<String>>>,
    spell: Vec<String>,
}

impl SpellTracker {
    /// An empty spell disables matching entirely: buffers stay empty and
    /// [`SpellTracker::check_spell`] always returns false.
    pub fn new(spell: Vec<String>) -> Self {
        info!("SpellTracker initialized with spell: {spell:?}");

        Self {
            buffers: Mutex::new(HashMap::new()),
            spell,
        }
    }

    /// Appends a key to the session's buffer and trims it to the spell
    /// length. Unknown sessions start from an empty buffer. Returns the
    /// resulting buffer by value.
    pub fn add_key(&self, identity: &str, key: &str) -> Vec<String> {
        let mut buffers = self.buffers.lock();
        let buffer = buffers.entry(identity.to_string()).or_default();

        buffer.push(key.to_string());
        if buffer.len() > self.spell.len() {
            let excess = buffer.len() - self.spell.len();
            buffer.drain(..excess);
        }

        debug!("Buffer for {identity} updated with '{key}': {buffer:?}");
        buffer.clone()
    }

    /// Current buffer for a session, or empty if never seen. Pure read.
    pub fn get_buffer(&self, identity: &str) -> Vec<String> {
        self.buffers
            .lock()
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    /// True iff the session's buffer equals the spell, compared
    /// case-insensitively element-wise.
    pub fn check_spell(&self, identity: &str) -> bool {
        if self.spell.is_empty() {
            return false;
        }

        let buffers = self.buffers.lock();
        let Some(buffer) = buffers.get(identity) else {
            return false;
        };

        buffer.len() == self.spell.len()
            && buffer
                .iter()
                .zip(&self.spell)
                .all(|(typed, wanted)| typed.to_lowercase() == wanted.to_lowercase())
    }
}
