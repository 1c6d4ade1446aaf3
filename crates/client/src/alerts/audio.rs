//! Audible notification cue.
//!
//! Playback is locked until the first user interaction, mirroring browser
//! autoplay rules: [`AudioCue::unlock`] flips the cue once and only once, and
//! [`AudioCue::play`] before that point is silently skipped.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use super::AlertError;

/// Something that can make the notification sound.
pub trait AudioBackend: Send + Sync {
    fn play(&self) -> Result<(), AlertError>;
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl AudioBackend for TerminalBell {
    fn play(&self) -> Result<(), AlertError> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}

/// Owned audio handle with one-way unlocking.
pub struct AudioCue {
    unlocked: AtomicBool,
    backend: Box<dyn AudioBackend>,
}

impl AudioCue {
    pub fn new(backend: impl AudioBackend + 'static) -> Self {
        Self {
            unlocked: AtomicBool::new(false),
            backend: Box::new(backend),
        }
    }

    /// Allow playback from now on. Returns `true` only for the call that
    /// actually unlocked; every later call is a no-op.
    pub fn unlock(&self) -> bool {
        let first = !self.unlocked.swap(true, Ordering::SeqCst);
        if first {
            tracing::debug!("Notification audio unlocked");
        }
        first
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::SeqCst)
    }

    /// Play the cue. Never fails; problems are logged and dropped.
    pub fn play(&self) {
        if !self.is_unlocked() {
            tracing::debug!("Skipping notification sound: {}", AlertError::Locked);
            return;
        }
        if let Err(e) = self.backend.play() {
            tracing::debug!("Notification sound failed: {}", e);
        }
    }
}

impl std::fmt::Debug for AudioCue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioCue")
            .field("unlocked", &self.is_unlocked())
            .finish_non_exhaustive()
    }
}
