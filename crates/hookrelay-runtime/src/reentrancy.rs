//! End-of-turn reentrancy guard.
//!
//! Handling a Stop event can itself cause the agent to emit another Stop.
//! The guard keeps at most one end-of-turn sequence active: a marker is set
//! on entry and cleared on every exit path by [`ReentrancyScope`].
//!
//! The marker discipline is create-if-absent / delete-unconditionally, not a
//! lock. Two processes racing past a crashed holder can both enter; the cost
//! is one duplicate Stop envelope.

use std::fmt;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

/// Well-known marker file name, shared with other hook installations.
pub const STOP_MARKER_FILE: &str = ".claude_stop_hook_active";

pub trait ReentrancyMarker: Send + Sync + fmt::Debug {
    /// Set the marker if it is absent. Returns `true` when this call set it.
    fn try_set(&self) -> bool;
    /// Clear the marker whether or not it is set.
    fn clear(&self);
    fn is_set(&self) -> bool;
}

/// Process-local marker backed by a shared atomic flag.
#[derive(Debug, Clone, Default)]
pub struct AtomicMarker(Arc<AtomicBool>);

impl AtomicMarker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReentrancyMarker for AtomicMarker {
    fn try_set(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Cross-process marker realized as the presence of a file.
#[derive(Debug, Clone)]
pub struct FileMarker {
    path: PathBuf,
}

impl FileMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<tmp>/.claude_stop_hook_active`
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join(STOP_MARKER_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileMarker {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl ReentrancyMarker for FileMarker {
    fn try_set(&self) -> bool {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => true,
            Err(error) if error.kind() == ErrorKind::AlreadyExists => false,
            Err(error) => {
                // Unmarked entry: worst case is one duplicate emission.
                warn!(path = %self.path.display(), %error, "could not create reentrancy marker");
                true
            }
        }
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => {
                warn!(path = %self.path.display(), %error, "could not clear reentrancy marker");
            }
        }
    }

    fn is_set(&self) -> bool {
        self.path.exists()
    }
}

#[derive(Debug, Clone)]
pub struct ReentrancyGuard {
    marker: Arc<dyn ReentrancyMarker>,
}

impl ReentrancyGuard {
    pub fn new(marker: Arc<dyn ReentrancyMarker>) -> Self {
        Self { marker }
    }

    pub fn file_backed(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileMarker::new(path)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(AtomicMarker::new()))
    }

    /// `true` if the guard was inactive and is now marked active.
    pub fn try_enter(&self) -> bool {
        let entered = self.marker.try_set();
        debug!(entered, "reentrancy guard try_enter");
        entered
    }

    pub fn exit(&self) {
        self.marker.clear();
    }

    pub fn is_active(&self) -> bool {
        self.marker.is_set()
    }

    /// Scoped acquisition. `None` means another sequence is active and the
    /// caller must stop without emitting anything.
    pub fn enter(&self) -> Option<ReentrancyScope<'_>> {
        self.try_enter().then(|| ReentrancyScope { guard: self })
    }
}

/// Clears the marker when dropped, including during unwinding.
#[derive(Debug)]
#[must_use = "the guard is released as soon as the scope is dropped"]
pub struct ReentrancyScope<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for ReentrancyScope<'_> {
    fn drop(&mut self) {
        self.guard.exit();
    }
}
