//! Replay cursor persistence
//!
//! A checkpoint records the index of the last trace *attempted* in a domain.
//! It is written before the attempt, so a crash mid-trace leaves the cursor
//! on that trace and the next run resumes after it: a trace is attempted at
//! most once across restarts.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::ReplayDomain;
use crate::error::{ReplayError, Result};

/// Persisted cursor for one replay domain
pub trait CheckpointStore: Send + Sync {
    /// Last attempted index, or `None` on a fresh run
    fn load(&self) -> Result<Option<usize>>;

    /// Persist `index` as the last attempted trace
    fn save(&self, index: usize) -> Result<()>;

    /// Remove the checkpoint
    fn clear(&self) -> Result<()>;
}

/// Index to start replaying from, given the loaded checkpoint.
///
/// The checkpointed index itself is skipped: its side effects may already
/// have happened.
pub fn resume_index(checkpoint: Option<usize>) -> usize {
    checkpoint.map_or(0, |last| last.saturating_add(1))
}

/// Checkpoint stored as a decimal integer in a plain-text file
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    /// Checkpoint at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint for `domain` inside `dir`
    pub fn for_domain(dir: impl AsRef<Path>, domain: ReplayDomain) -> Self {
        Self::new(dir.as_ref().join(format!("retrace-{}-index.txt", domain)))
    }

    /// File backing this checkpoint
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for FileCheckpoint {
    fn load(&self) -> Result<Option<usize>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        content
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ReplayError::CorruptCheckpoint {
                path: self.path.display().to_string(),
                content,
            })
    }

    fn save(&self, index: usize) -> Result<()> {
        // Write-then-rename so a crash never leaves a half-written cursor
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, index.to_string())?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process checkpoint that also keeps every saved value, in order
#[derive(Debug, Default)]
pub struct MemoryCheckpoint {
    current: Mutex<Option<usize>>,
    history: Mutex<Vec<usize>>,
}

impl MemoryCheckpoint {
    /// Empty checkpoint
    pub fn new() -> Self {
        Self::default()
    }

    /// Checkpoint that starts at `index`, as if a previous run attempted it
    pub fn at(index: usize) -> Self {
        Self {
            current: Mutex::new(Some(index)),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Current value
    pub fn current(&self) -> Option<usize> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every value saved since creation
    pub fn history(&self) -> Vec<usize> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl CheckpointStore for MemoryCheckpoint {
    fn load(&self) -> Result<Option<usize>> {
        Ok(self.current())
    }

    fn save(&self, index: usize) -> Result<()> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(index);
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(index);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resume_index() {
        assert_eq!(resume_index(None), 0);
        assert_eq!(resume_index(Some(0)), 1);
        assert_eq!(resume_index(Some(7)), 8);
    }

    #[test]
    fn test_resume_index_saturates_at_max() {
        assert_eq!(resume_index(Some(usize::MAX)), usize::MAX);

        let dir = TempDir::new().unwrap();
        let checkpoint = FileCheckpoint::new(dir.path().join("cursor.txt"));
        std::fs::write(checkpoint.path(), usize::MAX.to_string()).unwrap();
        assert_eq!(resume_index(checkpoint.load().unwrap()), usize::MAX);
    }

    #[test]
    fn test_file_checkpoint_lifecycle() {
        let dir = TempDir::new().unwrap();
        let checkpoint = FileCheckpoint::for_domain(dir.path(), ReplayDomain::Http);

        assert_eq!(checkpoint.load().unwrap(), None);

        checkpoint.save(3).unwrap();
        assert_eq!(checkpoint.load().unwrap(), Some(3));
        assert_eq!(std::fs::read_to_string(checkpoint.path()).unwrap(), "3");

        checkpoint.save(4).unwrap();
        assert_eq!(checkpoint.load().unwrap(), Some(4));

        checkpoint.clear().unwrap();
        assert_eq!(checkpoint.load().unwrap(), None);
        // Clearing twice is fine
        checkpoint.clear().unwrap();
    }

    #[test]
    fn test_domains_use_separate_files() {
        let dir = TempDir::new().unwrap();
        let http = FileCheckpoint::for_domain(dir.path(), ReplayDomain::Http);
        let call = FileCheckpoint::for_domain(dir.path(), ReplayDomain::Call);

        http.save(5).unwrap();
        assert_ne!(http.path(), call.path());
        assert_eq!(call.load().unwrap(), None);
    }

    #[test]
    fn test_tolerates_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let checkpoint = FileCheckpoint::new(dir.path().join("cursor.txt"));
        std::fs::write(checkpoint.path(), "12\n").unwrap();
        assert_eq!(checkpoint.load().unwrap(), Some(12));
    }

    #[test]
    fn test_corrupt_checkpoint() {
        let dir = TempDir::new().unwrap();
        let checkpoint = FileCheckpoint::new(dir.path().join("cursor.txt"));
        std::fs::write(checkpoint.path(), "not-a-number").unwrap();

        let err = checkpoint.load().unwrap_err();
        assert!(matches!(
            err,
            ReplayError::CorruptCheckpoint { content, .. } if content == "not-a-number"
        ));
    }

    #[test]
    fn test_memory_checkpoint_history() {
        let checkpoint = MemoryCheckpoint::at(1);
        assert_eq!(checkpoint.load().unwrap(), Some(1));

        checkpoint.save(2).unwrap();
        checkpoint.save(3).unwrap();
        checkpoint.clear().unwrap();

        assert_eq!(checkpoint.current(), None);
        assert_eq!(checkpoint.history(), vec![2, 3]);
    }
}
