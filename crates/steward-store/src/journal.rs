//! Append-only session journal.

use crate::Result;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Rotated files kept unless configured otherwise.
const DEFAULT_ROTATIONS: usize = 3;

/// Append-only JSON-lines log of in-session activity.
///
/// Several producers (hooks and explicit tool calls) may append at once;
/// each entry is a single `write` on an append-mode handle.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
    max_size: u64,
    max_rotations: usize,
}

impl Journal {
    /// Create a journal at the given path.
    pub fn new(path: PathBuf, max_size: u64) -> Self {
        Self {
            path,
            max_size,
            max_rotations: DEFAULT_ROTATIONS,
        }
    }

    /// Number of rotated files to keep; older ones are deleted on rotation.
    pub fn with_rotations(mut self, max_rotations: usize) -> Self {
        self.max_rotations = max_rotations;
        self
    }

    /// Location of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry to the journal.
    pub fn append<E: Serialize>(&self, entry: &E) -> Result<()> {
        let json = serde_json::to_string(entry)?;
        self.append_raw(&json)
    }

    fn append_raw(&self, json: &str) -> Result<()> {
        if self.should_rotate() {
            self.rotate()?;
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut line = json.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        debug!(path = ?self.path, "Appended journal entry");

        Ok(())
    }

    /// Read every parseable entry, oldest first.
    pub fn read_all<E: DeserializeOwned>(&self) -> Result<Vec<E>> {
        self.read_recent(usize::MAX)
    }

    /// Read the last `limit` parseable entries, oldest first.
    pub fn read_recent<E: DeserializeOwned>(&self, limit: usize) -> Result<Vec<E>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries_rev = Vec::new();
        for line in content.lines().rev().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str(line) {
                Ok(entry) => {
                    entries_rev.push(entry);
                    if entries_rev.len() >= limit {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Skipping malformed journal entry");
                }
            }
        }

        entries_rev.reverse();
        Ok(entries_rev)
    }

    fn should_rotate(&self) -> bool {
        match fs::metadata(&self.path) {
            Ok(meta) => meta.len() >= self.max_size,
            Err(_) => false,
        }
    }

    fn rotation_prefix(&self) -> String {
        format!(
            "{}.",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        )
    }

    fn rotate(&self) -> Result<()> {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S%.6f");
        let rotated_path = self
            .path
            .with_file_name(format!("{}{}", self.rotation_prefix(), timestamp));

        fs::rename(&self.path, &rotated_path)?;
        debug!(from = ?self.path, to = ?rotated_path, "Rotated journal");

        self.prune_rotations();

        Ok(())
    }

    /// Rotated files, oldest first.
    fn rotations(&self) -> Vec<PathBuf> {
        let Some(dir) = self.path.parent() else {
            return Vec::new();
        };
        let prefix = self.rotation_prefix();
        let mut rotated: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
                .map(|e| e.path())
                .collect(),
            Err(_) => Vec::new(),
        };
        // Timestamps sort lexically
        rotated.sort();
        rotated
    }

    fn prune_rotations(&self) {
        let rotated = self.rotations();
        let excess = rotated.len().saturating_sub(self.max_rotations);
        for old in &rotated[..excess] {
            match fs::remove_file(old) {
                Ok(()) => debug!(path = ?old, "Pruned rotated journal"),
                Err(e) => warn!(path = ?old, error = %e, "Failed to prune rotated journal"),
            }
        }
    }

    /// Remove the journal file.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Event {
        kind: String,
        n: u32,
    }

    fn event(kind: &str, n: u32) -> Event {
        Event {
            kind: kind.to_string(),
            n,
        }
    }

    #[test]
    fn test_append_and_read() {
        let temp_dir = tempdir().unwrap();
        let journal = Journal::new(temp_dir.path().join("j").join("log.jsonl"), 1024 * 1024);

        assert!(journal.read_all::<Event>().unwrap().is_empty());

        journal.append(&event("edit", 1)).unwrap();
        journal.append(&event("test", 2)).unwrap();
        journal.append(&event("edit", 3)).unwrap();

        let all: Vec<Event> = journal.read_all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], event("edit", 1));

        let recent: Vec<Event> = journal.read_recent(2).unwrap();
        assert_eq!(recent, vec![event("test", 2), event("edit", 3)]);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("log.jsonl");
        let journal = Journal::new(path.clone(), 1024 * 1024);

        journal.append(&event("edit", 1)).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{ truncated\n").unwrap();
        journal.append(&event("edit", 2)).unwrap();

        let all: Vec<Event> = journal.read_all().unwrap();
        assert_eq!(all, vec![event("edit", 1), event("edit", 2)]);
    }

    #[test]
    fn test_rotation() {
        let temp_dir = tempdir().unwrap();
        let journal = Journal::new(temp_dir.path().join("log.jsonl"), 16);

        journal.append(&event("a-long-enough-kind", 1)).unwrap();
        journal.append(&event("b", 2)).unwrap();

        let all: Vec<Event> = journal.read_all().unwrap();
        assert_eq!(all, vec![event("b", 2)]);

        let rotated = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("log.jsonl."))
            .count();
        assert_eq!(rotated, 1);

        journal.clear().unwrap();
        assert!(journal.read_all::<Event>().unwrap().is_empty());
    }

    #[test]
    fn test_rotated_files_are_pruned() {
        let temp_dir = tempdir().unwrap();
        let journal = Journal::new(temp_dir.path().join("log.jsonl"), 16).with_rotations(2);

        for n in 0..6 {
            journal.append(&event("a-long-enough-kind", n)).unwrap();
        }

        let rotated = journal.rotations();
        assert_eq!(rotated.len(), 2);

        // The newest rotation holds the entry written just before the live one
        let newest = std::fs::read_to_string(&rotated[1]).unwrap();
        assert!(newest.contains("\"n\":4"));
        let live: Vec<Event> = journal.read_all().unwrap();
        assert_eq!(live, vec![event("a-long-enough-kind", 5)]);
    }
}
