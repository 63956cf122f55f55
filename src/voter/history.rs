//! Durable record of polls already voted on.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryFile {
    #[serde(default)]
    voted_polls: Vec<String>,
}

/// Set of poll ids that have already received a vote.
///
/// Loaded once at startup and written through on every new entry. An id only
/// enters the set after the vote call succeeded; there is no removal path.
pub struct VoteHistory {
    path: Option<PathBuf>,
    voted: HashSet<String>,
}

impl VoteHistory {
    /// History with no backing file. State lives for the process only.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            voted: HashSet::new(),
        }
    }

    /// Load history from `path`.
    ///
    /// A missing, unreadable, or malformed file yields an empty set with a
    /// logged warning; loading never fails the process.
    pub fn load(path: &Path) -> Self {
        let voted = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<HistoryFile>(&content) {
                Ok(file) => file.voted_polls.into_iter().collect(),
                Err(e) => {
                    warn!("Failed to parse history file {}: {e}", path.display());
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                warn!("Failed to read history file {}: {e}", path.display());
                HashSet::new()
            }
        };

        info!("Loaded {} previously voted poll(s)", voted.len());
        Self {
            path: Some(path.to_path_buf()),
            voted,
        }
    }

    pub fn contains(&self, poll_id: &str) -> bool {
        self.voted.contains(poll_id)
    }

    pub fn len(&self) -> usize {
        self.voted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voted.is_empty()
    }

    /// Record a successful vote and flush the full set to disk immediately.
    ///
    /// A failed write is logged and otherwise ignored: the in-memory set
    /// stays authoritative for the rest of the process lifetime.
    pub fn mark_voted(&mut self, poll_id: &str) {
        if !self.voted.insert(poll_id.to_string()) {
            return;
        }

        if let Some(ref path) = self.path
            && let Err(e) = self.save(path)
        {
            warn!("Failed to save history to {}: {e}", path.display());
        }
    }

    fn save(&self, path: &Path) -> Result<(), String> {
        let mut voted_polls: Vec<String> = self.voted.iter().cloned().collect();
        voted_polls.sort();
        let data = serde_json::to_string_pretty(&HistoryFile { voted_polls })
            .map_err(|e| e.to_string())?;

        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
        }
        std::fs::write(path, data).map_err(|e| e.to_string())
    }
}
