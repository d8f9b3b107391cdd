//! Activity log: who did what, when.
//!
//! Events are JSON lines appended to a file under the data directory. With
//! the hash chain on, each line carries the SHA-256 of its own content and
//! the hash of the line before it. Each `Ledger` owns the logger for its own
//! data directory.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::ActivityConfig;
use crate::error::DatabaseError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// RFC 3339 timestamp.
    pub ts: String,
    pub user: String,
    pub page: String,
    pub action: String,
    #[serde(default)]
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl ActivityEvent {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.ts)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn content_hash(&self) -> Result<String, serde_json::Error> {
        let unsigned = Self {
            hash: None,
            ..self.clone()
        };
        let body = serde_json::to_string(&unsigned)?;
        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Appends events to one log file, continuing its hash chain.
#[derive(Debug)]
pub struct ActivityLogger {
    path: PathBuf,
    hash_chain: bool,
    state: Mutex<Option<String>>,
}

impl ActivityLogger {
    pub fn new(path: PathBuf, hash_chain: bool) -> Self {
        let tail = if hash_chain { last_hash(&path) } else { None };
        Self {
            path,
            hash_chain,
            state: Mutex::new(tail),
        }
    }

    /// `None` when the config disables the log.
    pub fn from_config(config: &ActivityConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.path.clone(), config.hash_chain))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event. Failures only warn.
    pub fn record(&self, user: &str, page: &str, action: &str, details: &str) {
        tracing::debug!(user, page, action, "activity");
        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Activity log state lock poisoned: {}", e);
                return;
            }
        };

        let mut event = ActivityEvent {
            ts: Utc::now().to_rfc3339(),
            user: user.to_string(),
            page: page.to_string(),
            action: action.to_string(),
            details: details.to_string(),
            prev_hash: if self.hash_chain { state.clone() } else { None },
            hash: None,
        };

        if self.hash_chain {
            match event.content_hash() {
                Ok(hash) => event.hash = Some(hash),
                Err(e) => {
                    tracing::warn!("Failed to serialize activity event for hashing: {}", e);
                    return;
                }
            }
        }

        let line = match serde_json::to_string(&event) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Failed to serialize activity event: {}", e);
                return;
            }
        };

        if let Some(parent) = self.path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            tracing::warn!("Failed to create activity log dir {:?}: {}", parent, e);
            return;
        }

        // New files are created 0o600. An existing file with any other mode
        // is not written to: the event is dropped with a warning.
        let mut open_opts = OpenOptions::new();
        open_opts.create(true).append(true);
        #[cfg(unix)]
        open_opts.mode(0o600);
        match open_opts.open(&self.path) {
            Ok(mut f) => {
                #[cfg(unix)]
                {
                    let mode = match f.metadata() {
                        Ok(meta) => meta.permissions().mode() & 0o777,
                        Err(e) => {
                            tracing::warn!(
                                "Failed to read permissions for activity log {:?}: {}",
                                self.path,
                                e
                            );
                            return;
                        }
                    };
                    if mode != 0o600 {
                        tracing::warn!(
                            "Refusing to write activity event; insecure mode {:o} on {:?} (expected 600)",
                            mode,
                            self.path
                        );
                        return;
                    }
                }
                match writeln!(f, "{line}") {
                    Ok(()) => {
                        if self.hash_chain {
                            *state = event.hash;
                        }
                    }
                    Err(e) => tracing::warn!("Failed to append activity event: {}", e),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to open activity log {:?}: {}", self.path, e);
            }
        }
    }
}

/// Hash of the last parseable line, so a new process continues the chain.
fn last_hash(path: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(path).ok()?;
    raw.lines()
        .rev()
        .filter(|line| !line.trim().is_empty())
        .find_map(|line| serde_json::from_str::<ActivityEvent>(line).ok())
        .and_then(|event| event.hash)
}

/// Case-insensitive substring filters; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub user: Option<String>,
    pub page: Option<String>,
    pub action: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim) {
        None | Some("") => true,
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

impl EventFilter {
    pub fn matches(&self, event: &ActivityEvent) -> bool {
        if !contains_ci(&event.user, self.user.as_deref())
            || !contains_ci(&event.page, self.page.as_deref())
            || !contains_ci(&event.action, self.action.as_deref())
        {
            return false;
        }
        if self.since.is_none() && self.until.is_none() {
            return true;
        }
        let Some(ts) = event.timestamp() else {
            return false;
        };
        self.since.is_none_or(|since| ts >= since) && self.until.is_none_or(|until| ts <= until)
    }
}

fn read_events(path: &Path) -> Result<Vec<(String, ActivityEvent)>, DatabaseError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(DatabaseError::io(path, e)),
    };
    let mut events = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ActivityEvent>(line) {
            Ok(event) => events.push((line.to_string(), event)),
            Err(e) => tracing::warn!(line = idx + 1, "Skipping unreadable activity event: {}", e),
        }
    }
    Ok(events)
}

/// Matching events, newest first.
pub fn load_events(path: &Path, filter: &EventFilter) -> Result<Vec<ActivityEvent>, DatabaseError> {
    let mut events: Vec<ActivityEvent> = read_events(path)?
        .into_iter()
        .map(|(_, event)| event)
        .filter(|event| filter.matches(event))
        .collect();
    events.reverse();
    events.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    Ok(events)
}

/// Drop events older than `days` before `now`. Returns how many were
/// removed. Lines are kept verbatim so surviving hashes stay valid.
pub fn prune_older_than(path: &Path, days: u32, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
    let events = read_events(path)?;
    if events.is_empty() {
        return Ok(0);
    }
    let cutoff = now - Duration::days(i64::from(days));
    let total = events.len();
    let kept: Vec<String> = events
        .into_iter()
        .filter(|(_, event)| event.timestamp().is_none_or(|ts| ts >= cutoff))
        .map(|(line, _)| line)
        .collect();
    let removed = total - kept.len();
    if removed == 0 {
        return Ok(0);
    }

    let tmp = path.with_extension("jsonl.tmp");
    let mut body = kept.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    std::fs::write(&tmp, body).map_err(|e| DatabaseError::io(&tmp, e))?;
    #[cfg(unix)]
    std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| DatabaseError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| DatabaseError::io(path, e))?;
    tracing::info!(removed, days, "Pruned activity log");
    Ok(removed)
}

/// Result of walking the hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub events: usize,
    /// 1-based index of the first event whose hash or link does not match.
    pub broken_at: Option<usize>,
}

/// Check every hashed event against its content and its predecessor. The
/// first event's `prev_hash` is not checked, so a pruned log still verifies.
pub fn verify_chain(path: &Path) -> Result<ChainReport, DatabaseError> {
    let events = read_events(path)?;
    let mut prev: Option<String> = None;
    for (idx, (_, event)) in events.iter().enumerate() {
        let Some(ref hash) = event.hash else {
            return Ok(ChainReport {
                events: events.len(),
                broken_at: Some(idx + 1),
            });
        };
        let expected = event
            .content_hash()
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let linked = idx == 0 || event.prev_hash == prev;
        if &expected != hash || !linked {
            return Ok(ChainReport {
                events: events.len(),
                broken_at: Some(idx + 1),
            });
        }
        prev = Some(hash.clone());
    }
    Ok(ChainReport {
        events: events.len(),
        broken_at: None,
    })
}
